/////////
/// Test message through the configured mail relay
////////
use std::fs;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};

use crate::logging::log_debug;
use crate::settings::EmailSettings;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
// Port for TLS from the first byte instead of STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

// Splits a comma or whitespace separated recipient list
pub fn parse_recipients(value: &str) -> Vec<String> {
    value
        .split(|ch: char| ch == ',' || ch == ';' || ch.is_whitespace())
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn sender_address(email: &EmailSettings) -> &str {
    if email.sender.trim().is_empty() {
        email.username.trim()
    } else {
        email.sender.trim()
    }
}

// Lists every missing or malformed field; empty when the settings can be used
pub fn validate_email_settings(email: &EmailSettings) -> Vec<String> {
    let mut problems = Vec::new();
    if email.server.trim().is_empty() {
        problems.push("Mail server name is missing".to_string());
    }
    if email.port == 0 {
        problems.push("Mail server port is missing".to_string());
    }
    if email.use_authentication {
        if email.username.trim().is_empty() {
            problems.push("Username is missing".to_string());
        }
        if email.password.is_empty() {
            problems.push("Password is missing".to_string());
        }
    }
    if email.recipients.is_empty() {
        problems.push("At least one recipient is required".to_string());
    }
    for recipient in &email.recipients {
        if recipient.parse::<Mailbox>().is_err() {
            problems.push(format!("Invalid recipient address: {recipient}"));
        }
    }
    if sender_address(email).parse::<Mailbox>().is_err() {
        problems.push("Sender address is missing or invalid".to_string());
    }
    problems
}

pub fn local_hostname() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .or_else(|_| fs::read_to_string("/etc/hostname"))
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|_| "unknown host".to_string())
}

fn build_message(email: &EmailSettings, hostname: &str) -> Result<Message, String> {
    let from: Mailbox = sender_address(email)
        .parse()
        .map_err(|err| format!("Invalid sender address: {err}"))?;
    let mut builder = Message::builder()
        .from(from)
        .subject(format!("{} (test)", email.subject))
        .header(ContentType::TEXT_PLAIN);
    for recipient in &email.recipients {
        let to: Mailbox = recipient
            .parse()
            .map_err(|err| format!("Invalid recipient address {recipient}: {err}"))?;
        builder = builder.to(to);
    }
    builder
        .body(format!(
            "This is a test message from the Loudness Correction installer on {hostname}.\n\
             Error reports will be sent to this address every {} hour(s) while problems persist.\n",
            email.interval_hours
        ))
        .map_err(|err| format!("Could not build message: {err}"))
}

fn build_transport(email: &EmailSettings) -> Result<SmtpTransport, String> {
    let server = email.server.trim();
    let mut builder = SmtpTransport::builder_dangerous(server)
        .port(email.port)
        .timeout(Some(CONNECT_TIMEOUT));
    if email.use_tls {
        let params = TlsParameters::new(server.to_string())
            .map_err(|err| format!("Could not prepare encrypted connection: {err}"))?;
        builder = if email.port == IMPLICIT_TLS_PORT {
            builder.tls(Tls::Wrapper(params))
        } else {
            builder.tls(Tls::Required(params))
        };
    }
    if email.use_authentication {
        builder = builder.credentials(Credentials::new(
            email.username.trim().to_string(),
            email.password.clone(),
        ));
    }
    Ok(builder.build())
}

// Short message for the email page
fn describe_smtp_error(err: &lettre::transport::smtp::Error, email: &EmailSettings) -> String {
    let endpoint = format!("{}:{}", email.server.trim(), email.port);
    if err.is_timeout() {
        return format!("Connection to {endpoint} timed out");
    }
    if err.is_tls() {
        return format!("Could not establish an encrypted connection to {endpoint}");
    }
    if let Some(code) = err.status() {
        let code = code.to_string();
        return match code.as_str() {
            "530" | "534" | "535" => "Authentication failed, check username and password".to_string(),
            "552" => "Message exceeds the size limit of the mail server".to_string(),
            "550" | "553" => format!("Mail server rejected an address ({code})"),
            _ => format!("Mail server refused the message ({code})"),
        };
    }
    if err.is_response() {
        return format!("{endpoint} did not answer like a mail server");
    }
    format!("Could not connect to {endpoint}: {err}")
}

// Validates, connects, optionally upgrades and authenticates, sends one message
pub fn send_test_message(email: &EmailSettings) -> Result<(), String> {
    let problems = validate_email_settings(email);
    if !problems.is_empty() {
        return Err(problems.join(", "));
    }
    let message = build_message(email, &local_hostname())?;
    let transport = build_transport(email)?;
    log_debug(&format!(
        "Sending test message through {}:{}",
        email.server, email.port
    ));
    transport
        .send(&message)
        .map(|_| ())
        .map_err(|err| describe_smtp_error(&err, email))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> EmailSettings {
        EmailSettings {
            enabled: true,
            server: "smtp.example.com".to_string(),
            port: 587,
            username: "lcs@example.com".to_string(),
            password: "secret".to_string(),
            recipients: vec!["ops@example.com".to_string()],
            ..EmailSettings::default()
        }
    }

    #[test]
    fn complete_settings_validate() {
        assert!(validate_email_settings(&complete()).is_empty());
    }

    #[test]
    fn every_missing_field_is_reported() {
        let email = EmailSettings {
            port: 0,
            ..EmailSettings::default()
        };
        let problems = validate_email_settings(&email);
        for expected in [
            "Mail server name is missing",
            "Mail server port is missing",
            "Username is missing",
            "Password is missing",
            "At least one recipient is required",
        ] {
            assert!(problems.iter().any(|p| p == expected), "missing {expected}");
        }
    }

    #[test]
    fn password_not_needed_without_authentication() {
        let email = EmailSettings {
            use_authentication: false,
            password: String::new(),
            ..complete()
        };
        assert!(validate_email_settings(&email).is_empty());
    }

    #[test]
    fn malformed_recipient_is_reported() {
        let email = EmailSettings {
            recipients: vec!["not an address".to_string()],
            ..complete()
        };
        let problems = validate_email_settings(&email);
        assert!(problems[0].starts_with("Invalid recipient address"));
    }

    #[test]
    fn recipients_split_on_commas_and_spaces() {
        assert_eq!(
            parse_recipients("a@example.com, b@example.com;c@example.com  "),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn invalid_settings_are_not_sent() {
        let err = send_test_message(&EmailSettings::default()).unwrap_err();
        assert!(err.contains("Mail server name is missing"));
    }

    #[test]
    fn message_goes_to_every_recipient() {
        let email = EmailSettings {
            recipients: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            ..complete()
        };
        let message = build_message(&email, "lcs-host").unwrap();
        assert_eq!(message.envelope().to().len(), 2);
    }

    #[test]
    fn refused_connection_is_reported_not_raised() {
        let email = EmailSettings {
            server: "127.0.0.1".to_string(),
            port: 1,
            use_tls: false,
            use_authentication: false,
            ..complete()
        };
        let err = send_test_message(&email).unwrap_err();
        assert!(!err.is_empty());
    }
}
