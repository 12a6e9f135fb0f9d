/////////
/// Settings pages: fields shown to the user and how they map back onto settings
////////
use std::str::FromStr;

use crate::context::Environment;
use crate::mail::parse_recipients;
use crate::settings::{InstallerSettings, Language, PeakMeasurement};
use crate::ui::{FormField, FormState};

const TARGET_PATH: &str = "Target directory";
const LANGUAGE: &str = "Language";
const CPU_CORES: &str = "Processor cores";
const FILE_EXPIRY: &str = "File expiry time (s)";
const PEAK: &str = "Peak measurement";

const EMAIL_ENABLED: &str = "Send error emails";
const EMAIL_SERVER: &str = "Mail server";
const EMAIL_PORT: &str = "Port";
const EMAIL_TLS: &str = "Use TLS";
const EMAIL_AUTH: &str = "Use authentication";
const EMAIL_USER: &str = "Username";
const EMAIL_PASSWORD: &str = "Password";
const EMAIL_SENDER: &str = "Sender address";
const EMAIL_RECIPIENTS: &str = "Recipients";
const EMAIL_SUBJECT: &str = "Subject";
const EMAIL_INTERVAL: &str = "Reminder interval (h)";

const HTML_REPORT: &str = "Write HTML report";
const HTML_INTERVAL: &str = "Report interval (s)";
const HEARTBEAT: &str = "Heartbeat";
const HEARTBEAT_INTERVAL: &str = "Heartbeat interval (s)";
const USE_RAMDISK: &str = "Use ram disk";
const RAMDISK_DEVICE: &str = "Ram disk device";
const SERVER_USER: &str = "Server user";

const USE_SAMBA: &str = "Share with samba";
const SHARE_NAME: &str = "Share name";

fn text<'a>(state: &'a FormState, label: &str) -> &'a str {
    state
        .field(label)
        .map(|field| field.value.trim())
        .unwrap_or("")
}

fn flag(state: &FormState, label: &str) -> bool {
    state.field(label).map(|field| field.checked).unwrap_or(false)
}

fn chosen<'a>(state: &'a FormState, label: &str) -> Option<&'a str> {
    state.field(label).and_then(FormField::chosen)
}

fn number<T: FromStr>(state: &FormState, label: &str) -> Result<T, String> {
    text(state, label)
        .parse()
        .map_err(|_| format!("{label} must be a whole number"))
}

fn position_of(options: &[String], value: &str) -> usize {
    options.iter().position(|option| option == value).unwrap_or(0)
}

pub fn paths_form(settings: &InstallerSettings) -> FormState {
    let languages: Vec<String> = Language::ALL.iter().map(|l| l.label().to_string()).collect();
    let peaks: Vec<String> = PeakMeasurement::ALL
        .iter()
        .map(|p| p.label().to_string())
        .collect();
    let language = position_of(&languages, settings.language.label());
    let peak = position_of(&peaks, settings.peak_measurement.label());
    FormState::new(vec![
        FormField::text(TARGET_PATH, &settings.target_path),
        FormField::choice(LANGUAGE, languages, language),
        FormField::number(CPU_CORES, settings.cpu_cores as u64),
        FormField::number(FILE_EXPIRY, settings.file_expiry_time),
        FormField::choice(PEAK, peaks, peak),
    ])
}

pub fn apply_paths(settings: &mut InstallerSettings, state: &FormState) -> Result<(), String> {
    let target = text(state, TARGET_PATH);
    let target = if target.len() > 1 {
        target.trim_end_matches('/')
    } else {
        target
    };
    if !target.starts_with('/') {
        return Err("Target directory must be an absolute path".to_string());
    }
    if target == "/" {
        return Err("Target directory cannot be the root directory".to_string());
    }
    let cpu_cores: u32 = number(state, CPU_CORES)?;
    if cpu_cores == 0 {
        return Err("Processor cores must be at least 1".to_string());
    }
    let file_expiry_time: u64 = number(state, FILE_EXPIRY)?;
    if file_expiry_time == 0 {
        return Err("File expiry time must be greater than zero".to_string());
    }

    settings.target_path = target.to_string();
    settings.cpu_cores = cpu_cores;
    settings.file_expiry_time = file_expiry_time;
    if let Some(label) = chosen(state, LANGUAGE) {
        if let Some(language) = Language::ALL.iter().find(|l| l.label() == label) {
            settings.language = *language;
        }
    }
    if let Some(label) = chosen(state, PEAK) {
        if let Some(peak) = PeakMeasurement::ALL.iter().find(|p| p.label() == label) {
            settings.peak_measurement = *peak;
        }
    }
    Ok(())
}

pub fn email_form(settings: &InstallerSettings) -> FormState {
    let email = &settings.email;
    FormState::new(vec![
        FormField::toggle(EMAIL_ENABLED, email.enabled),
        FormField::text(EMAIL_SERVER, &email.server),
        FormField::number(EMAIL_PORT, email.port as u64),
        FormField::toggle(EMAIL_TLS, email.use_tls),
        FormField::toggle(EMAIL_AUTH, email.use_authentication),
        FormField::text(EMAIL_USER, &email.username),
        FormField::secret(EMAIL_PASSWORD, &email.password),
        FormField::text(EMAIL_SENDER, &email.sender),
        FormField::text(EMAIL_RECIPIENTS, &email.recipients.join(", ")),
        FormField::text(EMAIL_SUBJECT, &email.subject),
        FormField::number(EMAIL_INTERVAL, email.interval_hours as u64),
    ])
}

// Copies the form into the settings; address checks happen in validate_email_settings
pub fn apply_email(settings: &mut InstallerSettings, state: &FormState) -> Result<(), String> {
    let port: u16 = number(state, EMAIL_PORT)
        .map_err(|_| "Port must be a number between 1 and 65535".to_string())?;
    let interval_hours: u32 = number(state, EMAIL_INTERVAL)?;
    if interval_hours == 0 {
        return Err("Reminder interval must be at least one hour".to_string());
    }
    let email = &mut settings.email;
    email.enabled = flag(state, EMAIL_ENABLED);
    email.server = text(state, EMAIL_SERVER).to_string();
    email.port = port;
    email.use_tls = flag(state, EMAIL_TLS);
    email.use_authentication = flag(state, EMAIL_AUTH);
    email.username = text(state, EMAIL_USER).to_string();
    email.password = state
        .field(EMAIL_PASSWORD)
        .map(|field| field.value.clone())
        .unwrap_or_default();
    email.sender = text(state, EMAIL_SENDER).to_string();
    email.recipients = parse_recipients(text(state, EMAIL_RECIPIENTS));
    email.subject = text(state, EMAIL_SUBJECT).to_string();
    email.interval_hours = interval_hours;
    Ok(())
}

pub fn report_form(settings: &InstallerSettings, environment: &Environment) -> FormState {
    let devices = environment.ram_devices.clone().unwrap_or_default();
    let users = environment.users.clone().unwrap_or_default();
    let device = position_of(&devices, &settings.ramdisk_device);
    let user = position_of(&users, &settings.server_user);
    FormState::new(vec![
        FormField::toggle(HTML_REPORT, settings.write_html_report),
        FormField::number(HTML_INTERVAL, settings.html_report_interval),
        FormField::toggle(HEARTBEAT, settings.heartbeat),
        FormField::number(HEARTBEAT_INTERVAL, settings.heartbeat_interval),
        FormField::toggle(USE_RAMDISK, settings.use_ramdisk),
        FormField::choice(RAMDISK_DEVICE, devices, device),
        FormField::choice(SERVER_USER, users, user),
    ])
}

pub fn apply_report(
    settings: &mut InstallerSettings,
    environment: &Environment,
    state: &FormState,
) -> Result<(), String> {
    let html_report_interval: u64 = number(state, HTML_INTERVAL)?;
    let heartbeat_interval: u64 = number(state, HEARTBEAT_INTERVAL)?;
    if html_report_interval == 0 || heartbeat_interval == 0 {
        return Err("Intervals must be greater than zero".to_string());
    }
    let use_ramdisk = flag(state, USE_RAMDISK);
    let ramdisk_device = match (use_ramdisk, chosen(state, RAMDISK_DEVICE)) {
        (true, None) => {
            return Err(match &environment.ram_devices {
                Err(err) => err.clone(),
                Ok(_) => "Choose a ram disk device".to_string(),
            })
        }
        (_, Some(device)) => device.to_string(),
        (false, None) => settings.ramdisk_device.clone(),
    };
    let server_user = chosen(state, SERVER_USER)
        .ok_or_else(|| "Choose the user account the server runs as".to_string())?
        .to_string();

    settings.write_html_report = flag(state, HTML_REPORT);
    settings.html_report_interval = html_report_interval;
    settings.heartbeat = flag(state, HEARTBEAT);
    settings.heartbeat_interval = heartbeat_interval;
    settings.use_ramdisk = use_ramdisk;
    settings.ramdisk_device = ramdisk_device;
    settings.server_user = server_user;
    Ok(())
}

pub fn samba_form(settings: &InstallerSettings) -> FormState {
    FormState::new(vec![
        FormField::toggle(USE_SAMBA, settings.use_samba),
        FormField::text(SHARE_NAME, &settings.samba_share_name),
    ])
}

pub fn apply_samba(settings: &mut InstallerSettings, state: &FormState) -> Result<(), String> {
    let use_samba = flag(state, USE_SAMBA);
    let share_name = text(state, SHARE_NAME);
    settings.use_samba = use_samba;
    if !use_samba {
        return Ok(());
    }
    if share_name.is_empty() {
        return Err("Share name is missing".to_string());
    }
    if share_name.contains(['[', ']', '/', '\\']) {
        return Err("Share name cannot contain [ ] / or \\".to_string());
    }
    settings.samba_share_name = share_name.to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment() -> Environment {
        Environment {
            distribution: None,
            ram_devices: Ok(vec!["/dev/ram1".to_string(), "/dev/ram2".to_string()]),
            users: Ok(vec!["audio".to_string(), "ops".to_string()]),
            search_path: Vec::new(),
            script_dir: None,
        }
    }

    fn set_text(state: &mut FormState, label: &str, value: &str) {
        if let Some(field) = state.fields.iter_mut().find(|f| f.label == label) {
            field.value = value.to_string();
        }
    }

    fn set_flag(state: &mut FormState, label: &str, value: bool) {
        if let Some(field) = state.fields.iter_mut().find(|f| f.label == label) {
            field.checked = value;
        }
    }

    #[test]
    fn paths_form_round_trips_defaults() {
        let mut settings = InstallerSettings::default();
        let before = settings.clone();
        let state = paths_form(&settings);
        apply_paths(&mut settings, &state).unwrap();
        assert_eq!(settings, before);
    }

    #[test]
    fn target_path_is_normalised_and_checked() {
        let mut settings = InstallerSettings::default();
        let mut state = paths_form(&settings);
        set_text(&mut state, TARGET_PATH, "/srv/lcs/");
        apply_paths(&mut settings, &state).unwrap();
        assert_eq!(settings.target_path, "/srv/lcs");

        set_text(&mut state, TARGET_PATH, "relative/dir");
        assert!(apply_paths(&mut settings, &state).is_err());
        set_text(&mut state, TARGET_PATH, "/");
        assert!(apply_paths(&mut settings, &state).is_err());
        assert_eq!(settings.target_path, "/srv/lcs");
    }

    #[test]
    fn zero_cores_rejected() {
        let mut settings = InstallerSettings::default();
        let mut state = paths_form(&settings);
        set_text(&mut state, CPU_CORES, "0");
        assert!(apply_paths(&mut settings, &state).is_err());
    }

    #[test]
    fn email_form_parses_recipients_and_port() {
        let mut settings = InstallerSettings::default();
        let mut state = email_form(&settings);
        set_flag(&mut state, EMAIL_ENABLED, true);
        set_text(&mut state, EMAIL_RECIPIENTS, "a@example.com, b@example.com");
        set_text(&mut state, EMAIL_PORT, "465");
        apply_email(&mut settings, &state).unwrap();
        assert!(settings.email.enabled);
        assert_eq!(settings.email.port, 465);
        assert_eq!(settings.email.recipients.len(), 2);

        set_text(&mut state, EMAIL_PORT, "70000");
        assert!(apply_email(&mut settings, &state).is_err());
    }

    #[test]
    fn report_form_requires_a_user() {
        let mut settings = InstallerSettings::default();
        let env = Environment {
            users: Err("No normal user accounts found".to_string()),
            ..environment()
        };
        let state = report_form(&settings, &env);
        assert!(apply_report(&mut settings, &env, &state).is_err());
    }

    #[test]
    fn report_form_picks_first_user_and_device() {
        let mut settings = InstallerSettings::default();
        let env = environment();
        let mut state = report_form(&settings, &env);
        set_flag(&mut state, USE_RAMDISK, true);
        apply_report(&mut settings, &env, &state).unwrap();
        assert_eq!(settings.server_user, "audio");
        assert!(settings.use_ramdisk);
        assert_eq!(settings.ramdisk_device, "/dev/ram1");
    }

    #[test]
    fn ramdisk_without_devices_reports_probe_error() {
        let mut settings = InstallerSettings::default();
        let env = Environment {
            ram_devices: Err("No ram disk devices found".to_string()),
            ..environment()
        };
        let mut state = report_form(&settings, &env);
        set_flag(&mut state, USE_RAMDISK, true);
        assert_eq!(
            apply_report(&mut settings, &env, &state),
            Err("No ram disk devices found".to_string())
        );
    }

    #[test]
    fn samba_share_name_checked_only_when_enabled() {
        let mut settings = InstallerSettings::default();
        let mut state = samba_form(&settings);
        set_text(&mut state, SHARE_NAME, "bad[name]");
        assert!(apply_samba(&mut settings, &state).is_err());
        set_flag(&mut state, USE_SAMBA, false);
        assert!(apply_samba(&mut settings, &state).is_ok());
        assert!(!settings.use_samba);
    }
}
