/////////
/// Wizard pages and the transitions between them
////////
use std::collections::BTreeSet;

use crate::context::InstallerContext;
use crate::logging::log_debug;
use crate::mail::validate_email_settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Page {
    License,
    Intro,
    Paths,
    Email,
    Report,
    Samba,
    RootPassword,
    Dependencies,
    CommandViewer,
    FfmpegNote,
    Completion,
    Fatal,
}

impl Page {
    pub const ALL: [Page; 12] = [
        Page::License,
        Page::Intro,
        Page::Paths,
        Page::Email,
        Page::Report,
        Page::Samba,
        Page::RootPassword,
        Page::Dependencies,
        Page::CommandViewer,
        Page::FfmpegNote,
        Page::Completion,
        Page::Fatal,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Page::License => "License",
            Page::Intro => "Welcome",
            Page::Paths => "Paths and processing",
            Page::Email => "Email notifications",
            Page::Report => "Reports and server user",
            Page::Samba => "Samba share",
            Page::RootPassword => "Administrator password",
            Page::Dependencies => "Dependencies",
            Page::CommandViewer => "Install commands",
            Page::FfmpegNote => "Ready to install",
            Page::Completion => "Installation complete",
            Page::Fatal => "Cannot continue",
        }
    }

    // Pages the user cannot leave except by quitting
    pub fn is_terminal(self) -> bool {
        matches!(self, Page::Completion | Page::Fatal)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavAction {
    Next,
    Back,
    ViewCommands,
    Fail,
}

impl NavAction {
    const ALL: [NavAction; 4] = [
        NavAction::Next,
        NavAction::Back,
        NavAction::ViewCommands,
        NavAction::Fail,
    ];
}

// Order of the Next chain; Back walks it in reverse
const FORWARD: [Page; 10] = [
    Page::License,
    Page::Intro,
    Page::Paths,
    Page::Email,
    Page::Report,
    Page::Samba,
    Page::RootPassword,
    Page::Dependencies,
    Page::FfmpegNote,
    Page::Completion,
];

pub fn transition(page: Page, action: NavAction) -> Option<Page> {
    match (page, action) {
        (Page::Fatal, _) => None,
        (_, NavAction::Fail) => Some(Page::Fatal),
        (Page::Dependencies, NavAction::ViewCommands) => Some(Page::CommandViewer),
        (Page::CommandViewer, NavAction::Back) => Some(Page::Dependencies),
        (Page::CommandViewer, _) | (Page::Completion, _) => None,
        (_, NavAction::Next) => {
            let idx = FORWARD.iter().position(|p| *p == page)?;
            FORWARD.get(idx + 1).copied()
        }
        (_, NavAction::Back) => {
            let idx = FORWARD.iter().position(|p| *p == page)?;
            idx.checked_sub(1).map(|prev| FORWARD[prev])
        }
        (_, NavAction::ViewCommands) => None,
    }
}

// Checks the table once at startup
pub fn validate_transitions() -> Result<(), String> {
    let mut reached = BTreeSet::from([Page::License]);
    let mut queue = vec![Page::License];
    while let Some(page) = queue.pop() {
        for action in NavAction::ALL {
            if let Some(target) = transition(page, action) {
                if !Page::ALL.contains(&target) {
                    return Err(format!("{page:?} leads to unknown page {target:?}"));
                }
                if reached.insert(target) {
                    queue.push(target);
                }
            }
        }
    }
    for page in Page::ALL {
        if !reached.contains(&page) {
            return Err(format!("{page:?} is not reachable from the first page"));
        }
        if page.is_terminal() {
            continue;
        }
        let has_exit = transition(page, NavAction::Next).is_some()
            || transition(page, NavAction::Back).is_some();
        if !has_exit {
            return Err(format!("{page:?} has no way forward or back"));
        }
    }
    Ok(())
}

// Enters a page and refreshes what it shows; may divert to the fatal page
pub fn go_to_page(ctx: &mut InstallerContext, page: Page) -> Page {
    ctx.page_message = None;
    log_debug(&format!("Entering page {page:?}"));
    match page {
        Page::Paths => {
            ctx.directory_preview = ctx.settings.directory_preview();
        }
        Page::Email => {
            ctx.email_problems = if ctx.settings.email.enabled {
                validate_email_settings(&ctx.settings.email)
            } else {
                Vec::new()
            };
        }
        Page::Report => {
            if let Err(err) = &ctx.environment.users {
                ctx.fatal = Some(err.clone());
                return transition(page, NavAction::Fail).unwrap_or(Page::Fatal);
            }
        }
        Page::Dependencies => {
            let jobs = ctx.jobs();
            ctx.dependencies.refresh(&ctx.environment, jobs);
            if let Some(report) = &ctx.dependencies.report {
                for (program, status) in &report.statuses {
                    log_debug(&format!("{}: {}", program.label(), status.label()));
                }
            }
        }
        _ => {}
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;
    use crate::settings::InstallerSettings;

    fn context(users: Result<Vec<String>, String>) -> InstallerContext {
        InstallerContext::new(
            InstallerSettings::default(),
            Environment {
                distribution: None,
                ram_devices: Err("No ram disk devices found".to_string()),
                users,
                search_path: Vec::new(),
                script_dir: None,
            },
        )
    }

    #[test]
    fn transition_table_is_valid() {
        assert_eq!(validate_transitions(), Ok(()));
    }

    #[test]
    fn next_walks_the_whole_wizard() {
        let mut page = Page::License;
        let mut visited = vec![page];
        while let Some(next) = transition(page, NavAction::Next) {
            visited.push(next);
            page = next;
        }
        assert_eq!(visited, FORWARD.to_vec());
    }

    #[test]
    fn ends_have_no_back() {
        assert_eq!(transition(Page::License, NavAction::Back), None);
        assert_eq!(transition(Page::Completion, NavAction::Back), None);
        assert_eq!(transition(Page::Intro, NavAction::Back), Some(Page::License));
    }

    #[test]
    fn command_viewer_round_trip() {
        assert_eq!(
            transition(Page::Dependencies, NavAction::ViewCommands),
            Some(Page::CommandViewer)
        );
        assert_eq!(
            transition(Page::CommandViewer, NavAction::Back),
            Some(Page::Dependencies)
        );
        assert_eq!(transition(Page::Paths, NavAction::ViewCommands), None);
    }

    #[test]
    fn fail_reaches_fatal_and_fatal_is_final() {
        for page in Page::ALL.iter().filter(|p| **p != Page::Fatal) {
            assert_eq!(transition(*page, NavAction::Fail), Some(Page::Fatal));
        }
        for action in NavAction::ALL {
            assert_eq!(transition(Page::Fatal, action), None);
        }
    }

    #[test]
    fn entering_a_page_clears_its_message() {
        let mut ctx = context(Ok(vec!["audio".to_string()]));
        ctx.set_error("old");
        assert_eq!(go_to_page(&mut ctx, Page::Samba), Page::Samba);
        assert!(ctx.page_message.is_none());
    }

    #[test]
    fn email_page_revalidates_on_entry() {
        let mut ctx = context(Ok(vec!["audio".to_string()]));
        ctx.settings.email.enabled = true;
        go_to_page(&mut ctx, Page::Email);
        assert!(!ctx.email_problems.is_empty());
        ctx.settings.email.enabled = false;
        go_to_page(&mut ctx, Page::Email);
        assert!(ctx.email_problems.is_empty());
    }

    #[test]
    fn paths_page_refreshes_preview() {
        let mut ctx = context(Ok(vec!["audio".to_string()]));
        ctx.settings.target_path = "/srv/hotfolder".to_string();
        go_to_page(&mut ctx, Page::Paths);
        assert!(ctx.directory_preview[0].contains("/srv/hotfolder"));
    }

    #[test]
    fn missing_users_divert_to_fatal() {
        let mut ctx = context(Err("No normal user accounts found".to_string()));
        assert_eq!(go_to_page(&mut ctx, Page::Report), Page::Fatal);
        assert_eq!(ctx.fatal.as_deref(), Some("No normal user accounts found"));
    }
}
