//! Shared event rendering for terminal output.
//! Used by both the interactive loop and `voxturn follow`.

use crate::conversation::{NoticeKind, OrchestratorEvent, OrchestratorState, Role, Severity};

const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Clear the current terminal line.
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

fn state_color(state: OrchestratorState) -> &'static str {
    match state {
        OrchestratorState::Idle => DIM,
        OrchestratorState::Listening => GREEN,
        OrchestratorState::Dispatching => YELLOW,
        OrchestratorState::Speaking => CYAN,
        OrchestratorState::Erroring => RED,
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
    }
}

/// One line describing `event`, with ANSI colors.
pub fn format_event(event: &OrchestratorEvent) -> String {
    match event {
        OrchestratorEvent::StateChanged { to, .. } => {
            let color = state_color(*to);
            format!("{color}● {}{RESET} {DIM}{}{RESET}", to, to.status_text())
        }
        OrchestratorEvent::Notice(notice) => match notice.severity {
            Severity::Error => format!("{RED}✗ {}{RESET}", notice.message),
            Severity::Info if notice.kind == NoticeKind::InactivityTimeout => {
                format!("{YELLOW}⏱ {}{RESET}", notice.message)
            }
            Severity::Info => format!("{DIM}{}{RESET}", notice.message),
        },
        OrchestratorEvent::TurnCommitted { user, assistant } => {
            let reply = if assistant.content().is_empty() {
                format!("{DIM}(audio only){RESET}")
            } else {
                assistant.content().to_string()
            };
            format!(
                "{DIM}{}:{RESET} {}\n{CYAN}{}:{RESET} {reply}",
                role_label(user.role()),
                user.content(),
                role_label(assistant.role()),
            )
        }
    }
}

/// Render an orchestrator event to stderr.
pub fn render_event(event: &OrchestratorEvent) {
    clear_line();
    eprintln!("{}", format_event(event));
}
