use crate::channels::{ActionChoice, Reply, Tone};
use crate::massban::{JobProgress, JobSummary};
use crate::permissions::PermissionOverride;
use crate::shared::{ConfirmationToken, JobId};
use std::time::Duration;

pub const MISSING_BAN_PERMISSION: &str = ":x: Please give me the Ban Members permission.";
pub const ADMIN_ONLY: &str = ":x: Only administrators can change who may run massbans.";
pub const SIGNAL_NOT_ALLOWED: &str = "You are not allowed to control massban operations here.";
pub const JOB_NOT_RUNNING: &str = "That massban operation is no longer running.";
pub const NO_CANDIDATES: &str = ":x: No IDs were found in the provided list.";

pub fn describe_window(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    let (value, unit) = if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}

pub fn join_ids(ids: &[String]) -> Vec<u8> {
    ids.join(" ").into_bytes()
}

pub fn confirmation_prompt(
    candidate_ids: &[String],
    timeout: Duration,
    token: &ConfirmationToken,
) -> Reply {
    Reply::card(
        "Confirm Massban",
        Some(format!(
            "Please confirm that you would like to ban all of the following {} users ({}).",
            candidate_ids.len(),
            describe_window(timeout)
        )),
        Tone::Prompt,
    )
    .with_file("massban.txt", join_ids(candidate_ids))
    .with_choices(vec![
        ActionChoice::Confirm(token.clone()),
        ActionChoice::Cancel(token.clone()),
    ])
}

pub fn confirmation_closed() -> Reply {
    Reply::card(
        "Canceled",
        Some("Massban operation was canceled or expired.".to_string()),
        Tone::Danger,
    )
}

pub fn job_started(job_id: &JobId) -> Reply {
    Reply::card("Massban operation started", None, Tone::Info).with_choices(vec![
        ActionChoice::Stop(job_id.clone()),
        ActionChoice::ViewProgress(job_id.clone()),
    ])
}

pub fn job_stopped() -> Reply {
    Reply::card(
        "Stopped",
        Some(
            "Massban operation was stopped during execution. Existing bans will not be revoked."
                .to_string(),
        ),
        Tone::Danger,
    )
}

pub fn job_completed(summary: &JobSummary) -> Reply {
    if summary.failed.is_empty() {
        return Reply::card(
            "Massban complete",
            Some(format!("Massbanned {}.", summary.total)),
            Tone::Success,
        );
    }
    Reply::card(
        "Massban complete",
        Some(format!(
            "Attempted massbanning {} - {} passed, {} failed.",
            summary.total,
            summary.passed(),
            summary.failed.len()
        )),
        Tone::Success,
    )
    .with_file("failed.txt", join_ids(&summary.failed))
}

pub fn progress_text(progress: JobProgress) -> String {
    format!(
        "I have processed {} / {} bans.",
        progress.processed, progress.total
    )
}

pub fn overrides_listing(record: Option<&PermissionOverride>) -> Reply {
    let users: Vec<String> = record
        .map(|r| r.users.iter().map(|id| format!("<@{id}>")).collect())
        .unwrap_or_default();
    let roles: Vec<String> = record
        .map(|r| r.roles.iter().map(|id| format!("<@&{id}>")).collect())
        .unwrap_or_default();
    let render = |entries: &[String]| {
        if entries.is_empty() {
            "none".to_string()
        } else {
            entries.join(", ")
        }
    };
    Reply::card(
        "Massban access",
        Some(format!(
            "Administrators always have access.\nUsers: {}\nRoles: {}",
            render(&users),
            render(&roles)
        )),
        Tone::Info,
    )
}

pub fn help(lines: &[String]) -> Reply {
    Reply::card("Banhammer", Some(lines.join("\n")), Tone::Info)
}
