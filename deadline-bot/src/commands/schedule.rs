//! Schedule command - lists every subject and event for the user

use super::{CommandContext, Reply};
use deadline_types::{Subject, format_deadline};

/// Render subjects and their events in storage order
pub fn render(subjects: &[&Subject]) -> String {
    let mut out = String::from("REMINDER\n\n");
    for subject in subjects {
        out.push_str(&format!("📍**{}**\n", subject.name()));
        for (index, event) in subject.events().iter().enumerate() {
            out.push_str(&format!(
                "{}. **{}**\n   ({})\n",
                index + 1,
                event.name,
                format_deadline(event.deadline)
            ));
        }
        out.push('\n');
    }
    out
}

pub fn execute(ctx: CommandContext<'_>) -> Reply {
    let subjects = ctx.store.list_subjects(ctx.user_id);

    if subjects.is_empty() {
        log::info!("Displayed schedule for user {}, but user has no reminders", ctx.user_id);
        return Reply::ephemeral("You have no reminders.");
    }

    log::info!("Displayed schedule for user {}", ctx.user_id);
    Reply::public(render(&subjects))
}
