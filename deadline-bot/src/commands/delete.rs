//! Delete command - removes one event, or a whole subject when no event is given

use super::{CommandContext, CommandError};
use deadline_types::Removal;

pub fn execute(
    ctx: CommandContext<'_>,
    subject: &str,
    event: Option<&str>,
) -> Result<String, CommandError> {
    let removal = ctx.store.delete_event(ctx.user_id, subject, event)?;
    ctx.db.save(ctx.store)?;

    let message = match removal {
        Removal::Event {
            event,
            subject_removed,
        } => {
            log::info!(
                "Deleted event for user {}: [{}] {}{}",
                ctx.user_id,
                subject,
                event.name,
                if subject_removed { " (subject now empty, removed)" } else { "" }
            );
            format!(
                "Event **{}** under subject **{}** has been deleted.",
                event.name, subject
            )
        }
        Removal::Subject(removed) => {
            log::info!(
                "Deleted subject for user {}: [{}] with {} event(s)",
                ctx.user_id,
                subject,
                removed.events().len()
            );
            format!("Subject **{}** has been deleted.", subject)
        }
    };

    Ok(message)
}
