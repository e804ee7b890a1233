//! Edit command - renames an event and/or moves its deadline

use super::{CommandContext, CommandError, validate_deadline};
use deadline_types::format_deadline;

pub fn execute(
    ctx: CommandContext<'_>,
    subject: &str,
    event: &str,
    new_event: Option<&str>,
    new_deadline: Option<&str>,
) -> Result<String, CommandError> {
    // Validate before touching the store so a bad date leaves the event as it was
    let new_date = new_deadline
        .map(|text| validate_deadline(text, ctx.today))
        .transpose()?;

    let edited = ctx
        .store
        .edit_event(ctx.user_id, subject, event, new_event, new_date)?;

    log::info!(
        "Edited event for user {}: [{}] {} -> {} ({})",
        ctx.user_id,
        subject,
        event,
        edited.name,
        format_deadline(edited.deadline)
    );

    ctx.db.save(ctx.store)?;

    Ok(format!(
        "Event **{}** under subject **{}** has been updated.",
        event, subject
    ))
}
