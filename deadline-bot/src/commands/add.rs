//! Add command - registers a new deadline under a subject

use super::{CommandContext, CommandError, validate_deadline};

pub fn execute(
    ctx: CommandContext<'_>,
    subject: &str,
    event: &str,
    deadline: &str,
) -> Result<String, CommandError> {
    let date = validate_deadline(deadline, ctx.today)?;

    ctx.store.add_event(ctx.user_id, subject, event, date);
    ctx.db.save(ctx.store)?;

    log::info!(
        "Added reminder for user {}: [{}] {} ({})",
        ctx.user_id,
        subject,
        event,
        deadline
    );

    Ok(format!(
        "Reminder added for **{}**: **{}** (Deadline: {})",
        subject, event, deadline
    ))
}
