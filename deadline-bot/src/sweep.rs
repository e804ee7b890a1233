//! One-time startup compaction: drops events whose deadline has passed.

use crate::db::ReminderDb;
use chrono::NaiveDate;
use deadline_types::{ReminderStore, format_deadline};

/// Remove every event with a deadline before `today`, log each removal and
/// persist once. Returns the number of events removed.
pub fn run(store: &mut ReminderStore, db: &ReminderDb, today: NaiveDate) -> usize {
    let expired = store.remove_expired(today);

    for item in &expired {
        log::info!(
            "[SWEEP] Deleting past reminder for user {}: [{}] {} (Deadline: {})",
            item.user_id,
            item.subject,
            item.event.name,
            format_deadline(item.event.deadline)
        );
    }

    if let Err(e) = db.save(store) {
        log::error!("[SWEEP] Failed to write reminders after sweep: {}", e);
    }

    log::info!(
        "[SWEEP] Removed {} expired reminder(s), {} remaining",
        expired.len(),
        store.event_count()
    );

    expired.len()
}
