//! Shared types for the deadline reminder bot: deadline dates and the
//! per-user reminder store.

pub mod date;
pub mod store;

pub use date::{DateError, days_in_month, format_deadline, is_leap_year, parse_deadline};
pub use store::{Event, ExpiredEvent, Removal, ReminderStore, StoreError, Subject};
