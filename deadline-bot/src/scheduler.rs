//! Notification planning for one scheduler tick.
//!
//! Each tick runs three passes over the store:
//! 1. the daily digest, when the clock reads the configured reminder time,
//! 2. lead-time pings, on every tick,
//! 3. the daily digest again when the clock reads 08:00.
//!
//! Both digest triggers go through the same per-event "due today" marker, so
//! whichever fires second finds nothing left to send.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use deadline_types::{ReminderStore, format_deadline};

/// Fixed hour of the morning digest
const MORNING_DIGEST_HOUR: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Configured time of the daily digest
    pub daily_time: NaiveTime,
    /// Second digest trigger
    pub morning_time: NaiveTime,
    /// Whole days before a deadline at which a ping is sent
    pub ping_intervals: Vec<i64>,
}

impl ScheduleSettings {
    pub fn new(daily_time: NaiveTime, ping_intervals: Vec<i64>) -> Self {
        Self {
            daily_time,
            morning_time: NaiveTime::from_hms_opt(MORNING_DIGEST_HOUR, 0, 0).unwrap_or_default(),
            ping_intervals,
        }
    }
}

/// A message to deliver to one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: String,
    pub text: String,
}

/// True when `now` falls in the same minute as `anchor`
pub fn fires_at(now: NaiveDateTime, anchor: NaiveTime) -> bool {
    now.hour() == anchor.hour() && now.minute() == anchor.minute()
}

/// Collect one digest per user covering every event due `today` that has not
/// been announced yet today, marking each as announced.
pub fn collect_due_today(store: &mut ReminderStore, today: NaiveDate) -> Vec<Notification> {
    let mut digests = Vec::new();

    for (user_id, subjects) in store.users_mut() {
        let mut lines = String::new();

        for subject in subjects {
            let due: Vec<String> = subject
                .events()
                .iter()
                .filter(|e| e.deadline == today && subject.due_notice_sent_on(&e.name) != Some(today))
                .map(|e| e.name.clone())
                .collect();

            for name in due {
                lines.push_str(&format!("📍 **{}:** {} (Due Today!)\n", subject.name(), name));
                subject.mark_due_notice_sent(&name, today);
            }
        }

        if !lines.is_empty() {
            digests.push(Notification {
                user_id: user_id.to_string(),
                text: format!("📅 **Daily Reminder** \n\n{}", lines),
            });
        }
    }

    digests
}

/// Collect one ping per event whose remaining days exactly match a lead time
/// and that has not been pinged yet today.
pub fn collect_pings(store: &mut ReminderStore, today: NaiveDate, intervals: &[i64]) -> Vec<Notification> {
    let mut pings = Vec::new();

    for (user_id, subjects) in store.users_mut() {
        for subject in subjects {
            for event in subject.events_mut() {
                let days_left = event.days_remaining(today);
                if !intervals.contains(&days_left) || event.ping_sent_date == Some(today) {
                    continue;
                }

                pings.push(Notification {
                    user_id: user_id.to_string(),
                    text: format!(
                        "‼️ **{}** - **Deadline: {} (H-{})**‼️ <@{}>",
                        event.name,
                        format_deadline(event.deadline),
                        days_left,
                        user_id
                    ),
                });
                event.ping_sent_date = Some(today);
            }
        }
    }

    pings
}

/// Decide every notification for the tick at local time `now`.
///
/// Mutates sent markers; the caller persists the store afterwards.
pub fn plan_tick(
    store: &mut ReminderStore,
    now: NaiveDateTime,
    settings: &ScheduleSettings,
) -> Vec<Notification> {
    let today = now.date();
    let mut out = Vec::new();

    if fires_at(now, settings.daily_time) {
        out.extend(collect_due_today(store, today));
    }

    out.extend(collect_pings(store, today, &settings.ping_intervals));

    if fires_at(now, settings.morning_time) {
        out.extend(collect_due_today(store, today));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn settings(daily: (u32, u32)) -> ScheduleSettings {
        ScheduleSettings::new(NaiveTime::from_hms_opt(daily.0, daily.1, 0).unwrap(), vec![7, 3, 1])
    }

    #[test]
    fn test_fires_at_matches_minute() {
        let anchor = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let today = day(2026, 10, 16);
        assert!(fires_at(at(today, 9, 30), anchor));
        assert!(fires_at(today.and_hms_opt(9, 30, 59).unwrap(), anchor));
        assert!(!fires_at(at(today, 9, 31), anchor));
        assert!(!fires_at(at(today, 21, 30), anchor));
    }

    #[test]
    fn test_due_today_once_per_day() {
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", today);
        store.add_event("u1", "Math", "Later", day(2026, 10, 20));

        let first = collect_due_today(&mut store, today);
        assert_eq!(first.len(), 1);
        assert_eq!(
            first[0].text,
            "📅 **Daily Reminder** \n\n📍 **Math:** Quiz (Due Today!)\n"
        );
        assert_eq!(
            store.subject("u1", "Math").unwrap().due_notice_sent_on("Quiz"),
            Some(today)
        );

        assert!(collect_due_today(&mut store, today).is_empty());
    }

    #[test]
    fn test_digest_batches_per_user() {
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", today);
        store.add_event("u1", "Art", "Sketch", today);
        store.add_event("u2", "Math", "Quiz", today);
        store.add_event("u3", "Math", "Quiz", day(2026, 10, 17));

        let digests = collect_due_today(&mut store, today);
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].user_id, "u1");
        assert!(digests[0].text.contains("**Math:** Quiz"));
        assert!(digests[0].text.contains("**Art:** Sketch"));
        assert_eq!(digests[1].user_id, "u2");
    }

    #[test]
    fn test_ping_exact_lead_time_only() {
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Seven", day(2026, 10, 23));
        store.add_event("u1", "Math", "Six", day(2026, 10, 22));

        let pings = collect_pings(&mut store, today, &[7, 3, 1]);
        assert_eq!(pings.len(), 1);
        assert_eq!(
            pings[0].text,
            "‼️ **Seven** - **Deadline: 23-10-2026 (H-7)**‼️ <@u1>"
        );

        // Same day again: nothing new
        assert!(collect_pings(&mut store, today, &[7, 3, 1]).is_empty());

        // The event seen at 6 days out never catches up on the 7-day ping
        let next_day = today.succ_opt().unwrap();
        let pings = collect_pings(&mut store, next_day, &[7, 3, 1]);
        assert!(pings.iter().all(|p| !p.text.contains("**Six**")));
        assert!(pings.is_empty());
    }

    #[test]
    fn test_ping_repeats_at_next_interval() {
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", day(2026, 10, 23));

        assert_eq!(collect_pings(&mut store, day(2026, 10, 16), &[7, 3, 1]).len(), 1);
        assert_eq!(collect_pings(&mut store, day(2026, 10, 20), &[7, 3, 1]).len(), 1);
        assert_eq!(collect_pings(&mut store, day(2026, 10, 22), &[7, 3, 1]).len(), 1);
        assert!(collect_pings(&mut store, day(2026, 10, 23), &[7, 3, 1]).is_empty());
    }

    #[test]
    fn test_plan_tick_digest_only_at_anchor() {
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", today);

        assert!(plan_tick(&mut store, at(today, 6, 59), &settings((7, 0))).is_empty());
        assert_eq!(plan_tick(&mut store, at(today, 7, 0), &settings((7, 0))).len(), 1);
        // Morning trigger finds the marker already set
        assert!(plan_tick(&mut store, at(today, 8, 0), &settings((7, 0))).is_empty());
    }

    #[test]
    fn test_plan_tick_morning_trigger() {
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", today);

        // Daily time later in the day; 08:00 fires first
        let notes = plan_tick(&mut store, at(today, 8, 0), &settings((18, 0)));
        assert_eq!(notes.len(), 1);
        assert!(plan_tick(&mut store, at(today, 18, 0), &settings((18, 0))).is_empty());
    }

    #[test]
    fn test_plan_tick_same_anchor_no_double_send() {
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", today);

        let notes = plan_tick(&mut store, at(today, 8, 0), &settings((8, 0)));
        assert_eq!(notes.len(), 1);
    }
}
