//! The single queue that owns the reminder store.
//!
//! Slash commands and scheduler ticks are both sent to one background task as
//! `Job`s and handled strictly one at a time, in arrival order. A job's I/O
//! (file writes, Discord DMs) is awaited before the next job starts, so the
//! store never sees two mutations at once and needs no locking.

use crate::commands::{self, Command, CommandContext, Reply};
use crate::config::AllowList;
use crate::db::ReminderDb;
use crate::delivery::Delivery;
use crate::scheduler::{self, ScheduleSettings};
use chrono::{Local, NaiveDate, NaiveDateTime};
use deadline_types::ReminderStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Pending jobs before senders start waiting
const QUEUE_CAPACITY: usize = 256;

/// Units of work for the store task
pub enum Job {
    /// A slash command; the reply goes back through `reply_tx`
    Command {
        user_id: String,
        command: Command,
        reply_tx: oneshot::Sender<Reply>,
    },
    /// One scheduler evaluation at the given local time
    Tick(NaiveDateTime),
}

/// Counts from one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub failed: usize,
}

/// Cloneable handle for submitting jobs
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Job>,
}

impl WorkerHandle {
    /// Queue a command and wait for its reply
    pub async fn submit(&self, user_id: &str, command: Command) -> Result<Reply, String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Job::Command {
                user_id: user_id.to_string(),
                command,
                reply_tx,
            })
            .await
            .map_err(|_| "Reminder worker is not running".to_string())?;

        reply_rx
            .await
            .map_err(|_| "Reminder worker dropped the command".to_string())
    }

    /// Queue a tick without waiting for it to run
    pub async fn tick(&self, now: NaiveDateTime) -> Result<(), String> {
        self.tx
            .send(Job::Tick(now))
            .await
            .map_err(|_| "Reminder worker is not running".to_string())
    }
}

/// Create the job queue
pub fn channel() -> (WorkerHandle, mpsc::Receiver<Job>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (WorkerHandle { tx }, rx)
}

pub struct ReminderWorker {
    store: ReminderStore,
    db: ReminderDb,
    delivery: Arc<dyn Delivery>,
    allow_list: AllowList,
    schedule: ScheduleSettings,
}

impl ReminderWorker {
    pub fn new(
        store: ReminderStore,
        db: ReminderDb,
        delivery: Arc<dyn Delivery>,
        allow_list: AllowList,
        schedule: ScheduleSettings,
    ) -> Self {
        Self {
            store,
            db,
            delivery,
            allow_list,
            schedule,
        }
    }

    /// Handle jobs until every handle has been dropped
    pub async fn run(mut self, mut rx: mpsc::Receiver<Job>) {
        log::info!(
            "[SCHEDULER] Worker started ({} reminder(s), daily digest at {}, pings at {:?} day(s))",
            self.store.event_count(),
            self.schedule.daily_time.format("%H:%M"),
            self.schedule.ping_intervals
        );

        while let Some(job) = rx.recv().await {
            match job {
                Job::Command {
                    user_id,
                    command,
                    reply_tx,
                } => {
                    let reply = self.run_command(&user_id, command, Local::now().date_naive());
                    if reply_tx.send(reply).is_err() {
                        log::warn!("Commands: Reply for user {} was dropped", user_id);
                    }
                }
                Job::Tick(now) => {
                    self.run_tick(now).await;
                }
            }
        }

        log::info!("[SCHEDULER] Worker stopped");
    }

    pub fn run_command(&mut self, user_id: &str, command: Command, today: NaiveDate) -> Reply {
        commands::execute(
            command,
            &self.allow_list,
            CommandContext {
                user_id,
                today,
                store: &mut self.store,
                db: &self.db,
            },
        )
    }

    /// Evaluate the schedule at `now`, deliver what is due and persist markers
    pub async fn run_tick(&mut self, now: NaiveDateTime) -> TickReport {
        let notifications = scheduler::plan_tick(&mut self.store, now, &self.schedule);
        let mut report = TickReport::default();

        for note in &notifications {
            match self.delivery.send(&note.user_id, &note.text).await {
                Ok(()) => {
                    report.sent += 1;
                    log::info!("[SCHEDULER] Sent reminder to {}", note.user_id);
                }
                Err(e) => {
                    report.failed += 1;
                    log::error!("[SCHEDULER] Failed to notify {}: {}", note.user_id, e);
                }
            }
        }

        // Markers must survive a restart even when nothing went out
        if let Err(e) = self.db.save(&self.store) {
            log::error!("[SCHEDULER] Failed to write reminders after tick: {}", e);
        }

        if !notifications.is_empty() {
            log::debug!(
                "[SCHEDULER] Tick at {}: {} sent, {} failed",
                now.format("%Y-%m-%d %H:%M"),
                report.sent,
                report.failed
            );
        }

        report
    }
}

/// Queue a tick every `period`, stamped with the local wall-clock time
pub fn spawn_ticker(handle: WorkerHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = handle.tick(Local::now().naive_local()).await {
                log::warn!("[SCHEDULER] Ticker stopping: {}", e);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::RecordingDelivery;
    use chrono::NaiveTime;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn worker_with(
        store: ReminderStore,
        delivery: Arc<RecordingDelivery>,
        dir: &tempfile::TempDir,
    ) -> ReminderWorker {
        ReminderWorker::new(
            store,
            ReminderDb::new(dir.path().join("db.json")),
            delivery,
            AllowList::new(["u1", "u2"]),
            ScheduleSettings::new(NaiveTime::from_hms_opt(7, 0, 0).unwrap(), vec![7, 3, 1]),
        )
    }

    #[tokio::test]
    async fn test_tick_sends_digest_once_and_persists_marker() {
        let dir = tempfile::tempdir().unwrap();
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", today);

        let delivery = Arc::new(RecordingDelivery::default());
        let mut worker = worker_with(store, delivery.clone(), &dir);

        let at_seven = today.and_hms_opt(7, 0, 0).unwrap();
        assert_eq!(worker.run_tick(at_seven).await, TickReport { sent: 1, failed: 0 });
        assert_eq!(worker.run_tick(at_seven).await, TickReport::default());
        assert_eq!(delivery.messages().len(), 1);

        // A restarted process sees the marker and stays quiet
        let reloaded = ReminderDb::new(dir.path().join("db.json")).load();
        assert_eq!(
            reloaded.subject("u1", "Math").unwrap().due_notice_sent_on("Quiz"),
            Some(today)
        );
        let mut restarted = worker_with(reloaded, delivery.clone(), &dir);
        let morning = today.and_hms_opt(8, 0, 0).unwrap();
        assert_eq!(restarted.run_tick(morning).await, TickReport::default());
    }

    #[tokio::test]
    async fn test_tick_persists_without_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = Arc::new(RecordingDelivery::default());
        let mut worker = worker_with(ReminderStore::new(), delivery, &dir);

        worker.run_tick(day(2026, 10, 16).and_hms_opt(12, 34, 0).unwrap()).await;
        assert!(dir.path().join("db.json").exists());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let today = day(2026, 10, 16);
        let mut store = ReminderStore::new();
        store.add_event("u1", "Math", "Quiz", day(2026, 10, 23));
        store.add_event("u2", "Art", "Sketch", day(2026, 10, 19));

        let delivery = Arc::new(RecordingDelivery::failing_for("u1"));
        let mut worker = worker_with(store, delivery.clone(), &dir);

        let report = worker.run_tick(today.and_hms_opt(10, 0, 0).unwrap()).await;
        assert_eq!(report, TickReport { sent: 1, failed: 1 });
        assert_eq!(delivery.messages()[0].0, "u2");

        // Not retried later the same day
        let report = worker.run_tick(today.and_hms_opt(10, 1, 0).unwrap()).await;
        assert_eq!(report, TickReport::default());
    }

    #[tokio::test]
    async fn test_queue_runs_commands_and_ticks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = Arc::new(RecordingDelivery::default());
        let worker = worker_with(ReminderStore::new(), delivery.clone(), &dir);

        let (handle, rx) = channel();
        let task = tokio::spawn(worker.run(rx));

        // A deadline a week from the real current date, so the add is accepted
        // and the next tick pings it at the 7-day lead time.
        let now = Local::now().naive_local();
        let deadline = (now.date() + chrono::Duration::days(7)).format("%d-%m-%Y").to_string();

        let reply = handle
            .submit(
                "u1",
                Command::Add {
                    subject: "Math".into(),
                    event: "Quiz".into(),
                    deadline,
                },
            )
            .await
            .unwrap();
        assert!(!reply.ephemeral, "{}", reply.content);

        handle.tick(now).await.unwrap();
        let reply = handle.submit("u1", Command::Schedule).await.unwrap();
        assert!(reply.content.contains("Quiz"));

        // The schedule reply was produced after the tick finished
        let messages = delivery.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains("(H-7)"));

        let denied = handle.submit("stranger", Command::Schedule).await.unwrap();
        assert_eq!(denied.content, commands::permission_denied_message());

        drop(handle);
        task.await.unwrap();
    }
}
