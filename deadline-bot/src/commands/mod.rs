//! Slash command handling: `add`, `schedule`, `delete` and `edit`.
//!
//! Every command runs to completion against the store in one step and
//! produces exactly one reply for the invoking user.

mod add;
mod delete;
mod edit;
mod schedule;

use crate::config::AllowList;
use crate::db::{DbError, ReminderDb};
use chrono::NaiveDate;
use deadline_types::{DateError, ReminderStore, StoreError, format_deadline, parse_deadline};
use std::collections::HashMap;
use std::fmt;

/// The commands users can run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/add subject event deadline`
    Add {
        subject: String,
        event: String,
        deadline: String,
    },
    /// `/schedule`
    Schedule,
    /// `/delete subject [event]`
    Delete {
        subject: String,
        event: Option<String>,
    },
    /// `/edit subject event [new_event] [new_deadline]`
    Edit {
        subject: String,
        event: String,
        new_event: Option<String>,
        new_deadline: Option<String>,
    },
}

/// Build a command from a slash command name and its string options.
///
/// Returns `None` for unknown commands or when a required option is missing.
/// Empty optional values count as absent.
pub fn parse(name: &str, options: &HashMap<String, String>) -> Option<Command> {
    let value = |key: &str| options.get(key).filter(|v| !v.is_empty()).cloned();

    let command = match name {
        "add" => Command::Add {
            subject: value("subject")?,
            event: value("event")?,
            deadline: value("deadline")?,
        },
        "schedule" => Command::Schedule,
        "delete" => Command::Delete {
            subject: value("subject")?,
            event: value("event"),
        },
        "edit" => Command::Edit {
            subject: value("subject")?,
            event: value("event")?,
            new_event: value("new_event"),
            new_deadline: value("new_deadline"),
        },
        _ => {
            log::debug!("Commands: Unknown command '{}'", name);
            return None;
        }
    };

    Some(command)
}

/// A reply to one command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Only visible to the invoking user
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Failures a command can report back to the user
#[derive(Debug)]
pub enum CommandError {
    InvalidDate(DateError),
    PastDeadline(NaiveDate),
    NotFound(StoreError),
    Persistence(DbError),
}

impl CommandError {
    /// Text shown to the user who ran the command
    pub fn user_message(&self) -> String {
        match self {
            CommandError::InvalidDate(e) => format!(
                "Invalid date ({}). Please use a valid date in DD-MM-YYYY format.",
                e
            ),
            CommandError::PastDeadline(_) => "Cannot set a reminder for a past date.".to_string(),
            CommandError::NotFound(StoreError::SubjectNotFound { subject }) => {
                format!("Subject **{}** not found.", subject)
            }
            CommandError::NotFound(StoreError::EventNotFound { subject, event }) => {
                format!("Event **{}** not found under subject **{}**.", event, subject)
            }
            CommandError::Persistence(_) => {
                "Error saving your reminders. Please try again later.".to_string()
            }
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::InvalidDate(e) => write!(f, "invalid deadline: {}", e),
            CommandError::PastDeadline(d) => write!(f, "deadline {} is in the past", format_deadline(*d)),
            CommandError::NotFound(e) => write!(f, "{}", e),
            CommandError::Persistence(e) => write!(f, "failed to persist reminders: {}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<DateError> for CommandError {
    fn from(e: DateError) -> Self {
        CommandError::InvalidDate(e)
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::NotFound(e)
    }
}

impl From<DbError> for CommandError {
    fn from(e: DbError) -> Self {
        CommandError::Persistence(e)
    }
}

/// Everything a command needs to run
pub struct CommandContext<'a> {
    pub user_id: &'a str,
    /// The local calendar date at the moment the command runs
    pub today: NaiveDate,
    pub store: &'a mut ReminderStore,
    pub db: &'a ReminderDb,
}

/// Validate a deadline string and reject dates before `today`
fn validate_deadline(text: &str, today: NaiveDate) -> Result<NaiveDate, CommandError> {
    let deadline = parse_deadline(text)?;
    if deadline < today {
        return Err(CommandError::PastDeadline(deadline));
    }
    Ok(deadline)
}

/// Execute a command and return the reply
pub fn execute(cmd: Command, allow_list: &AllowList, ctx: CommandContext<'_>) -> Reply {
    if !allow_list.is_allowed(ctx.user_id) {
        log::warn!("Commands: Unauthorized access attempt by {}", ctx.user_id);
        return Reply::ephemeral(permission_denied_message());
    }

    let user_id = ctx.user_id.to_string();
    let result = match cmd {
        Command::Add {
            subject,
            event,
            deadline,
        } => add::execute(ctx, &subject, &event, &deadline),
        Command::Schedule => return schedule::execute(ctx),
        Command::Delete { subject, event } => delete::execute(ctx, &subject, event.as_deref()),
        Command::Edit {
            subject,
            event,
            new_event,
            new_deadline,
        } => edit::execute(
            ctx,
            &subject,
            &event,
            new_event.as_deref(),
            new_deadline.as_deref(),
        ),
    };

    match result {
        Ok(message) => Reply::public(message),
        Err(e) => {
            match &e {
                CommandError::Persistence(_) => {
                    log::error!("Commands: Write failed for user {}: {}", user_id, e)
                }
                CommandError::NotFound(_) => {
                    log::warn!("Commands: User {}: {}", user_id, e)
                }
                _ => log::info!("Commands: Rejected input from user {}: {}", user_id, e),
            }
            Reply::ephemeral(e.user_message())
        }
    }
}

/// Message shown when a user outside the allow-list runs a command
pub fn permission_denied_message() -> String {
    "You are not authorized to use this bot.".to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    /// Store, database file and allow-list for a single test user "u1"
    pub(crate) struct Fixture {
        pub store: ReminderStore,
        pub db: ReminderDb,
        pub allow_list: AllowList,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                store: ReminderStore::new(),
                db: ReminderDb::new(dir.path().join("db.json")),
                allow_list: AllowList::new(["u1"]),
                _dir: dir,
            }
        }

        pub(crate) fn run(&mut self, cmd: Command) -> Reply {
            self.run_as("u1", cmd)
        }

        pub(crate) fn run_as(&mut self, user_id: &str, cmd: Command) -> Reply {
            execute(
                cmd,
                &self.allow_list,
                CommandContext {
                    user_id,
                    today: today(),
                    store: &mut self.store,
                    db: &self.db,
                },
            )
        }

        pub(crate) fn add(&mut self, subject: &str, event: &str, deadline: &str) -> Reply {
            self.run(Command::Add {
                subject: subject.into(),
                event: event.into(),
                deadline: deadline.into(),
            })
        }
    }

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_add() {
        let cmd = parse(
            "add",
            &options(&[("subject", "Math"), ("event", "Quiz"), ("deadline", "02-11-2026")]),
        );
        assert_eq!(
            cmd,
            Some(Command::Add {
                subject: "Math".into(),
                event: "Quiz".into(),
                deadline: "02-11-2026".into()
            })
        );

        // Missing deadline
        assert!(parse("add", &options(&[("subject", "Math"), ("event", "Quiz")])).is_none());
    }

    #[test]
    fn test_parse_optional_options() {
        assert_eq!(
            parse("delete", &options(&[("subject", "Math")])),
            Some(Command::Delete {
                subject: "Math".into(),
                event: None
            })
        );
        assert_eq!(
            parse(
                "edit",
                &options(&[("subject", "Math"), ("event", "Quiz"), ("new_event", "")])
            ),
            Some(Command::Edit {
                subject: "Math".into(),
                event: "Quiz".into(),
                new_event: None,
                new_deadline: None
            })
        );
    }

    #[test]
    fn test_parse_schedule_and_unknown() {
        assert_eq!(parse("schedule", &HashMap::new()), Some(Command::Schedule));
        assert!(parse("remind", &HashMap::new()).is_none());
    }

    #[test]
    fn test_unauthorized_rejected_uniformly() {
        let mut fx = Fixture::new();
        for cmd in [
            Command::Schedule,
            Command::Add {
                subject: "Math".into(),
                event: "Quiz".into(),
                deadline: "02-11-2026".into(),
            },
            Command::Delete {
                subject: "Math".into(),
                event: None,
            },
        ] {
            let reply = fx.run_as("intruder", cmd);
            assert_eq!(reply, Reply::ephemeral(permission_denied_message()));
        }
        assert!(fx.store.is_empty());
        assert!(!fx.db.path().exists());
    }

    #[test]
    fn test_error_messages_are_distinct() {
        let subject = CommandError::NotFound(StoreError::SubjectNotFound {
            subject: "Math".into(),
        });
        let event = CommandError::NotFound(StoreError::EventNotFound {
            subject: "Math".into(),
            event: "Quiz".into(),
        });
        assert_ne!(subject.user_message(), event.user_message());
    }

    #[test]
    fn test_persistence_failure_keeps_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let db = ReminderDb::new(dir.path().join("missing").join("db.json"));
        let mut store = ReminderStore::new();

        let reply = execute(
            Command::Add {
                subject: "Math".into(),
                event: "Quiz".into(),
                deadline: "02-11-2026".into(),
            },
            &AllowList::new(["u1"]),
            CommandContext {
                user_id: "u1",
                today: today(),
                store: &mut store,
                db: &db,
            },
        );

        assert!(reply.ephemeral);
        assert!(reply.content.contains("try again later"));
        assert!(store.subject("u1", "Math").is_some());
    }
}
