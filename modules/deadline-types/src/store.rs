//! In-memory reminder store: user -> subject -> ordered events.
//!
//! All structural invariants live here:
//! - a subject present in the store always has at least one event,
//! - a user present in the store always has at least one subject,
//! - event names are unique within a subject (last write wins).
//!
//! The serialized form is the flat JSON document written to `db.json`:
//! `{ userId: { subject: { "events": [...], "reminderSentDate": {...} } } }`.

use crate::date;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single named deadline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub name: String,
    #[serde(with = "date::dmy")]
    pub deadline: NaiveDate,
    /// Last day a lead-time ping went out for this event
    #[serde(
        rename = "reminderSentDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ping_sent_date: Option<NaiveDate>,
}

impl Event {
    pub fn new(name: impl Into<String>, deadline: NaiveDate) -> Self {
        Self {
            name: name.into(),
            deadline,
            ping_sent_date: None,
        }
    }

    /// Whole days from `today` until the deadline (negative once it has passed)
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.deadline - today).num_days()
    }
}

/// A named group of events owned by one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(skip)]
    name: String,
    events: Vec<Event>,
    /// Event name -> last day a "due today" notice was sent
    #[serde(rename = "reminderSentDate", default)]
    sent_markers: IndexMap<String, NaiveDate>,
}

impl Subject {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Mutable access to the events without the ability to add or remove any
    pub fn events_mut(&mut self) -> impl Iterator<Item = &mut Event> {
        self.events.iter_mut()
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn due_notice_sent_on(&self, event_name: &str) -> Option<NaiveDate> {
        self.sent_markers.get(event_name).copied()
    }

    pub fn mark_due_notice_sent(&mut self, event_name: &str, day: NaiveDate) {
        self.sent_markers.insert(event_name.to_string(), day);
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }

    fn remove_at(&mut self, index: usize) -> Event {
        let event = self.events.remove(index);
        self.sent_markers.shift_remove(&event.name);
        event
    }
}

/// What a delete removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// One event; `subject_removed` is set when it was the subject's last one
    Event { event: Event, subject_removed: bool },
    /// A whole subject with all its events
    Subject(Subject),
}

/// An event dropped by the expiry sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredEvent {
    pub user_id: String,
    pub subject: String,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    SubjectNotFound { subject: String },
    EventNotFound { subject: String, event: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::SubjectNotFound { subject } => write!(f, "subject '{}' not found", subject),
            StoreError::EventNotFound { subject, event } => {
                write!(f, "event '{}' not found under subject '{}'", event, subject)
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderStore {
    users: IndexMap<String, IndexMap<String, Subject>>,
}

impl ReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a store document and restore the in-memory invariants
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut store: ReminderStore = serde_json::from_str(text)?;
        store.normalize();
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Fill in subject names from their keys and drop empty subjects/users
    fn normalize(&mut self) {
        for subjects in self.users.values_mut() {
            for (name, subject) in subjects.iter_mut() {
                subject.name = name.clone();
            }
            subjects.retain(|_, s| !s.events.is_empty());
        }
        self.users.retain(|_, subjects| !subjects.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.users
            .values()
            .flat_map(|subjects| subjects.values())
            .map(|s| s.events.len())
            .sum()
    }

    pub fn subject(&self, user_id: &str, subject: &str) -> Option<&Subject> {
        self.users.get(user_id)?.get(subject)
    }

    /// A user's subjects in insertion order
    pub fn list_subjects(&self, user_id: &str) -> Vec<&Subject> {
        self.users
            .get(user_id)
            .map(|subjects| subjects.values().collect())
            .unwrap_or_default()
    }

    /// Every user with mutable access to their subjects
    pub fn users_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, indexmap::map::ValuesMut<'_, String, Subject>)> {
        self.users
            .iter_mut()
            .map(|(user_id, subjects)| (user_id.as_str(), subjects.values_mut()))
    }

    /// Append an event, creating the user and subject entries on first use.
    ///
    /// An existing event with the same name is replaced in place.
    pub fn add_event(
        &mut self,
        user_id: &str,
        subject: &str,
        event: &str,
        deadline: NaiveDate,
    ) -> &Subject {
        let entry = self
            .users
            .entry(user_id.to_string())
            .or_default()
            .entry(subject.to_string())
            .or_insert_with(|| Subject::new(subject));

        match entry.position(event) {
            Some(index) => {
                if entry.events[index].deadline != deadline {
                    entry.events[index].deadline = deadline;
                    entry.events[index].ping_sent_date = None;
                    entry.sent_markers.shift_remove(event);
                }
            }
            None => entry.events.push(Event::new(event, deadline)),
        }

        entry
    }

    /// Remove one event, or the whole subject when `event` is `None`
    pub fn delete_event(
        &mut self,
        user_id: &str,
        subject: &str,
        event: Option<&str>,
    ) -> Result<Removal, StoreError> {
        let subjects = self
            .users
            .get_mut(user_id)
            .filter(|subjects| subjects.contains_key(subject))
            .ok_or_else(|| StoreError::SubjectNotFound {
                subject: subject.to_string(),
            })?;

        let removal = match event {
            None => {
                let removed = subjects
                    .shift_remove(subject)
                    .ok_or_else(|| StoreError::SubjectNotFound {
                        subject: subject.to_string(),
                    })?;
                Removal::Subject(removed)
            }
            Some(name) => {
                let entry = subjects
                    .get_mut(subject)
                    .ok_or_else(|| StoreError::SubjectNotFound {
                        subject: subject.to_string(),
                    })?;
                let index = entry.position(name).ok_or_else(|| StoreError::EventNotFound {
                    subject: subject.to_string(),
                    event: name.to_string(),
                })?;
                let removed = entry.remove_at(index);
                let subject_removed = entry.events.is_empty();
                if subject_removed {
                    subjects.shift_remove(subject);
                }
                Removal::Event {
                    event: removed,
                    subject_removed,
                }
            }
        };

        if subjects.is_empty() {
            self.users.shift_remove(user_id);
        }

        Ok(removal)
    }

    /// Rename and/or move the deadline of an event.
    ///
    /// Both changes are optional and independent; with neither the event is
    /// returned untouched. A deadline change resets the event's sent markers.
    pub fn edit_event(
        &mut self,
        user_id: &str,
        subject: &str,
        event: &str,
        new_name: Option<&str>,
        new_deadline: Option<NaiveDate>,
    ) -> Result<&Event, StoreError> {
        let entry = self
            .users
            .get_mut(user_id)
            .and_then(|subjects| subjects.get_mut(subject))
            .ok_or_else(|| StoreError::SubjectNotFound {
                subject: subject.to_string(),
            })?;

        let mut index = entry.position(event).ok_or_else(|| StoreError::EventNotFound {
            subject: subject.to_string(),
            event: event.to_string(),
        })?;

        if let Some(deadline) = new_deadline {
            let target = &mut entry.events[index];
            if target.deadline != deadline {
                target.deadline = deadline;
                target.ping_sent_date = None;
                entry.sent_markers.shift_remove(event);
            }
        }

        if let Some(name) = new_name.filter(|name| *name != event) {
            if let Some(other) = entry.position(name) {
                entry.remove_at(other);
                if other < index {
                    index -= 1;
                }
            }
            entry.events[index].name = name.to_string();
            if let Some(day) = entry.sent_markers.shift_remove(event) {
                entry.sent_markers.insert(name.to_string(), day);
            }
        }

        Ok(&entry.events[index])
    }

    /// Drop every event whose deadline is before `today`, pruning emptied
    /// subjects and users, and return what was removed.
    pub fn remove_expired(&mut self, today: NaiveDate) -> Vec<ExpiredEvent> {
        let mut expired = Vec::new();

        for (user_id, subjects) in self.users.iter_mut() {
            for (name, subject) in subjects.iter_mut() {
                let mut index = 0;
                while index < subject.events.len() {
                    if subject.events[index].deadline < today {
                        let event = subject.remove_at(index);
                        expired.push(ExpiredEvent {
                            user_id: user_id.clone(),
                            subject: name.clone(),
                            event,
                        });
                    } else {
                        index += 1;
                    }
                }
            }
            subjects.retain(|_, s| !s.events.is_empty());
        }
        self.users.retain(|_, subjects| !subjects.is_empty());

        expired
    }
}
