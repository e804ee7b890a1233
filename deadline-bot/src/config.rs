use crate::scheduler::ScheduleSettings;
use chrono::NaiveTime;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;

const DEFAULT_CONFIG_PATH: &str = "./config.json";
const DEFAULT_DB_PATH: &str = "./db.json";
const DEFAULT_DAILY_REMINDER_TIME: &str = "07:00";
const DEFAULT_PING_INTERVALS: [i64; 3] = [7, 3, 1];
const DEFAULT_TICK_SECS: u64 = 60;

/// Optional `config.json` next to the bot
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    token: Option<String>,
    #[serde(default)]
    whitelist: Vec<String>,
    daily_reminder_time: Option<String>,
    ping_intervals: Option<Vec<i64>>,
}

/// User ids allowed to run commands
#[derive(Debug, Clone, Default)]
pub struct AllowList(HashSet<String>);

impl AllowList {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.0.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub db_path: String,
    pub log_file: Option<String>,
    pub tick_secs: u64,
    pub allow_list: AllowList,
    pub schedule: ScheduleSettings,
}

impl Config {
    /// Read configuration from the environment and the JSON config file.
    ///
    /// Recognized variables: `DISCORD_BOT_TOKEN`, `REMINDER_CONFIG_PATH`,
    /// `REMINDER_DB_PATH`, `REMINDER_LOG_FILE`, `REMINDER_TICK_SECS`.
    pub fn from_env() -> Result<Self, String> {
        let config_path =
            env::var("REMINDER_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file_text = match std::fs::read_to_string(&config_path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(format!("Failed to read config file {}: {}", config_path, e)),
        };

        Self::build(file_text.as_deref(), |key| env::var(key).ok())
    }

    /// Combine the config file (if any) with variables looked up through `var`.
    /// Environment values win over the file.
    fn build(file_text: Option<&str>, var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let file: FileConfig = match file_text {
            Some(text) => serde_json::from_str(text)
                .map_err(|e| format!("Invalid config file: {}", e))?,
            None => FileConfig::default(),
        };

        let bot_token = var("DISCORD_BOT_TOKEN")
            .or(file.token)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "DISCORD_BOT_TOKEN must be set (or `token` in the config file)".to_string())?;

        let tick_secs = match var("REMINDER_TICK_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| format!("REMINDER_TICK_SECS must be a positive number, got '{}'", raw))?,
            None => DEFAULT_TICK_SECS,
        };

        let daily_time = parse_clock_time(
            file.daily_reminder_time
                .as_deref()
                .unwrap_or(DEFAULT_DAILY_REMINDER_TIME),
        )?;

        let ping_intervals = file
            .ping_intervals
            .unwrap_or_else(|| DEFAULT_PING_INTERVALS.to_vec());
        if let Some(bad) = ping_intervals.iter().find(|days| **days < 0) {
            return Err(format!("pingIntervals must not be negative, got {}", bad));
        }

        Ok(Self {
            bot_token,
            db_path: var("REMINDER_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            log_file: var("REMINDER_LOG_FILE").filter(|p| !p.is_empty()),
            tick_secs,
            allow_list: AllowList::new(file.whitelist),
            schedule: ScheduleSettings::new(daily_time, ping_intervals),
        })
    }
}

/// Parse an `HH:MM` wall-clock time
fn parse_clock_time(text: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|_| format!("dailyReminderTime must be HH:MM, got '{}'", text))
}
