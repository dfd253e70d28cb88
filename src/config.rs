use std::env::var;
use std::str::FromStr;

use dotenvy::dotenv;

pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub redis_url: String,
    pub queue_name: String,
    pub reminder_lead_hours: i64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub dispatcher_workers: usize,
    pub heartbeat_secs: u64,
    pub job_history_limit: usize,
    pub mail_api_url: String,
    pub mail_from: String,
}

impl Config {
    pub fn try_parse() -> Result<Config, String> {
        let _ = dotenv();

        Ok(Config {
            port: var("PORT")
                .map_err(|_| "An error occured while getting PORT env param")?
                .parse::<u16>()
                .map_err(|_| "An error occured while parsing PORT env param")?,
            scheme: var("SCHEME").map_err(|_| "An error occured while getting SCHEME env param")?,
            host: var("HOST").map_err(|_| "An error occured while getting HOST env param")?,
            redis_url: var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            queue_name: var("QUEUE_NAME").unwrap_or_else(|_| "reminders".to_string()),
            reminder_lead_hours: numeric("REMINDER_LEAD_HOURS", 24)?,
            max_attempts: numeric("MAX_ATTEMPTS", 3)?,
            backoff_base_ms: numeric("BACKOFF_BASE_MS", 30_000)?,
            backoff_cap_ms: numeric("BACKOFF_CAP_MS", 600_000)?,
            dispatcher_workers: numeric("DISPATCHER_WORKERS", 5)?,
            heartbeat_secs: numeric("HEARTBEAT_SECS", 30)?,
            job_history_limit: numeric("JOB_HISTORY_LIMIT", 50)?,
            mail_api_url: var("MAIL_API_URL")
                .map_err(|_| "An error occured while getting MAIL_API_URL env param")?,
            mail_from: var("MAIL_FROM")
                .unwrap_or_else(|_| "noreply@appointments.local".to_string()),
        })
    }
}

fn numeric<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("An error occured while parsing {key} env param")),
        Err(_) => Ok(default),
    }
}
