use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration, loaded from environment variables (with `.env`
/// support for local runs).
#[derive(Clone, Debug)]
pub struct Config {
    // Required secrets
    pub telegram_bot_token: String,
    pub convertio_api_key: String,

    /// Optional allow-list. Empty means the bot answers everyone.
    pub telegram_allowed_users: Vec<i64>,

    // Polling policy for conversion jobs
    pub poll_max_attempts: u32,
    pub poll_interval: Duration,

    /// Uploads larger than this are refused before download.
    pub max_file_size: u64,

    /// Idle sessions (pending file / awaiting-format flag) expire after this.
    pub session_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let convertio_api_key = env_str("CONVERTIO_API_KEY").unwrap_or_default();
        if convertio_api_key.trim().is_empty() {
            return Err(Error::Config(
                "CONVERTIO_API_KEY environment variable is required".to_string(),
            ));
        }

        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        let poll_max_attempts = env_u32("POLL_MAX_ATTEMPTS").unwrap_or(30).max(1);
        let poll_interval = Duration::from_millis(env_u64("POLL_INTERVAL_MS").unwrap_or(2_000));

        let max_file_size = env_u64("MAX_FILE_SIZE").unwrap_or(10 * 1024 * 1024);
        let session_ttl = Duration::from_secs(env_u64("SESSION_TTL_SECS").unwrap_or(1_800));

        Ok(Self {
            telegram_bot_token,
            convertio_api_key,
            telegram_allowed_users,
            poll_max_attempts,
            poll_interval,
            max_file_size,
            session_ttl,
        })
    }
}

pub fn is_authorized(user_id: Option<i64>, allowed_users: &[i64]) -> bool {
    if allowed_users.is_empty() {
        return true;
    }
    let Some(user_id) = user_id else {
        return false;
    };
    allowed_users.contains(&user_id)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
