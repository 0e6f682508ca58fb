use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, token::Ttls, Result};

/// Typed configuration for the service, loaded from the environment
/// (with an optional `.env` file next to the binary).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_owner_id: i64,
    /// URL path for webhook delivery. `None` means long polling.
    pub telegram_webhook_path: Option<String>,

    // Web
    /// Public origin used in links sent to the owner, without trailing slash.
    pub public_base_url: String,
    pub listen_addr: String,

    // Storage
    pub data_dir: PathBuf,

    // Tokens
    pub token_ttls: Ttls,
    /// Rotate the access key on this period. `None` means never.
    pub key_rotate_every: Option<Duration>,

    // Polling
    pub poll_backoff: Duration,
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

        let telegram_owner_id = env_i64("TELEGRAM_OWNER_ID").unwrap_or(0);
        if telegram_owner_id == 0 {
            return Err(Error::Config(
                "TELEGRAM_OWNER_ID environment variable is required".to_string(),
            ));
        }

        let public_base_url = env_str("PUBLIC_BASE_URL")
            .and_then(non_empty)
            .map(|s| s.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                Error::Config("PUBLIC_BASE_URL environment variable is required".to_string())
            })?;

        let listen_addr = env_str("LISTEN_ADDR")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0:8088".to_string());

        let telegram_webhook_path = env_str("TELEGRAM_WEBHOOK_PATH").and_then(non_empty);
        if let Some(path) = &telegram_webhook_path {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "TELEGRAM_WEBHOOK_PATH must start with '/': {path}"
                )));
            }
        }

        let data_dir =
            PathBuf::from(env_str("DATA_DIR").unwrap_or_else(|| "/var/lib/quill".to_string()));

        let token_ttls = Ttls {
            preview_min: env_u32("TOKEN_TTL_PREVIEW_MIN").unwrap_or(0),
            view_min: env_u32("TOKEN_TTL_VIEW_MIN").unwrap_or(0),
            share_min: env_u32("TOKEN_TTL_SHARE_MIN").unwrap_or(0),
        };

        let key_rotate_every = match env_u64("KEY_ROTATE_MIN").unwrap_or(0) {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        };

        let poll_backoff = Duration::from_secs(env_u64("POLL_BACKOFF_SECS").unwrap_or(3));

        let cfg = Self {
            telegram_bot_token,
            telegram_owner_id,
            telegram_webhook_path,
            public_base_url,
            listen_addr,
            data_dir,
            token_ttls,
            key_rotate_every,
            poll_backoff,
        };

        fs::create_dir_all(cfg.files_dir())?;

        Ok(cfg)
    }

    /// Directory where ingested attachments live, served under `/file/`.
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
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

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
