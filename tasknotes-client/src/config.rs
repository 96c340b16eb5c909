//! Client configuration from environment variables.

use std::time::Duration;
use tasknotes_core::{NoteError, NoteResult};

pub const DEFAULT_TABLE: &str = "appnotes";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Project base URL, e.g. `https://xyzcompany.supabase.co`
    pub supabase_url: String,
    /// Public anon key sent as `apikey` on every request
    pub anon_key: String,
    pub table: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(supabase_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            table: DEFAULT_TABLE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY` (required), plus
    /// `TASKNOTES_TABLE` and `TASKNOTES_TIMEOUT_SECS`.
    pub fn from_env() -> NoteResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> NoteResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("SUPABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| NoteError::Config("SUPABASE_URL not set".to_string()))?;
        let anon_key = lookup("SUPABASE_ANON_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| NoteError::Config("SUPABASE_ANON_KEY not set".to_string()))?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NoteError::Config(format!(
                "SUPABASE_URL must be an http(s) URL, got {url}"
            )));
        }

        let mut config = Self::new(url, anon_key);

        if let Some(table) = lookup("TASKNOTES_TABLE").filter(|v| !v.is_empty()) {
            config.table = table;
        }

        if let Some(raw) = lookup("TASKNOTES_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| {
                NoteError::Config(format!("TASKNOTES_TIMEOUT_SECS must be a number, got {raw}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
