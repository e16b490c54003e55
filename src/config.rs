use std::path::PathBuf;
use std::time::Duration;

/// Process settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory of `<name>.json` edition files; built-in editions only when unset.
    pub editions_dir: Option<PathBuf>,
    pub word_list: Option<PathBuf>,
    pub word_list_url: Option<String>,
    /// Where saved matches live; kept in memory when unset.
    pub save_dir: Option<PathBuf>,
    /// Matches idle for longer than this are ended.
    pub stale_after: Duration,
}

const DEFAULT_STALE_SECONDS: u64 = 60 * 60 * 24;

impl Default for Settings {
    fn default() -> Self {
        Settings {
            editions_dir: None,
            word_list: None,
            word_list_url: None,
            save_dir: None,
            stale_after: Duration::from_secs(DEFAULT_STALE_SECONDS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let stale_after = var("STALE_SECONDS")
            .and_then(|s| s.parse().ok())
            .map_or(Duration::from_secs(DEFAULT_STALE_SECONDS), Duration::from_secs);

        Settings {
            editions_dir: var("EDITIONS_DIR").map(PathBuf::from),
            word_list: var("WORD_LIST").map(PathBuf::from),
            word_list_url: var("WORD_LIST_URL"),
            save_dir: var("SAVE_DIR").map(PathBuf::from),
            stale_after,
        }
    }
}
