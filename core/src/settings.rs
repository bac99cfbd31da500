//! Engine configuration consumed once, when a context is initialized.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Read-only configuration snapshot for the shared HTTP engine.
///
/// Every field has a default, so a partial document deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Follow 3xx redirects.
    pub follow_redirects: bool,
    /// Follow redirects that switch between http and https.
    pub follow_protocol_redirects: bool,
    /// Directory for the response cache. `None` disables caching.
    pub cache_directory: Option<PathBuf>,
    /// Upper bound for the cache size. Ignored without a cache directory.
    pub max_cache_size_bytes: u64,
    /// Connect timeout in milliseconds. `None` keeps the engine default.
    pub connect_timeout_ms: Option<u64>,
    /// Timeout for each exchange, applied per redirect hop. `None` is unbounded.
    pub call_timeout_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            follow_protocol_redirects: true,
            cache_directory: None,
            max_cache_size_bytes: 0,
            connect_timeout_ms: None,
            call_timeout_ms: None,
        }
    }
}

impl Settings {
    pub fn with_redirects(mut self, follow: bool, follow_protocol: bool) -> Self {
        self.follow_redirects = follow;
        self.follow_protocol_redirects = follow_protocol;
        self
    }

    pub fn with_cache(mut self, directory: impl AsRef<Path>, max_size_bytes: u64) -> Self {
        self.cache_directory = Some(directory.as_ref().to_path_buf());
        self.max_cache_size_bytes = max_size_bytes;
        self
    }

    /// Durations past `u64::MAX` milliseconds saturate.
    pub fn with_timeouts(mut self, connect: Option<Duration>, call: Option<Duration>) -> Self {
        self.connect_timeout_ms = connect.map(millis);
        self.call_timeout_ms = call.map(millis);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert!(settings.follow_redirects);
        assert!(settings.follow_protocol_redirects);
        assert!(settings.cache_directory.is_none());
        assert_eq!(settings.max_cache_size_bytes, 0);
        assert!(settings.connect_timeout().is_none());
    }

    #[test]
    fn partial_document_falls_back_to_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"follow_redirects":false,"cache_directory":"/tmp/c"}"#)
                .unwrap();
        assert!(!settings.follow_redirects);
        assert!(settings.follow_protocol_redirects);
        assert_eq!(settings.cache_directory, Some(PathBuf::from("/tmp/c")));
        assert_eq!(settings.max_cache_size_bytes, 0);
    }

    #[test]
    fn builder_helpers() {
        let settings = Settings::default()
            .with_redirects(true, false)
            .with_cache("/var/cache/app", 1024)
            .with_timeouts(Some(Duration::from_secs(2)), None);
        assert!(!settings.follow_protocol_redirects);
        assert_eq!(settings.max_cache_size_bytes, 1024);
        assert_eq!(settings.connect_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(settings.call_timeout(), None);
    }

    #[test]
    fn huge_timeouts_saturate() {
        let settings = Settings::default().with_timeouts(
            Some(Duration::MAX),
            Some(Duration::from_millis(u64::MAX) + Duration::from_secs(1)),
        );
        assert_eq!(settings.connect_timeout_ms, Some(u64::MAX));
        assert_eq!(settings.call_timeout_ms, Some(u64::MAX));
    }
}
