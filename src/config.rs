use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded from drover.toml. Every field has a
/// default so an empty or missing file still yields a working setup.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct DroverConfig {
    pub slack: SlackConfig,
    pub notify: NotifyConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Channel name the status message is posted to.
    pub channel: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Minimum seconds between in-progress status updates.
    pub cooldown_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Seconds an interrupted job gets to exit after SIGTERM before the
    /// process group is killed.
    pub grace_secs: u64,
}

// --- Default implementations ---

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            channel: "webhooks".to_string(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { cooldown_secs: 4 }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load configuration from `path`. A missing file is fine and yields the
/// defaults; an unreadable or unparseable one is an error.
pub fn load(path: &Path) -> Result<DroverConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(DroverConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("no-such.toml")).unwrap();
        assert_eq!(config.slack.channel, "webhooks");
        assert_eq!(config.notify.cooldown_secs, 4);
        assert_eq!(config.shutdown.grace_secs, 5);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drover.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[notify]\ncooldown_secs = 30").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.notify.cooldown_secs, 30);
        assert_eq!(config.slack.channel, "webhooks");
        assert_eq!(config.shutdown.grace_secs, 5);
    }

    #[test]
    fn full_file_overrides_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drover.toml");
        std::fs::write(
            &path,
            "[slack]\nchannel = \"builds\"\n\n[notify]\ncooldown_secs = 1\n\n[shutdown]\ngrace_secs = 20\n",
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.slack.channel, "builds");
        assert_eq!(config.notify.cooldown_secs, 1);
        assert_eq!(config.shutdown.grace_secs, 20);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drover.toml");
        std::fs::write(&path, "[slack\nchannel = ").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
