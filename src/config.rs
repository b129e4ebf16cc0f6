// Settings file for wrappers built from configuration
//
// Embedders that prefer configuration over code can describe the
// notification endpoint, the retry policy and the analyzer log target in a
// single TOML file.

use crate::analyzer::CallAnalyzer;
use crate::error::{Error, Result};
use crate::notify::NotificationConfig;
use crate::report::Report;
use crate::retry::RetryPolicy;
use crate::sink::LogTarget;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level settings
///
/// # Example
/// ```
/// use callwrap::config::Settings;
///
/// let settings = Settings::from_toml_str(r#"
///     [notification]
///     host = "smtp.example.com:587"
///     username = "bot@example.com"
///     password = "secret"
///     recipients = ["ops@example.com"]
///
///     [retry]
///     max_attempts = 5
///     delay_secs = 0.5
///
///     [analyzer]
///     log_file = "calls.log"
/// "#).unwrap();
///
/// assert_eq!(settings.retry.max_attempts, 5);
/// assert_eq!(settings.notification.unwrap().recipients.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Absent when notifications are not used
    pub notification: Option<NotificationConfig>,
    pub retry: RetrySettings,
    pub analyzer: AnalyzerSettings,
}

/// `[retry]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts, including the first (default: 3)
    pub max_attempts: u32,
    /// Fixed delay between attempts in seconds (default: 1.0)
    pub delay_secs: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: RetryPolicy::DEFAULT_DELAY.as_secs_f64(),
        }
    }
}

/// `[analyzer]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerSettings {
    /// Append log lines here; stderr when unset
    pub log_file: Option<PathBuf>,
    /// CSV report destination for [`AnalyzerSettings::save_report`]
    pub report_path: Option<PathBuf>,
}

impl AnalyzerSettings {
    pub fn log_target(&self) -> LogTarget {
        match &self.log_file {
            Some(path) => LogTarget::File(path.clone()),
            None => LogTarget::Console,
        }
    }

    /// Save `analyzer`'s report to `report_path`; `None` when no path is set
    pub fn save_report(&self, analyzer: &CallAnalyzer) -> Result<Option<Report>> {
        match &self.report_path {
            Some(path) => analyzer.report_to(path).map(Some),
            None => Ok(None),
        }
    }
}

impl TryFrom<&RetrySettings> for RetryPolicy {
    type Error = Error;

    fn try_from(settings: &RetrySettings) -> Result<Self> {
        RetryPolicy::from_secs(settings.max_attempts, settings.delay_secs)
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings = Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Retry policy described by the `[retry]` section
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::try_from(&self.retry)
    }
}
