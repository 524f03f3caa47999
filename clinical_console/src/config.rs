use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const CONFIG_FILE: &str = "clinical_console.json";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: 30_000,
            poll_interval_ms: 5_000,
        }
    }
}

impl ConsoleConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid config JSON in {}", path.display()))
    }

    /// File (explicit path, else first candidate found, else defaults),
    /// then environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::load(path)?,
            None => match candidate_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "using config file");
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("CLINICAL_API_URL") {
            self.api_url = url;
        }
        if let Some(ms) = lookup("CLINICAL_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("CLINICAL_REQUEST_TIMEOUT_MS is not a number: {ms:?}"))?;
        }
        if let Some(ms) = lookup("CLINICAL_POLL_INTERVAL_MS") {
            self.poll_interval_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("CLINICAL_POLL_INTERVAL_MS is not a number: {ms:?}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            bail!("api_url must not be empty");
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be positive");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be positive");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// Working directory first, then next to the executable.
fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(CONFIG_FILE),
        PathBuf::from("config").join(CONFIG_FILE),
    ];
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        exe.push(CONFIG_FILE);
        candidates.push(exe);
    }
    candidates
}
