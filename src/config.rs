//! Supakeeper Configuration
//!
//! Loads configuration from environment variables, with `.env` file
//! support via `dotenvy`. Projects are configured either as a single
//! `SUPABASE_URL`/`SUPABASE_KEY` pair or as numbered variables
//! (`SUPABASE_URL_1`, `SUPABASE_KEY_1`, ...).

use std::collections::HashMap;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::types::{LogLevel, ProjectConfig};

/// Supabase pauses free-tier projects after 7 days of inactivity.
pub const INACTIVITY_WINDOW_HOURS: f64 = 168.0;

/// Marker substring for the cycle-aborting validation error.
pub const NO_PROJECTS_MARKER: &str = "No projects";

/// Main configuration for supakeeper.
#[derive(Clone, Debug)]
pub struct Config {
    pub projects: Vec<ProjectConfig>,
    pub interval_hours: f64,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub log_level: LogLevel,
    pub log_file: String,
    pub webhook_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub console_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            interval_hours: 48.0,
            retry_attempts: 3,
            retry_delay_secs: 30,
            log_level: LogLevel::Info,
            log_file: "logs/supakeeper.log".to_string(),
            webhook_url: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            console_output: true,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Reads a `.env` file from the working directory if present.
    /// Fails if a configured project does not pass shape validation
    /// or a numeric setting cannot be parsed.
    pub fn load() -> Result<Self> {
        if dotenvy::dotenv().is_ok() {
            debug!("Loaded environment from .env file");
        }
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build a configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut projects = Vec::new();

        // Single-project form: SUPABASE_URL / SUPABASE_KEY.
        if let (Some(url), Some(key)) = (get(vars, "SUPABASE_URL"), get(vars, "SUPABASE_KEY")) {
            let name = get(vars, "SUPABASE_NAME").unwrap_or_else(|| "Default Project".to_string());
            projects.push(
                ProjectConfig::new(name, url, key, get(vars, "SUPABASE_TABLE"))
                    .context("Invalid project configuration")?,
            );
        }

        // Numbered form: SUPABASE_URL_1, SUPABASE_URL_2, ...
        let pattern = Regex::new(r"^SUPABASE_URL_(\d+)$").expect("static regex");
        let mut indices: Vec<u64> = vars
            .keys()
            .filter_map(|k| pattern.captures(k))
            .filter_map(|c| c[1].parse().ok())
            .collect();
        indices.sort_unstable();
        indices.dedup();

        for idx in indices {
            let url = get(vars, &format!("SUPABASE_URL_{idx}"));
            let key = get(vars, &format!("SUPABASE_KEY_{idx}"));
            if let (Some(url), Some(key)) = (url, key) {
                let name = get(vars, &format!("SUPABASE_NAME_{idx}"))
                    .unwrap_or_else(|| format!("Project {idx}"));
                projects.push(
                    ProjectConfig::new(name, url, key, get(vars, &format!("SUPABASE_TABLE_{idx}")))
                        .with_context(|| format!("Invalid configuration for project {idx}"))?,
                );
            }
        }

        let defaults = Config::default();

        Ok(Self {
            projects,
            interval_hours: parse_var(vars, "KEEPALIVE_INTERVAL_HOURS", defaults.interval_hours)?,
            // A retry count of zero still means one attempt.
            retry_attempts: parse_var(vars, "RETRY_ATTEMPTS", defaults.retry_attempts)?.max(1),
            retry_delay_secs: parse_var(vars, "RETRY_DELAY", defaults.retry_delay_secs)?,
            log_level: get(vars, "LOG_LEVEL")
                .map(|s| LogLevel::parse(&s))
                .unwrap_or(defaults.log_level),
            log_file: get(vars, "LOG_FILE").unwrap_or(defaults.log_file),
            webhook_url: get(vars, "WEBHOOK_URL"),
            telegram_bot_token: get(vars, "TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: get(vars, "TELEGRAM_CHAT_ID"),
            console_output: get(vars, "CONSOLE_OUTPUT")
                .map(|s| s.to_ascii_lowercase() == "true")
                .unwrap_or(defaults.console_output),
        })
    }

    /// Projects that are enabled for pinging.
    pub fn enabled_projects(&self) -> Vec<ProjectConfig> {
        self.projects.iter().filter(|p| p.enabled).cloned().collect()
    }

    /// Validate the configuration and return human-readable findings.
    ///
    /// Entries starting with "Warning:" are informational and never
    /// abort a cycle; an entry containing the no-projects marker does.
    /// Pure over the configuration: repeated calls return the same list.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.projects.is_empty() {
            errors.push("No projects configured".to_string());
        }

        for project in &self.projects {
            if let Err(e) = project.validate() {
                errors.push(e.to_string());
            }
        }

        if self.interval_hours <= 0.0 {
            errors.push("Interval hours must be positive".to_string());
        }

        if self.interval_hours > INACTIVITY_WINDOW_HOURS {
            errors.push(format!(
                "Warning: Interval exceeds {INACTIVITY_WINDOW_HOURS:.0} hours (7 days). \
                 Supabase pauses projects after 7 days of inactivity."
            ));
        }

        errors
    }

    /// Whether any outbound notification channel is configured.
    pub fn has_notifications(&self) -> bool {
        self.webhook_url.is_some()
            || (self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some())
    }
}

/// Whether a validation finding is a warning rather than an error.
pub fn is_warning(finding: &str) -> bool {
    finding.starts_with("Warning")
}

fn get(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).filter(|v| !v.is_empty()).cloned()
}

/// Parse a numeric variable, falling back to the default only when
/// the variable is unset. A malformed value fails the load rather
/// than being silently replaced.
fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T> {
    match get(vars, key) {
        Some(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid value for {key}: '{v}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_project_from_vars() {
        let cfg = Config::from_vars(&vars(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_KEY", "anon-key"),
            ("SUPABASE_TABLE", "health"),
        ]))
        .unwrap();

        assert_eq!(cfg.projects.len(), 1);
        assert_eq!(cfg.projects[0].name, "Default Project");
        assert_eq!(cfg.projects[0].table.as_deref(), Some("health"));
        assert!((cfg.interval_hours - 48.0).abs() < f64::EPSILON);
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.retry_delay_secs, 30);
    }

    #[test]
    fn test_numbered_projects_sorted_numerically() {
        let cfg = Config::from_vars(&vars(&[
            ("SUPABASE_URL_10", "https://ten.supabase.co"),
            ("SUPABASE_KEY_10", "k10"),
            ("SUPABASE_URL_2", "https://two.supabase.co"),
            ("SUPABASE_KEY_2", "k2"),
            ("SUPABASE_NAME_2", "Two"),
        ]))
        .unwrap();

        assert_eq!(cfg.projects.len(), 2);
        assert_eq!(cfg.projects[0].name, "Two");
        assert_eq!(cfg.projects[1].name, "Project 10");
    }

    #[test]
    fn test_numbered_project_missing_key_is_skipped() {
        let cfg = Config::from_vars(&vars(&[(
            "SUPABASE_URL_1",
            "https://one.supabase.co",
        )]))
        .unwrap();
        assert!(cfg.projects.is_empty());
    }

    #[test]
    fn test_invalid_project_fails_load() {
        let err = Config::from_vars(&vars(&[
            ("SUPABASE_URL", "http://insecure.supabase.co"),
            ("SUPABASE_KEY", "k"),
        ]))
        .unwrap_err();
        assert!(format!("{err:#}").contains("https://"));
    }

    #[test]
    fn test_malformed_numeric_value_fails_load() {
        let err = Config::from_vars(&vars(&[("RETRY_ATTEMPTS", "abc")])).unwrap_err();
        assert!(err.to_string().contains("RETRY_ATTEMPTS"));

        let err =
            Config::from_vars(&vars(&[("KEEPALIVE_INTERVAL_HOURS", "two days")])).unwrap_err();
        assert!(err.to_string().contains("KEEPALIVE_INTERVAL_HOURS"));
    }

    #[test]
    fn test_retry_attempts_clamped_to_one() {
        let cfg = Config::from_vars(&vars(&[("RETRY_ATTEMPTS", "0")])).unwrap();
        assert_eq!(cfg.retry_attempts, 1);
    }

    #[test]
    fn test_validate_no_projects() {
        let cfg = Config::default();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.contains(NO_PROJECTS_MARKER)));
    }

    #[test]
    fn test_validate_interval_warning() {
        let cfg = Config {
            projects: vec![ProjectConfig::new("p", "https://a.supabase.co", "k", None).unwrap()],
            interval_hours: 200.0,
            ..Config::default()
        };
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert!(is_warning(&errors[0]));
        assert!(errors[0].contains("168"));
    }

    #[test]
    fn test_validate_is_idempotent() {
        let cfg = Config {
            interval_hours: 200.0,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), cfg.validate());
    }

    #[test]
    fn test_has_notifications() {
        let mut cfg = Config::default();
        assert!(!cfg.has_notifications());

        cfg.telegram_bot_token = Some("token".to_string());
        assert!(!cfg.has_notifications());

        cfg.telegram_chat_id = Some("42".to_string());
        assert!(cfg.has_notifications());

        let webhook_only = Config {
            webhook_url: Some("https://hooks.example.com/x".to_string()),
            ..Config::default()
        };
        assert!(webhook_only.has_notifications());
    }
}
