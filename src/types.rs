//! Supakeeper - Type Definitions
//!
//! Shared types for the keep-alive engine: project configuration,
//! ping results, cycle summaries, and the Supabase API trait that the
//! probe strategy chain consumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::supabase::ProbeError;

// ─── Project Configuration ───────────────────────────────────────

/// Configuration for a single Supabase project to keep alive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing)]
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub enabled: bool,
}

impl ProjectConfig {
    /// Create a project configuration, validating its shape.
    ///
    /// The URL and API key must be non-empty and the URL must use
    /// `https://`. Invalid projects cannot be constructed.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        key: impl Into<String>,
        table: Option<String>,
    ) -> anyhow::Result<Self> {
        let project = Self {
            name: name.into(),
            url: url.into(),
            key: key.into(),
            table,
            enabled: true,
        };
        project.validate()?;
        Ok(project)
    }

    /// Re-check the construction invariants.
    ///
    /// Used by `Config::validate` so that repeated validation of an
    /// unmodified configuration yields identical results.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("Project '{}': URL is required", self.name);
        }
        if self.key.is_empty() {
            anyhow::bail!("Project '{}': API key is required", self.name);
        }
        if !self.url.starts_with("https://") {
            anyhow::bail!("Project '{}': URL must start with https://", self.name);
        }
        Ok(())
    }
}

// ─── Ping Results ────────────────────────────────────────────────

/// Result of a keep-alive ping operation against one project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub project_name: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PingResult {
    /// Build a successful result with the given round-trip time.
    pub fn ok(project_name: impl Into<String>, message: impl Into<String>, ms: f64) -> Self {
        Self {
            project_name: project_name.into(),
            success: true,
            message: message.into(),
            response_time_ms: Some(ms),
            timestamp: Utc::now(),
        }
    }

    /// Build a failed result. The round-trip time is optional because
    /// some failures happen before any network activity.
    pub fn failed(
        project_name: impl Into<String>,
        message: impl Into<String>,
        ms: Option<f64>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            success: false,
            message: message.into(),
            response_time_ms: ms,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated outcome of one full check cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleSummary {
    pub success: usize,
    pub failed: usize,
}

impl CycleSummary {
    pub fn empty() -> Self {
        Self {
            success: 0,
            failed: 0,
        }
    }

    /// Partition results by success flag.
    pub fn from_results(results: &[PingResult]) -> Self {
        let success = results.iter().filter(|r| r.success).count();
        Self {
            success,
            failed: results.len() - success,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

// ─── Status ──────────────────────────────────────────────────────

/// Per-project line in the status report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub name: String,
    pub url: String,
    pub enabled: bool,
}

/// Snapshot of the configured projects, for the `status` command.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusInfo {
    pub total_projects: usize,
    pub enabled_projects: usize,
    pub interval_hours: f64,
    pub projects: Vec<ProjectStatus>,
}

// ─── Log Level ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name as found in `LOG_LEVEL`. Unknown values
    /// fall back to `Info`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ─── Supabase API ────────────────────────────────────────────────

/// The probe surface of one Supabase project.
///
/// The keeper talks to projects exclusively through this trait, so the
/// probe strategy chain can be exercised against a stub in tests. All
/// calls are read-only and must complete within a bounded timeout.
#[async_trait]
pub trait SupabaseApi: Send + Sync {
    /// Select up to one row from the given table via PostgREST.
    async fn query_table(&self, table: &str) -> Result<(), ProbeError>;

    /// List up to `per_page` users through the auth admin API.
    /// Commonly rejected under anon keys; callers treat failure here
    /// as non-fatal fallback.
    async fn list_users(&self, per_page: u32) -> Result<(), ProbeError>;

    /// Lightweight auth-service check (GET /auth/v1/settings).
    async fn check_session(&self) -> Result<(), ProbeError>;

    /// Raw GET against the REST root. Returns the HTTP status code;
    /// the caller decides which statuses prove liveness.
    async fn rest_ping(&self) -> Result<u16, ProbeError>;
}
