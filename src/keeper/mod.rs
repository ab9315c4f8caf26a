//! Keep-Alive Engine
//!
//! The `Keeper` runs one full check cycle: it fans the probe strategy
//! chain out over all enabled projects (bounded concurrency, one
//! result per project), aggregates the outcomes, and dispatches
//! notifications. Clients are created lazily, one per project name,
//! and reused across retries and cycles.

pub mod probe;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock, Semaphore};
use tracing::{error, info, warn};

use crate::config::{self, Config};
use crate::logger;
use crate::notifier::Notifier;
use crate::supabase::SupabaseHttpClient;
use crate::types::{CycleSummary, PingResult, ProjectStatus, StatusInfo, SupabaseApi};

use probe::{ping_project, RetryPolicy};

/// Upper bound on concurrent probes within one cycle.
const MAX_WORKERS: usize = 10;

type ClientMap = Arc<RwLock<HashMap<String, Arc<dyn SupabaseApi>>>>;
type ClientFactory = Arc<dyn Fn(&crate::types::ProjectConfig) -> Arc<dyn SupabaseApi> + Send + Sync>;

/// Keeps Supabase projects alive by pinging them.
pub struct Keeper {
    config: Config,
    notifier: Option<Notifier>,
    clients: ClientMap,
    factory: ClientFactory,
}

impl Keeper {
    /// Create a keeper over the given configuration. A notifier is
    /// attached only when a notification channel is configured.
    pub fn new(config: Config) -> Self {
        Self::with_client_factory(
            config,
            Arc::new(|project| {
                Arc::new(SupabaseHttpClient::new(&project.url, &project.key)) as Arc<dyn SupabaseApi>
            }),
        )
    }

    /// Create a keeper with a custom client factory. Lets tests swap
    /// the HTTP client for a scripted one.
    pub fn with_client_factory(config: Config, factory: ClientFactory) -> Self {
        let notifier = Notifier::from_config(&config);
        Self {
            config,
            notifier,
            clients: Arc::new(RwLock::new(HashMap::new())),
            factory,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get or create the cached client for a project. Create-once per
    /// project name; the handle is reused for the process lifetime.
    async fn client_for(&self, project: &crate::types::ProjectConfig) -> Arc<dyn SupabaseApi> {
        if let Some(client) = self.clients.read().await.get(&project.name) {
            return client.clone();
        }

        let mut clients = self.clients.write().await;
        clients
            .entry(project.name.clone())
            .or_insert_with(|| (self.factory)(project))
            .clone()
    }

    /// Ping all enabled projects and return one result per project.
    ///
    /// More than one project runs concurrently behind a worker cap;
    /// a single project is probed inline. Each result is logged as it
    /// becomes available, and result order is not guaranteed. Triggers
    /// notification dispatch before returning.
    pub async fn ping_all(&self) -> Vec<PingResult> {
        let projects = self.config.enabled_projects();

        if projects.is_empty() {
            warn!("No enabled projects to ping");
            return Vec::new();
        }

        info!(
            "Starting keep-alive check for {} project(s)",
            projects.len()
        );

        let retry = RetryPolicy::new(
            self.config.retry_attempts,
            Duration::from_secs(self.config.retry_delay_secs),
        );

        let mut results: Vec<PingResult> = Vec::with_capacity(projects.len());

        if projects.len() > 1 {
            let semaphore = Arc::new(Semaphore::new(projects.len().min(MAX_WORKERS)));
            let (tx, mut rx) = mpsc::channel(projects.len());
            let count = projects.len();

            for project in projects {
                let client = self.client_for(&project).await;
                let semaphore = semaphore.clone();
                let tx = tx.clone();

                tokio::spawn(async move {
                    // Permit bounds concurrency; errors only on close.
                    let _permit = semaphore.acquire_owned().await;
                    let result = ping_project(client.as_ref(), &project, retry).await;
                    log_result(&result);
                    let _ = tx.send(result).await;
                });
            }
            drop(tx);

            for _ in 0..count {
                match rx.recv().await {
                    Some(result) => results.push(result),
                    None => break,
                }
            }
        } else {
            for project in projects {
                let client = self.client_for(&project).await;
                let result = ping_project(client.as_ref(), &project, retry).await;
                log_result(&result);
                results.push(result);
            }
        }

        self.send_notification(&results).await;

        results
    }

    /// Run a single keep-alive cycle end to end.
    ///
    /// Validates the configuration first; only the no-projects error
    /// aborts the cycle (returning an empty summary before any network
    /// activity). Warnings are logged and the cycle proceeds.
    pub async fn run_once(&self) -> CycleSummary {
        if self.config.console_output {
            logger::print_banner();
        }

        let findings = self.config.validate();
        for finding in &findings {
            if config::is_warning(finding) {
                warn!("{finding}");
            } else {
                error!("{finding}");
            }
        }
        if findings.iter().any(|f| f.contains(config::NO_PROJECTS_MARKER)) {
            return CycleSummary::empty();
        }

        let results = self.ping_all().await;
        let summary = CycleSummary::from_results(&results);

        if self.config.console_output {
            logger::print_status(summary);
        }

        summary
    }

    /// Snapshot of configured projects for the `status` command.
    pub fn get_status(&self) -> StatusInfo {
        StatusInfo {
            total_projects: self.config.projects.len(),
            enabled_projects: self.config.enabled_projects().len(),
            interval_hours: self.config.interval_hours,
            projects: self
                .config
                .projects
                .iter()
                .map(|p| ProjectStatus {
                    name: p.name.clone(),
                    url: p.url.clone(),
                    enabled: p.enabled,
                })
                .collect(),
        }
    }

    /// Dispatch the cycle notification, if a channel is configured.
    /// Delivery problems are the notifier's to log; they never
    /// propagate.
    async fn send_notification(&self, results: &[PingResult]) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        match Dispatch::for_results(results) {
            Some(Dispatch::Success(all)) => notifier.send_success(&all).await,
            Some(Dispatch::Failure(failed)) => notifier.send_failure(&failed).await,
            None => {}
        }
    }
}

/// Which notification a cycle's results warrant.
#[derive(Debug, PartialEq)]
enum Dispatch {
    /// Every project succeeded; carries all results.
    Success(Vec<PingResult>),
    /// At least one project failed; carries only the failures.
    Failure(Vec<PingResult>),
}

impl Dispatch {
    fn for_results(results: &[PingResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let failed: Vec<PingResult> = results.iter().filter(|r| !r.success).cloned().collect();
        if failed.is_empty() {
            Some(Self::Success(results.to_vec()))
        } else {
            Some(Self::Failure(failed))
        }
    }
}

fn log_result(result: &PingResult) {
    if result.success {
        let time_info = result
            .response_time_ms
            .map(|ms| format!(" ({ms:.0}ms)"))
            .unwrap_or_default();
        info!(project = %result.project_name, "{}{}", result.message, time_info);
    } else {
        error!(project = %result.project_name, "{}", result.message);
    }
}
