//! Probe Strategy Chain
//!
//! One keep-alive probe for a single project: an ordered fallback
//! sequence of read-only calls, wrapped in a bounded retry loop with
//! a fixed delay. The whole chain counts as one attempt; on failure
//! the chain restarts from the first strategy.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::supabase::ProbeError;
use crate::types::{PingResult, ProjectConfig, SupabaseApi};

/// HTTP statuses on the raw REST root that prove the project is
/// alive. 401/403 mean auth rejected the key, not that the service
/// is down.
const ALIVE_STATUSES: [u16; 3] = [200, 401, 403];

/// Retry policy for one project's probe.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Run the full probe for one project: up to `retry.attempts` passes
/// of the strategy chain, sleeping `retry.delay` between passes.
///
/// Always produces exactly one `PingResult`. A success reports the
/// elapsed time of the succeeding attempt; exhaustion reports the
/// elapsed time since the first attempt started, carrying the last
/// error's description.
pub async fn ping_project(
    client: &dyn SupabaseApi,
    project: &ProjectConfig,
    retry: RetryPolicy,
) -> PingResult {
    debug!(project = %project.name, "Pinging project");

    // Zero attempts still means one attempt.
    let attempts = retry.attempts.max(1);
    let overall_start = Instant::now();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        let attempt_start = Instant::now();

        match run_strategy_chain(client, project).await {
            Ok(message) => {
                return PingResult::ok(&project.name, message, elapsed_ms(attempt_start));
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    warn!(
                        project = %project.name,
                        "Attempt {} failed: {}. Retrying in {}s...",
                        attempt,
                        last_error,
                        retry.delay.as_secs()
                    );
                    tokio::time::sleep(retry.delay).await;
                }
            }
        }
    }

    PingResult::failed(
        &project.name,
        format!("Failed after {attempts} attempts: {last_error}"),
        Some(elapsed_ms(overall_start)),
    )
}

/// One pass through the fallback strategies. Returns the success
/// message of the first strategy that worked.
///
/// The intermediate auth strategies are expected to fail under
/// restricted keys; their failures are logged at debug level and the
/// chain moves on. An error from a configured health-check table, or
/// a transport error on the raw REST ping, fails the whole attempt.
async fn run_strategy_chain(
    client: &dyn SupabaseApi,
    project: &ProjectConfig,
) -> Result<String, ProbeError> {
    // Strategy 1: query the configured health-check table.
    if let Some(table) = &project.table {
        client.query_table(table).await?;
        return Ok(format!("Successfully queried table '{table}'"));
    }

    // Strategy 2: auth admin user listing. Needs a service-role key.
    match client.list_users(1).await {
        Ok(()) => return Ok("Successfully queried auth.users table".to_string()),
        Err(e) => debug!(project = %project.name, "Error querying auth.users: {e}"),
    }

    // Strategy 3: lightweight auth-service check.
    match client.check_session().await {
        Ok(()) => return Ok("Successfully checked auth session".to_string()),
        Err(e) => debug!(project = %project.name, "Error checking auth session: {e}"),
    }

    // Strategy 4: raw GET on the REST root. Any response in the
    // alive set proves the project is up, auth rejection included.
    let status = client.rest_ping().await?;
    if ALIVE_STATUSES.contains(&status) {
        return Ok(format!("Successfully pinged REST API (status: {status})"));
    }

    Err(ProbeError::AllStrategiesFailed)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
