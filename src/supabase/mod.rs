//! Supabase API Surface
//!
//! HTTP-level access to one Supabase project: PostgREST table reads,
//! auth admin calls, and the raw REST root. Everything here is
//! read-only and bounded by a request timeout.

mod client;

pub use client::SupabaseHttpClient;

use thiserror::Error;

/// Errors from one probe call against a project.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("All ping strategies failed")]
    AllStrategiesFailed,
}
