//! Logging Setup
//!
//! Initializes the tracing subscriber with console and log-file
//! output, plus the console banner and cycle-summary prints. The core
//! never depends on this module for correctness; with logging
//! disabled everything still runs, just silently.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use colored::Colorize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::Config;
use crate::types::CycleSummary;

// Keeps the non-blocking file writer flushing for the process
// lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the global tracing subscriber from the configuration.
///
/// `RUST_LOG` overrides the configured level. Console output honors
/// the `CONSOLE_OUTPUT` toggle; file output goes to `LOG_FILE`
/// (directories are created as needed). Safe to call more than once;
/// later calls are no-ops.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("supakeeper={}", config.log_level.as_str()))
    });

    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_target(false));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer(&config.log_file))
        .try_init();
}

/// Build the log-file layer, or `None` if the path is unusable.
fn file_layer<S>(log_file: &str) -> Option<impl Layer<S>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if FILE_GUARD.get().is_some() {
        return None;
    }

    let path = Path::new(log_file);
    let name = path.file_name()?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).ok()?;

    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    FILE_GUARD.set(guard).ok()?;

    Some(fmt::layer().with_writer(writer).with_ansi(false))
}

/// Print the startup banner.
pub fn print_banner() {
    println!();
    println!("{}", "  Supakeeper".bold().cyan());
    println!(
        "{}",
        format!(
            "  v{} - keeping your Supabase projects alive",
            env!("CARGO_PKG_VERSION")
        )
        .dimmed()
    );
    println!();
}

/// Print the end-of-cycle summary with total/success/failed counts.
pub fn print_status(summary: CycleSummary) {
    let failed = if summary.failed > 0 {
        summary.failed.to_string().red().to_string()
    } else {
        summary.failed.to_string()
    };

    println!();
    println!("{}", "  Keep-alive summary".bold());
    println!("    Total:   {}", summary.total());
    println!("    Success: {}", summary.success.to_string().green());
    println!("    Failed:  {failed}");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let config = Config {
            log_file: dir
                .path()
                .join("supakeeper.log")
                .to_string_lossy()
                .to_string(),
            console_output: false,
            ..Config::default()
        };

        init(&config);
        init(&config);

        assert!(dir.path().join("supakeeper.log").exists());
    }

    #[test]
    fn test_prints_do_not_panic() {
        print_banner();
        print_status(CycleSummary {
            success: 2,
            failed: 1,
        });
    }
}
