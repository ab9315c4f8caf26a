//! Supakeeper CLI
//!
//! Entry point for the keep-alive daemon. Handles CLI args, config
//! loading, and dispatching to the keeper and scheduler.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use supakeeper::config::{self, Config};
use supakeeper::keeper::Keeper;
use supakeeper::logger;
use supakeeper::scheduler::Scheduler;

/// Keep your Supabase projects alive and prevent them from being paused.
#[derive(Parser, Debug)]
#[command(name = "supakeeper", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run keep-alive checks (daemon by default, --once for a single cycle)
    Run {
        /// Run once and exit
        #[arg(long, short = '1')]
        once: bool,

        /// Don't run immediately in daemon mode, wait for the first
        /// scheduled time
        #[arg(long)]
        no_immediate: bool,
    },

    /// Show status of configured projects
    Status,

    /// Ping projects once with simpler output
    Ping {
        /// Ping a specific project by name
        #[arg(long, short)]
        project: Option<String>,
    },

    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("Error: {e:#}").red());
            1
        }
    };

    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run { once, no_immediate } => cmd_run(once, no_immediate).await,
        Commands::Status => cmd_status(),
        Commands::Ping { project } => cmd_ping(project).await,
        Commands::Validate => cmd_validate(),
    }
}

// ─── run ─────────────────────────────────────────────────────────

async fn cmd_run(once: bool, no_immediate: bool) -> Result<i32> {
    let cfg = Config::load()?;
    logger::init(&cfg);

    let findings = cfg.validate();
    print_findings(&findings);

    if findings.iter().any(|f| f.contains(config::NO_PROJECTS_MARKER)) {
        println!();
        println!("{}", "No projects configured.".red());
        println!("Please set SUPABASE_URL and SUPABASE_KEY in your .env file.");
        return Ok(1);
    }

    let scheduler = Scheduler::new(Keeper::new(cfg));

    if once {
        let summary = scheduler.run_once().await;
        Ok(if summary.all_ok() { 0 } else { 1 })
    } else {
        // Exit code follows the last completed cycle; a shutdown
        // before any cycle ran is a clean exit.
        let last = scheduler.run_daemon(!no_immediate).await;
        Ok(match last {
            Some(summary) if !summary.all_ok() => 1,
            _ => 0,
        })
    }
}

// ─── status ──────────────────────────────────────────────────────

fn cmd_status() -> Result<i32> {
    let cfg = Config::load()?;
    let keeper = Keeper::new(cfg);
    let status = keeper.get_status();

    println!();
    println!("{}", "Supakeeper Status".bold().cyan());
    println!();

    if status.projects.is_empty() {
        println!("{}", "No projects configured.".yellow());
        println!("Please set SUPABASE_URL and SUPABASE_KEY in your .env file.");
        return Ok(0);
    }

    for project in &status.projects {
        let state = if project.enabled {
            "\u{2713} enabled".green().to_string()
        } else {
            "\u{25cb} disabled".dimmed().to_string()
        };
        println!(
            "  {:<20} {:<43} {}",
            project.name.cyan(),
            truncate(&project.url, 40),
            state
        );
    }

    println!();
    println!("Total projects: {}", status.total_projects);
    println!("Enabled: {}", status.enabled_projects);
    println!("Check interval: every {} hours", status.interval_hours);
    println!();

    Ok(0)
}

// ─── ping ────────────────────────────────────────────────────────

async fn cmd_ping(project: Option<String>) -> Result<i32> {
    let mut cfg = Config::load()?;

    if let Some(name) = project {
        let matching: Vec<_> = cfg
            .projects
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(&name))
            .cloned()
            .collect();

        if matching.is_empty() {
            println!("{}", format!("Project '{name}' not found").red());
            println!("Available projects:");
            for p in &cfg.projects {
                println!("  - {}", p.name);
            }
            return Ok(1);
        }
        cfg.projects = matching;
    }

    logger::init(&cfg);

    let keeper = Keeper::new(cfg);
    let results = keeper.ping_all().await;
    let failed = results.iter().filter(|r| !r.success).count();

    Ok(if failed > 0 { 1 } else { 0 })
}

// ─── validate ────────────────────────────────────────────────────

fn cmd_validate() -> Result<i32> {
    let cfg = Config::load()?;
    let findings = cfg.validate();

    if findings.is_empty() {
        println!("{}", "\u{2713} Configuration is valid".green());
        println!("  Found {} project(s)", cfg.projects.len());
        for p in &cfg.projects {
            println!("    - {}: {}", p.name, truncate(&p.url, 40));
        }
        return Ok(0);
    }

    print_findings(&findings);

    // Warnings alone are not an error.
    let has_errors = findings.iter().any(|f| !config::is_warning(f));
    Ok(if has_errors { 1 } else { 0 })
}

// ─── helpers ─────────────────────────────────────────────────────

fn print_findings(findings: &[String]) {
    for finding in findings {
        if config::is_warning(finding) {
            println!("{}", format!("\u{26a0} {finding}").yellow());
        } else {
            println!("{}", format!("\u{2717} {finding}").red());
        }
    }
}

/// Shorten a display string to at most `max` characters. Counts
/// chars, not bytes, so multibyte URLs never split mid-character.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate("https://abc.supabase.co", 40), "https://abc.supabase.co");
    }

    #[test]
    fn test_truncate_long_ascii() {
        let long = "a".repeat(50);
        let out = truncate(&long, 40);
        assert_eq!(out.chars().count(), 40);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_multibyte_url() {
        // Cyrillic hostname: byte 37 falls inside a two-byte char.
        let url = "https://ппппппппппппппппппппп.supabase.co";
        let out = truncate(url, 40);
        assert_eq!(out.chars().count(), 40);
        assert!(out.ends_with("..."));
    }
}
