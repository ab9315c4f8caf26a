//! Supakeeper -- Supabase Keep-Alive Daemon
//!
//! Pings configured Supabase projects on a fixed interval so the
//! free tier never pauses them for inactivity. Runs as a one-shot
//! check or a long-lived daemon, reporting through logs and optional
//! webhook/Telegram notifications.

pub mod config;
pub mod keeper;
pub mod logger;
pub mod notifier;
pub mod scheduler;
pub mod supabase;
pub mod types;
