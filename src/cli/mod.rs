//! CLI entry point for lms-session.

pub mod session;

use clap::{Parser, Subcommand};

/// LMS session CLI
#[derive(Parser, Debug)]
#[command(name = "lms-session", version, about = "Log in to an LMS tenant and keep the session fresh")]
pub struct Cli {
    /// Tenant to act on (overrides LMS_TENANT)
    #[arg(short, long, global = true)]
    pub tenant: Option<String>,

    /// API base URL (overrides LMS_API_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session
    Login(LoginArgs),
    /// Show the stored session
    Status,
    /// Refresh the access token once
    Refresh,
    /// Revoke and clear the stored session
    Logout,
    /// Keep the session fresh until interrupted
    Watch,
}

/// Arguments for `lms-session login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Account name; the password is read from LMS_PASSWORD or stdin
    pub username: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
