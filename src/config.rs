use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;

/// Autoflow API client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base origin of the Autoflow API
    #[arg(
        short = 'u',
        long,
        env = "AUTOFLOW_BASE_URL",
        default_value = "http://localhost:8080"
    )]
    pub base_url: String,

    /// Path to the credential database
    #[arg(short = 'd', long, env = "AUTOFLOW_AUTH_DB")]
    pub auth_db: Option<String>,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email and password
    Login {
        /// Account email; prompted for when omitted
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Drop the stored session
    Logout,

    /// Show whether a session token is stored
    Status,

    /// Perform an authenticated GET and print the response body
    Get {
        /// Request path, e.g. /task/modules
        path: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: Url,
    pub auth_db: PathBuf,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let auth_db = args
            .auth_db
            .map(|s| expand_tilde(&s))
            .or_else(default_auth_db)
            .context("Could not determine a credential database path (set AUTOFLOW_AUTH_DB)")?;

        let config = Config {
            base_url: Url::parse(&args.base_url)
                .with_context(|| format!("Invalid base URL: {}", args.base_url))?,
            auth_db,
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.request_timeout,
            log_level: args.log_level,
        };

        Ok((config, args.command))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => anyhow::bail!("Base URL must be http or https, got {}", other),
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// Default credential database location under the user data directory
fn default_auth_db() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("autoflow").join("auth.db"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
