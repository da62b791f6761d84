//! Mailsense MCP Server Binary
//!
//! ## Usage
//!
//! ```bash
//! # Google Gemini for both tiers, mailbox from a JSON export
//! GOOGLE_API_KEY=... mailsense-mcp --mailbox inbox.json
//!
//! # Claude by default, GPT mini for the economy tier
//! MAILSENSE_LLM_PROVIDER=anthropic MAILSENSE_LLM_ECONOMY_PROVIDER=openai \
//!   ANTHROPIC_API_KEY=... OPENAI_API_KEY=... mailsense-mcp --config mailsense.toml
//! ```
//!
//! Logs go to stderr; stdout carries the MCP transport.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mailsense_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use mailsense_mcp::{bootstrap, MailsenseMcpServer};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "mailsense-mcp",
    about = "Mailsense MCP server",
    long_about = "Serve LLM email analysis tools over the Model Context Protocol (stdio)."
)]
struct Args {
    #[arg(long, help = "Path to a mailsense.toml config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "JSON mailbox file backing message lookups")]
    mailbox: Option<PathBuf>,

    #[arg(long, help = "Log level override (trace|debug|info|warn|error)")]
    log_level: Option<String>,
}

impl Args {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                log_level: self.log_level,
                mailbox_path: self.mailbox,
                ..ConfigOverrides::default()
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = Args::parse().load_options();

    // Logging needs the loaded config; bootstrap reuses it.
    let config = AppConfig::load(options)?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "mailsense-mcp ready"
    );

    MailsenseMcpServer::new(app.runtime).run_stdio().await
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Args;

    #[test]
    fn config_flag_makes_file_required() {
        let options =
            Args::parse_from(["mailsense-mcp", "--config", "custom.toml", "--log-level", "debug"])
                .load_options();

        assert!(options.require_file);
        assert_eq!(options.overrides.log_level.as_deref(), Some("debug"));

        let defaults = Args::parse_from(["mailsense-mcp"]).load_options();
        assert!(!defaults.require_file);
        assert!(defaults.overrides.mailbox_path.is_none());
    }
}
