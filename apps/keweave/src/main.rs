//! # Keweave - Knowledge Network Reasoner
//!
//! The main binary for the Keweave backward-chaining engine.
//!
//! This application provides:
//! - Loading of a knowledge network (facts, rules, capabilities) from TOML
//! - Plan inspection and knowledge-gap reports
//! - Round-by-round execution against simulated knowledge bases
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 apps/keweave (THE BINARY)                 │
//! │                                                           │
//! │  ┌─────────────┐    ┌──────────────┐    ┌──────────────┐  │
//! │  │    CLI      │    │   Network    │    │  Simulated   │  │
//! │  │   (clap)    │    │ (TOML file)  │    │ KBs (tokio)  │  │
//! │  └──────┬──────┘    └──────┬───────┘    └──────┬───────┘  │
//! │         └──────────────────┼───────────────────┘          │
//! │                            ▼                              │
//! │                   ┌────────────────┐                      │
//! │                   │  keweave-core  │                      │
//! │                   │  (THE LOGIC)   │                      │
//! │                   └────────────────┘                      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! keweave plan -f network.toml
//! keweave run -f network.toml --strategy advanced --timeout-ms 500
//! keweave gaps -f network.toml --json-mode
//! ```

use clap::Parser;
use keweave::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // KEWEAVE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("KEWEAVE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "keweave=info,keweave_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Keweave startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗  ██╗███████╗██╗    ██╗███████╗ █████╗ ██╗   ██╗███████╗
  ██║ ██╔╝██╔════╝██║    ██║██╔════╝██╔══██╗██║   ██║██╔════╝
  █████╔╝ █████╗  ██║ █╗ ██║█████╗  ███████║██║   ██║█████╗
  ██╔═██╗ ██╔══╝  ██║███╗██║██╔══╝  ██╔══██║╚██╗ ██╔╝██╔══╝
  ██║  ██╗███████╗╚███╔███╔╝███████╗██║  ██║ ╚████╔╝ ███████╗
  ╚═╝  ╚═╝╚══════╝ ╚══╝╚══╝ ╚══════╝╚═╝  ╚═╝  ╚═══╝  ╚══════╝

  Knowledge Network Reasoner v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
