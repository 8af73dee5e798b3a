use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use todo_client::config::Config;
use todo_client::{CookieJar, Shell, UreqTransport};
use todo_client_core::{ApiClient, Session, TodoController};

/// todo-client - log in and manage your todo list
#[derive(Parser)]
#[command(name = "todo-client")]
#[command(about = "Interactive client for the todo service", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// API base URL (overrides config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Keep the session cookie in this file between runs
    #[arg(long)]
    cookie_jar: Option<PathBuf>,

    /// Log level filter, e.g. `debug` (overrides config file)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(cookie_jar) = cli.cookie_jar {
        config.session.cookie_jar = Some(cookie_jar);
    }
    if let Some(log_level) = cli.log_level {
        config.observability.log_level = log_level;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    todo_client::observability::init_logging(&config.observability.log_level)?;
    tracing::info!(base_url = %config.api.base_url, "starting todo client");

    let jar = config.session.cookie_jar.clone().map(CookieJar::new);
    let session = match &jar {
        Some(jar) => jar.load()?,
        None => Session::new(),
    };
    let controller = TodoController::with_session(
        ApiClient::new(&config.api.base_url),
        UreqTransport::new(),
        session,
    );

    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    let mut shell = Shell::new(controller, stdin, stdout, jar);
    shell.run().await?;
    Ok(())
}
