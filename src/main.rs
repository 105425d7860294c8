#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use helios_erp::config::Config;
use helios_erp::dispatch::{DispatchRequest, Dispatcher};
use helios_erp::gateway::{self, AppState};
use helios_erp::observability::{self, create_observer};
use helios_erp::providers::{self, Provider};
use helios_erp::store::ErpStore;
use helios_erp::tools::{build_registry, ToolRegistry};

/// `Helios` - ask your ERP in plain language.
#[derive(Parser, Debug)]
#[command(name = "helios")]
#[command(version)]
#[command(about = "Natural-language front end for the Helios Dynamics ERP.", long_about = None)]
struct Cli {
    /// Config directory (overrides HELIOS_CONFIG_DIR)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway
    #[command(long_about = "\
Start the HTTP gateway.

Serves POST /chat/ plus the tool, session, health and metrics routes. \
Bind address defaults to the values in your config file \
(gateway.host / gateway.port).

Examples:
  helios serve                  # use config defaults
  helios serve --port 8080      # listen on port 8080
  helios serve --host 0.0.0.0   # bind to all interfaces")]
    Serve {
        /// Port to listen on; defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Ask a question from the terminal
    #[command(long_about = "\
Ask a question from the terminal.

Without --message, reads one request per line from stdin until EOF \
or 'exit'. Requests in one run share conversation memory.

Examples:
  helios ask                                   # interactive session
  helios ask -m \"How many open invoices?\"      # single message")]
    Ask {
        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation session id
        #[arg(long)]
        session: Option<String>,
    },

    /// Create the ERP tables in the configured database
    InitDb,

    /// List the registered tools
    Tools,

    /// List supported completion providers
    Providers,

    /// Show configuration status
    Status,
}

struct Runtime {
    config: Config,
    registry: ToolRegistry,
    dispatcher: Arc<Dispatcher>,
    observer: Arc<dyn observability::Observer>,
}

fn build_runtime(config: Config) -> Result<Runtime> {
    let store = ErpStore::open(&config.database_path())?;
    let provider: Arc<dyn Provider> = Arc::from(providers::create_provider(
        config.provider_name(),
        config.api_key.as_deref(),
        config.api_url.as_deref(),
        config.model_name(),
        config.default_temperature,
    )?);
    let registry = build_registry(&store, Arc::clone(&provider))
        .context("Failed to register tools")?;
    let observer = create_observer(&config.observability)?;
    let dispatcher = Dispatcher::from_config(&config, &registry, provider, Arc::clone(&observer))
        .context("Failed to build agents")?;

    Ok(Runtime {
        config,
        registry,
        dispatcher: Arc::new(dispatcher),
        observer,
    })
}

async fn ask_once(dispatcher: &Dispatcher, message: String, session: Option<&str>) -> Result<()> {
    let mut request = DispatchRequest::new(message);
    if let Some(session) = session {
        request = request.with_session(session);
    }

    let cancel = CancellationToken::new();
    let response = tokio::select! {
        result = dispatcher.dispatch(request, &cancel) => result?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            bail!("Interrupted");
        }
    };

    println!("{}", response.response);
    info!(agent = %response.agent_used, session = %response.session_id, "Answered");
    Ok(())
}

async fn ask_interactive(dispatcher: &Dispatcher, session: Option<&str>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Helios ERP assistant. Type 'exit' to quit.");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        if let Err(e) = ask_once(dispatcher, line.to_string(), session).await {
            eprintln!("Error: {e:#}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("HELIOS_CONFIG_DIR", config_dir);
    }

    let config = Config::load_or_init().await?;
    observability::init_logging(&config.observability.log_format, "info");
    info!(path = %config.config_path.display(), "Using config");

    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            info!("Starting Helios gateway on {host}:{port}");

            let runtime = build_runtime(config)?;
            let state = AppState {
                dispatcher: Arc::clone(&runtime.dispatcher),
                tools: Arc::new(runtime.registry.specs()),
                observer: Arc::clone(&runtime.observer),
                provider: runtime.config.provider_name().to_string(),
                model: runtime.config.model_name().to_string(),
            };
            gateway::run_gateway(&host, port, &runtime.config.gateway, state).await
        }

        Commands::Ask { message, session } => {
            let runtime = build_runtime(config)?;
            match message {
                Some(message) => {
                    ask_once(&runtime.dispatcher, message, session.as_deref()).await
                }
                None => ask_interactive(&runtime.dispatcher, session.as_deref()).await,
            }
        }

        Commands::InitDb => {
            let path = config.database_path();
            ErpStore::open(&path)?;
            println!("ERP database ready at {}", path.display());
            Ok(())
        }

        Commands::Tools => {
            let runtime = build_runtime(config)?;
            let specs = runtime.registry.specs();
            println!("Registered tools ({} total):\n", specs.len());
            for spec in specs {
                println!("  {:<22} {}", spec.name, spec.description);
            }
            Ok(())
        }

        Commands::Providers => {
            let current = config.provider_name().trim().to_ascii_lowercase();
            println!("Supported providers:\n");
            for p in providers::list_providers() {
                let marker = if p.name == current { " (active)" } else { "" };
                let local_tag = if p.local { " [local]" } else { "" };
                println!("  {:<10} {}{}{}", p.name, p.display_name, local_tag, marker);
            }
            println!("\n  custom:<URL>   Any OpenAI-compatible endpoint");
            Ok(())
        }

        Commands::Status => {
            println!("Helios Status");
            println!();
            println!("Version:        {}", env!("CARGO_PKG_VERSION"));
            println!("Config:         {}", config.config_path.display());
            println!("Database:       {}", config.database_path().display());
            println!();
            println!("Provider:       {}", config.provider_name());
            println!("Model:          {}", config.model_name());
            println!("Temperature:    {}", config.default_temperature);
            println!(
                "API key:        {}",
                if config.api_key.is_some() { "set" } else { "not set" }
            );
            println!();
            println!("Max iterations: {}", config.agent.max_iterations);
            println!("Time limit:     {}s", config.agent.max_execution_secs);
            println!("Strict mode:    {}", config.agent.strict);
            println!(
                "Memory:         {} exchanges ({})",
                config.memory.window,
                if config.memory.per_session {
                    "per session"
                } else {
                    "shared"
                }
            );
            println!(
                "Gateway:        {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("Observability:  {}", config.observability.backend);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_parses_message_and_session() {
        let cli = Cli::try_parse_from(["helios", "ask", "-m", "List leads", "--session", "s1"])
            .expect("ask invocation should parse");
        match cli.command {
            Commands::Ask { message, session } => {
                assert_eq!(message.as_deref(), Some("List leads"));
                assert_eq!(session.as_deref(), Some("s1"));
            }
            other => panic!("expected ask command, got {other:?}"),
        }
    }

    #[test]
    fn serve_and_init_db_parse() {
        let cli = Cli::try_parse_from(["helios", "serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000), host: None }));

        let cli = Cli::try_parse_from(["helios", "--config-dir", "/tmp/h", "init-db"]).unwrap();
        assert!(matches!(cli.command, Commands::InitDb));
        assert_eq!(cli.config_dir.as_deref(), Some("/tmp/h"));
    }
}
