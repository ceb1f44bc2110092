//! CClaw: a minimal tool-using AI assistant runtime.
//!
//! Modes:
//! - `cclaw`                     interactive terminal
//! - `cclaw "prompt"`            one-shot query
//! - `cclaw --telegram`          Telegram bot (long-polling)
//!
//! A WebSocket gateway and the cron scheduler run as background tasks in
//! every mode; all channels share one agent context and one provider.

mod gateway_bridge;
mod prompt;

use cclaw_agent::AgentContext;
use cclaw_channels::{TelegramChannel, TelegramConfig};
use cclaw_config::Config;
use cclaw_core::Shutdown;
use cclaw_cron::Scheduler;
use cclaw_gateway::WsServerConfig;
use cclaw_http::HttpClient;
use cclaw_memory::MemoryStore;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "cclaw", about = "CClaw, a minimal tool-using AI assistant")]
struct Cli {
    /// One-shot prompt; omit for interactive mode
    prompt: Option<String>,

    /// Config file path (default: ~/.cclaw/config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workspace directory (default: current directory)
    #[arg(long)]
    workspace: Option<String>,

    /// Override the model
    #[arg(long)]
    model: Option<String>,

    /// Start the Telegram bot
    #[arg(long)]
    telegram: bool,

    /// Override the WebSocket gateway port (0 disables)
    #[arg(long)]
    gateway_port: Option<u16>,

    /// Print version
    #[arg(short = 'v', long = "version")]
    version: bool,
}

fn load_config(cli: &Cli) -> Config {
    let mut cfg = Config::default();

    match &cli.config {
        Some(path) => {
            if let Err(e) = cfg.load_file(path) {
                warn!("{e}");
            }
        }
        None => {
            if let Ok(home) = std::env::var("HOME") {
                // A missing default config is normal.
                let _ = cfg.load_file(&Path::new(&home).join(".cclaw").join("config"));
            }
        }
    }

    cfg.load_env();

    if let Some(workspace) = &cli.workspace {
        cfg.workspace = workspace.clone();
    }
    if let Some(model) = &cli.model {
        cfg.model = model.clone();
    }
    if let Some(port) = cli.gateway_port {
        cfg.gateway_port = port;
    }

    if cfg.workspace.is_empty() {
        cfg.workspace = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| ".".into());
    }

    cfg
}

async fn build_agent(cfg: &Config, http: Arc<HttpClient>) -> AgentContext {
    let workspace = PathBuf::from(&cfg.workspace);
    let system_prompt = prompt::build_system_prompt(&workspace, &cfg.model);

    let mut tools = cclaw_tools::default_registry();
    if !cfg.memory_db.is_empty() {
        let db_path = workspace.join(&cfg.memory_db);
        match MemoryStore::open(&db_path.display().to_string()).await {
            Ok(store) => {
                cclaw_tools::memory::register_memory_tools(&mut tools, Arc::new(store));
            }
            Err(e) => warn!("memory store unavailable: {e}"),
        }
    }
    let tools = Arc::new(tools);

    AgentContext {
        provider: cclaw_providers::select(&cfg.provider, http, cfg.api_key.clone()),
        tools_json: tools.definitions_json(),
        tools,
        system_prompt,
        model: cfg.model.clone(),
        temperature: cfg.temperature,
        workspace,
    }
}

fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown requested");
        shutdown.trigger();
    });
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("cclaw {VERSION}");
        return std::process::ExitCode::SUCCESS;
    }

    let cfg = load_config(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cfg.log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cfg.api_key.is_empty() {
        eprintln!("Error: no API key. Set ANTHROPIC_API_KEY or CCLAW_API_KEY.");
        return std::process::ExitCode::FAILURE;
    }

    let http = match HttpClient::new() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error: failed to initialize HTTP/TLS client: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let agent = Arc::new(build_agent(&cfg, http.clone()).await);
    cfg.dump();

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    // Cron scheduler runs in every mode. Jobs are registered here, before
    // the loop starts.
    let scheduler = Scheduler::new();
    tokio::spawn(scheduler.run(shutdown.clone()));

    if cfg.gateway_port > 0 {
        let ws_cfg = WsServerConfig {
            port: cfg.gateway_port,
            auth_token: (!cfg.gateway_token.is_empty()).then(|| cfg.gateway_token.clone()),
        };
        let bridge = Arc::new(gateway_bridge::GatewayBridge {
            agent: agent.clone(),
        });
        let gateway_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = cclaw_gateway::serve(ws_cfg, bridge, gateway_shutdown).await {
                error!("gateway failed: {e}");
            }
        });
    }

    if cli.telegram || cfg.telegram_enabled {
        if cfg.telegram_token.is_empty() {
            eprintln!("Error: no Telegram token. Set CCLAW_TELEGRAM_TOKEN.");
            return std::process::ExitCode::FAILURE;
        }
        let channel = TelegramChannel::new(
            http,
            TelegramConfig {
                token: cfg.telegram_token.clone(),
                allowed: cfg.telegram_allowed.clone(),
            },
        );
        channel.poll_loop(&agent, shutdown.clone()).await;
    } else if let Some(prompt) = &cli.prompt {
        cclaw_channels::one_shot(&agent, prompt, shutdown.clone()).await;
    } else {
        cclaw_channels::interactive(&agent, VERSION, shutdown.clone()).await;
    }

    shutdown.trigger();
    std::process::ExitCode::SUCCESS
}
