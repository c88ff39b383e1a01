//! `swarmkeepd` — headless entry point for the orchestrator: starts the
//! scheduler and (when compiled in) the HTTP gateway, and offers a handful
//! of direct administration subcommands against the same task database.
//! Global `--raw`/`--json` flags and one subcommand per subsystem; the
//! administration subcommands open the database directly rather than
//! talking to a running daemon, since this crate ships no always-on
//! background process of its own to attach to.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use swarmkeep::config::{self, Config};
use swarmkeep::context::ContextManager;
use swarmkeep::runtime::Runtime;
use swarmkeep::tasks::{TaskFilter, TaskId, TaskStatus};
use swarmkeep::tools::ToolFilter;

#[derive(Parser, Debug)]
#[command(name = "swarmkeepd", about = "Multi-agent task orchestrator", version)]
struct Cli {
    /// Path to a TOML config file; falls back to the platform default, then
    /// to built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as raw text where applicable.
    #[arg(long, global = true)]
    raw: bool,

    /// Print results as pretty-printed JSON (the default for most commands).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the scheduler and gateway in the foreground until interrupted.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect tasks in the task store.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Inspect or manage the tool registry.
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },
    /// Posts a one-off message to a fresh context and prints the context id.
    Message { text: String },
    /// Inspect the resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Prints the fully resolved configuration (defaults, file, env overrides).
    Show,
}

#[derive(Subcommand, Debug)]
enum TaskAction {
    /// Lists tasks, optionally filtered by status.
    Ls {
        #[arg(long)]
        status: Option<String>,
    },
    /// Shows one task by id.
    Show { task_id: String },
}

#[derive(Subcommand, Debug)]
enum ToolAction {
    /// Lists registered tools.
    Ls,
    /// Installs a tool manifest into the manifest directory.
    Install { manifest_path: PathBuf },
    /// Removes a tool by name.
    Uninstall { name: String },
}

fn load_config(path: Option<&PathBuf>) -> Config {
    match config::load(path.map(|p| p.as_path())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn print_value(value: &serde_json::Value, raw: bool) {
    if raw {
        if let Some(s) = value.as_str() {
            println!("{s}");
            return;
        }
    }
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match &cli.command {
        Commands::Serve { port } => run_serve(config, *port).await,
        Commands::Task { action } => run_task(config, action, cli.json).await,
        Commands::Tool { action } => run_tool(config, action, cli.json).await,
        Commands::Message { text } => run_message(config, text, cli.raw).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => print_value(&serde_json::to_value(&config).unwrap_or_default(), cli.raw),
        },
    }
}

async fn run_serve(mut config: Config, port: Option<u16>) {
    let _logging = swarmkeep::logging::init(None);
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let runtime = match Runtime::build(config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to start: {e}");
            std::process::exit(1);
        }
    };
    let (scheduler_handle, shutdown) = runtime.spawn_scheduler();

    #[cfg(feature = "gateway")]
    {
        let state = runtime.gateway_state();
        let port = runtime.config.gateway.port;
        if let Err(e) = swarmkeep::gateway::serve(state, port).await {
            eprintln!("gateway error: {e}");
        }
    }
    #[cfg(not(feature = "gateway"))]
    {
        tracing::info!("gateway feature not compiled in; running scheduler only");
        let _ = tokio::signal::ctrl_c().await;
    }

    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    let _ = scheduler_handle.await;
}

async fn run_task(config: Config, action: &TaskAction, json_mode: bool) {
    let runtime = match Runtime::build(config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    match action {
        TaskAction::Ls { status } => {
            let status = status.as_deref().and_then(parse_status);
            let tasks = runtime
                .task_store
                .query(TaskFilter {
                    status,
                    ..Default::default()
                })
                .await
                .unwrap_or_default();
            print_value(&json!(tasks), !json_mode);
        }
        TaskAction::Show { task_id } => match task_id.parse::<TaskId>() {
            Ok(id) => match runtime.task_store.get(id).await {
                Ok(task) => print_value(&json!(task), false),
                Err(e) => eprintln!("error: {e}"),
            },
            Err(_) => eprintln!("error: invalid task id '{task_id}'"),
        },
    }
}

fn parse_status(s: &str) -> Option<TaskStatus> {
    match s {
        "pending" => Some(TaskStatus::Pending),
        "scheduled" => Some(TaskStatus::Scheduled),
        "running" => Some(TaskStatus::Running),
        "blocked" => Some(TaskStatus::Blocked),
        "succeeded" => Some(TaskStatus::Succeeded),
        "failed" => Some(TaskStatus::Failed),
        "cancelled" => Some(TaskStatus::Cancelled),
        _ => None,
    }
}

async fn run_tool(config: Config, action: &ToolAction, json_mode: bool) {
    let runtime = match Runtime::build(config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    match action {
        ToolAction::Ls => {
            let tools = runtime.tool_registry.list(ToolFilter::default()).await;
            print_value(&json!(tools), !json_mode);
        }
        ToolAction::Install { manifest_path } => match runtime.tool_registry.install(manifest_path).await {
            Ok(name) => println!("installed {name}"),
            Err(e) => eprintln!("error: {e}"),
        },
        ToolAction::Uninstall { name } => match runtime.tool_registry.uninstall(name).await {
            Ok(()) => println!("uninstalled {name}"),
            Err(e) => eprintln!("error: {e}"),
        },
    }
}

async fn run_message(config: Config, text: &str, raw: bool) {
    let runtime = match Runtime::build(config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let context_manager: Arc<ContextManager> = runtime.context_manager.clone();
    match context_manager.post_message(None, text, Vec::new()).await {
        Ok(context_id) => {
            let pending = runtime
                .task_store
                .query(TaskFilter {
                    context_id: Some(context_id),
                    status: Some(TaskStatus::Pending),
                    ..Default::default()
                })
                .await
                .unwrap_or_default();
            if let Some(latest) = pending.into_iter().max_by_key(|t| t.created_at) {
                runtime.scheduler.enqueue(&latest).await;
            }
            if raw {
                println!("{context_id}");
            } else {
                print_value(&json!({"context": context_id}), false);
            }
        }
        Err(e) => eprintln!("error: {e}"),
    }
}
