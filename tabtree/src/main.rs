mod app;
mod core;
mod effect;
mod event;
mod event_emitter;
mod ipc;
mod platform;

use std::path::PathBuf;

use anyhow::{bail, Result};
use argh::FromArgs;
use ipc::IpcClient;
use tabtree_ipc::{Command, Disposition, EventFilter, Response};
use tracing_subscriber::EnvFilter;

use crate::core::{Config, DEFAULT_EVENT_SOCKET_PATH, DEFAULT_SOCKET_PATH};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// tabtree - hierarchical browser tab tree daemon
#[derive(FromArgs)]
struct Cli {
    /// command socket path
    #[argh(option)]
    socket: Option<PathBuf>,
    /// event socket path
    #[argh(option)]
    event_socket: Option<PathBuf>,
    #[argh(subcommand)]
    command: Option<SubCommand>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Start(StartCmd),
    Version(VersionCmd),
    GetTree(GetTreeCmd),
    GetNode(GetNodeCmd),
    Hibernate(HibernateCmd),
    Awaken(AwakenCmd),
    Pin(PinCmd),
    Unpin(UnpinCmd),
    CreateFolder(CreateFolderCmd),
    CreateHeader(CreateHeaderCmd),
    SetLabel(SetLabelCmd),
    MoveNode(MoveNodeCmd),
    Purge(PurgeCmd),
    Reconcile(ReconcileCmd),
    FocusedWindow(FocusedWindowCmd),
    TopFocusableWindow(TopFocusableWindowCmd),
    Subscribe(SubscribeCmd),
    Quit(QuitCmd),
}

/// Start the tabtree daemon
#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
struct StartCmd {
    /// snapshot file (defaults to the user data directory)
    #[argh(option)]
    state_path: Option<PathBuf>,
    /// do not read or write a snapshot file
    #[argh(switch)]
    no_persist: bool,
    /// the sidebar's own window, excluded from focus history
    #[argh(option)]
    sidebar_window_id: Option<u32>,
    /// milliseconds to wait for a browser reply
    #[argh(option)]
    host_timeout_ms: Option<u64>,
}

/// Show version information
#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCmd {}

/// Print the whole tree as JSON
#[derive(FromArgs)]
#[argh(subcommand, name = "get-tree")]
struct GetTreeCmd {}

/// Print one node and its subtree as JSON
#[derive(FromArgs)]
#[argh(subcommand, name = "get-node")]
struct GetNodeCmd {
    /// node id
    #[argh(positional)]
    id: String,
}

/// Close the tabs of a page or window, keeping the nodes
#[derive(FromArgs)]
#[argh(subcommand, name = "hibernate")]
struct HibernateCmd {
    /// node id
    #[argh(positional)]
    id: String,
}

/// Reopen a hibernated page or window
#[derive(FromArgs)]
#[argh(subcommand, name = "awaken")]
struct AwakenCmd {
    /// node id
    #[argh(positional)]
    id: String,
}

/// Pin a page
#[derive(FromArgs)]
#[argh(subcommand, name = "pin")]
struct PinCmd {
    /// node id
    #[argh(positional)]
    id: String,
}

/// Unpin a page
#[derive(FromArgs)]
#[argh(subcommand, name = "unpin")]
struct UnpinCmd {
    /// node id
    #[argh(positional)]
    id: String,
}

/// Create a folder
#[derive(FromArgs)]
#[argh(subcommand, name = "create-folder")]
struct CreateFolderCmd {
    /// folder label
    #[argh(positional)]
    label: String,
    /// parent node (defaults to the focused window)
    #[argh(option)]
    parent: Option<String>,
}

/// Create a header
#[derive(FromArgs)]
#[argh(subcommand, name = "create-header")]
struct CreateHeaderCmd {
    /// header label
    #[argh(positional)]
    label: String,
    /// parent node (defaults to the focused window)
    #[argh(option)]
    parent: Option<String>,
}

/// Rename a folder or header
#[derive(FromArgs)]
#[argh(subcommand, name = "set-label")]
struct SetLabelCmd {
    /// node id
    #[argh(positional)]
    id: String,
    /// new label
    #[argh(positional)]
    label: String,
}

/// Move a node relative to another node
#[derive(FromArgs)]
#[argh(subcommand, name = "move-node")]
struct MoveNodeCmd {
    /// node to move
    #[argh(positional)]
    id: String,
    /// before, after, prepend or append
    #[argh(positional)]
    disposition: String,
    /// target node
    #[argh(positional)]
    target: String,
}

/// Permanently delete a hibernated page, ghost or dead subtree
#[derive(FromArgs)]
#[argh(subcommand, name = "purge")]
struct PurgeCmd {
    /// node id
    #[argh(positional)]
    id: String,
}

/// Repair pinned ordering across all windows
#[derive(FromArgs)]
#[argh(subcommand, name = "reconcile")]
struct ReconcileCmd {}

/// Print the focused window id
#[derive(FromArgs)]
#[argh(subcommand, name = "focused-window")]
struct FocusedWindowCmd {
    /// rank back from the current window (0 = current)
    #[argh(positional, default = "0")]
    rank: usize,
}

/// Print the most recently focused window that is not minimized
#[derive(FromArgs)]
#[argh(subcommand, name = "top-focusable-window")]
struct TopFocusableWindowCmd {
    /// number of candidates to skip
    #[argh(positional, default = "0")]
    rank: usize,
}

/// Stream tree events as JSON lines
#[derive(FromArgs)]
#[argh(subcommand, name = "subscribe")]
struct SubscribeCmd {
    /// send the current tree first
    #[argh(switch)]
    snapshot: bool,
    /// tree mutation events
    #[argh(switch)]
    tree: bool,
    /// window focus events
    #[argh(switch)]
    focus: bool,
    /// notices
    #[argh(switch)]
    notice: bool,
    /// requests to the browser bridge
    #[argh(switch)]
    host: bool,
}

/// Stop the daemon
#[derive(FromArgs)]
#[argh(subcommand, name = "quit")]
struct QuitCmd {}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();
    let socket_path = cli
        .socket
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));
    let event_socket_path = cli
        .event_socket
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENT_SOCKET_PATH));

    match cli.command {
        None => {
            // No subcommand - show help (simulate --help)
            let args: Vec<&str> = vec!["tabtree", "--help"];
            match Cli::from_args(&args[..1], &args[1..]) {
                Ok(_) => {}
                Err(e) => {
                    println!("{}", e.output);
                }
            }
            Ok(())
        }
        Some(SubCommand::Start(cmd)) => {
            // Start daemon
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();

            let config = start_config(cmd, socket_path, event_socket_path);
            tracing::info!("tabtree starting");
            tracing::debug!("Config: {:?}", config);
            app::App::run(config)
        }
        Some(SubCommand::Version(_)) => {
            println!("tabtree {}", VERSION);
            Ok(())
        }
        Some(SubCommand::Subscribe(cmd)) => {
            let filter = if cmd.tree || cmd.focus || cmd.notice || cmd.host {
                Some(EventFilter {
                    tree: cmd.tree,
                    focus: cmd.focus,
                    notice: cmd.notice,
                    host: cmd.host,
                })
            } else {
                None
            };
            ipc::subscribe_and_print(&event_socket_path, cmd.snapshot, filter)
        }
        Some(subcmd) => run_cli(subcmd, &socket_path),
    }
}

fn start_config(cmd: StartCmd, socket_path: PathBuf, event_socket_path: PathBuf) -> Config {
    let mut config = Config::new();
    if cmd.no_persist {
        config.state_path = None;
        config.persist_on_change = false;
    } else if let Some(path) = cmd.state_path {
        config.state_path = Some(path);
    }
    config.sidebar_window_id = cmd.sidebar_window_id;
    if let Some(timeout) = cmd.host_timeout_ms {
        config.host_timeout_ms = timeout;
    }
    config.socket_path = socket_path;
    config.event_socket_path = event_socket_path;
    config
}

fn run_cli(subcmd: SubCommand, socket_path: &std::path::Path) -> Result<()> {
    let cmd = to_command(subcmd)?;
    let mut client = IpcClient::connect(socket_path)?;
    let response = client.send(&cmd)?;

    match response {
        Response::Ok => {}
        Response::Error { message } => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
        Response::Tree { windows } => {
            println!("{}", serde_json::to_string_pretty(&windows)?);
        }
        Response::Node { node } => {
            println!("{}", serde_json::to_string_pretty(&node)?);
        }
        Response::NodeId { id } => {
            println!("{}", id);
        }
        Response::WindowId { id } => {
            if let Some(id) = id {
                println!("{}", id);
            } else {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn to_command(subcmd: SubCommand) -> Result<Command> {
    match subcmd {
        SubCommand::Start(_) | SubCommand::Version(_) | SubCommand::Subscribe(_) => {
            bail!("not a daemon command")
        }
        SubCommand::GetTree(_) => Ok(Command::GetTree),
        SubCommand::GetNode(cmd) => Ok(Command::GetNode { id: cmd.id }),
        SubCommand::Hibernate(cmd) => Ok(Command::Hibernate { id: cmd.id }),
        SubCommand::Awaken(cmd) => Ok(Command::Awaken { id: cmd.id }),
        SubCommand::Pin(cmd) => Ok(Command::Pin { id: cmd.id }),
        SubCommand::Unpin(cmd) => Ok(Command::Unpin { id: cmd.id }),
        SubCommand::CreateFolder(cmd) => Ok(Command::CreateFolder {
            label: cmd.label,
            parent: cmd.parent,
        }),
        SubCommand::CreateHeader(cmd) => Ok(Command::CreateHeader {
            label: cmd.label,
            parent: cmd.parent,
        }),
        SubCommand::SetLabel(cmd) => Ok(Command::SetLabel {
            id: cmd.id,
            label: cmd.label,
        }),
        SubCommand::MoveNode(cmd) => Ok(Command::MoveNode {
            id: cmd.id,
            target: cmd.target,
            disposition: parse_disposition(&cmd.disposition)?,
        }),
        SubCommand::Purge(cmd) => Ok(Command::Purge { id: cmd.id }),
        SubCommand::Reconcile(_) => Ok(Command::Reconcile),
        SubCommand::FocusedWindow(cmd) => Ok(Command::FocusedWindow { rank: cmd.rank }),
        SubCommand::TopFocusableWindow(cmd) => {
            Ok(Command::TopFocusableWindow { rank: cmd.rank })
        }
        SubCommand::Quit(_) => Ok(Command::Quit),
    }
}

fn parse_disposition(s: &str) -> Result<Disposition> {
    match s {
        "before" => Ok(Disposition::Before),
        "after" => Ok(Disposition::After),
        "prepend" => Ok(Disposition::Prepend),
        "append" => Ok(Disposition::Append),
        _ => bail!(
            "Invalid disposition: {} (expected before, after, prepend, append)",
            s
        ),
    }
}
