use tabtree_ipc::{Command, Response};

use crate::core::{State, TreeResult};
use crate::effect::{CommandResult, Effect};

/// Pure function: apply a command to state and report the host work it needs.
/// Commands that wait on the host (`HostReply`, `TopFocusableWindow`) are
/// handled by the dispatcher before they get here.
pub fn process_command(state: &mut State, cmd: &Command) -> CommandResult {
    match cmd {
        // Browser notifications
        Command::Host { event } => with_effects(state.handle_host_event(event)),
        Command::HostReply { .. } | Command::TopFocusableWindow { .. } => {
            CommandResult::error("Command must be handled by the dispatcher")
        }

        // Node operations
        Command::Hibernate { id } => {
            tracing::info!("Hibernate {}", id);
            with_effects(state.hibernate(id))
        }
        Command::Awaken { id } => {
            tracing::info!("Awaken {}", id);
            with_effects(state.awaken(id))
        }
        Command::Pin { id } => with_effects(state.set_pinned(id, true)),
        Command::Unpin { id } => with_effects(state.set_pinned(id, false)),
        Command::CreateFolder { label, parent } => {
            with_node_id(state.create_folder(label, parent.as_deref()))
        }
        Command::CreateHeader { label, parent } => {
            with_node_id(state.create_header(label, parent.as_deref()))
        }
        Command::SetLabel { id, label } => with_ok(state.set_label(id, label)),
        Command::MoveNode {
            id,
            target,
            disposition,
        } => {
            tracing::debug!("Move {} {:?} {}", id, disposition, target);
            with_ok(state.move_node(id, target, *disposition))
        }
        Command::Purge { id } => {
            tracing::info!("Purge {}", id);
            with_ok(state.purge(id))
        }
        Command::Reconcile => match state.reconcile() {
            Ok(moved) => {
                tracing::info!("Reconcile moved {} nodes", moved);
                CommandResult::ok()
            }
            Err(e) => CommandResult::error(e.to_string()),
        },

        // Queries
        Command::GetTree => CommandResult::with_response(Response::Tree {
            windows: state.snapshot(),
        }),
        Command::GetNode { id } => match state.tree.record(id) {
            Some(node) => CommandResult::with_response(Response::Node { node }),
            None => CommandResult::error(format!("Node not found: {}", id)),
        },
        Command::FocusedWindow { rank } => CommandResult::with_response(Response::WindowId {
            id: state.focus.get_focused(*rank),
        }),

        // Control
        Command::Quit => {
            tracing::info!("Quit command received");
            CommandResult::ok()
        }
    }
}

fn with_effects(result: TreeResult<Vec<Effect>>) -> CommandResult {
    match result {
        Ok(effects) => CommandResult::ok_with_effects(effects),
        Err(e) => {
            tracing::warn!("Command failed: {}", e);
            CommandResult::error(e.to_string())
        }
    }
}

fn with_ok(result: TreeResult<()>) -> CommandResult {
    with_effects(result.map(|()| vec![]))
}

fn with_node_id(result: TreeResult<String>) -> CommandResult {
    match result {
        Ok(id) => CommandResult::with_response(Response::NodeId { id }),
        Err(e) => CommandResult::error(e.to_string()),
    }
}
