use std::cell::RefCell;

use anyhow::Result;

use crate::core::{persist, State};
use crate::event_emitter::{is_tree_mutation, EventEmitter};

/// Emit the events queued by the last state transition.
/// Returns whether the tree itself changed.
pub fn emit_state_change_events(event_emitter: &EventEmitter, state: &RefCell<State>) -> bool {
    let events = state.borrow_mut().drain_events();
    let changed = events.iter().any(is_tree_mutation);
    event_emitter.emit_all(events);
    changed
}

/// Write the snapshot after a tree change, when configured to
pub fn persist_if_changed(state: &RefCell<State>, changed: bool) {
    let state = state.borrow();
    if !changed || !state.config.persist_on_change {
        return;
    }
    if let Err(e) = save_snapshot(&state) {
        tracing::warn!("Failed to persist tree: {:#}", e);
    }
}

/// Write the snapshot to the configured path, if any
pub fn save_snapshot(state: &State) -> Result<()> {
    match &state.config.state_path {
        Some(path) => persist::save(path, &state.snapshot()),
        None => Ok(()),
    }
}
