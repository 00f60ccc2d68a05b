mod channels;
mod command;
mod dispatch;
mod effects;
mod state_events;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use tabtree_ipc::Command;

use crate::core::{persist, Config, State};
use crate::event_emitter::{create_snapshot, EventEmitter};
use crate::platform::BridgeHost;

use channels::{create_channels, spawn_servers, MainChannels};
use dispatch::{dispatch_command, dispatch_event, spawn_top_focusable_window, AppContext};
use state_events::save_snapshot;

pub struct App {}

impl App {
    /// Run the daemon until `quit` or ctrl-c. State lives on one thread;
    /// host calls run as local tasks next to the main loop.
    pub fn run(config: Config) -> Result<()> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let local = tokio::task::LocalSet::new();
        local.block_on(&rt, Self::run_main_loop(config))
    }

    async fn run_main_loop(config: Config) -> Result<()> {
        let state = load_state(config);

        let (server_channels, main_channels) = create_channels();
        spawn_servers(&state.config, server_channels);
        let MainChannels {
            mut cmd_rx,
            event_tx,
            mut event_rx,
            mut snapshot_rx,
            broadcaster,
        } = main_channels;

        let host = Rc::new(BridgeHost::new(
            broadcaster.clone(),
            Duration::from_millis(state.config.host_timeout_ms),
        ));
        let ctx = AppContext {
            state: RefCell::new(state),
            pending: host.pending(),
            host,
            event_emitter: EventEmitter::new(broadcaster),
            event_tx,
        };

        tracing::info!("Main loop started");
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some((cmd, resp_tx)) = cmd_rx.recv() => {
                    match cmd {
                        Command::TopFocusableWindow { rank } => {
                            spawn_top_focusable_window(&ctx, rank, resp_tx);
                        }
                        cmd => {
                            let response = dispatch_command(&ctx, &cmd);
                            let _ = resp_tx.send(response).await;
                            if matches!(cmd, Command::Quit) {
                                break;
                            }
                        }
                    }
                }
                Some(event) = event_rx.recv() => {
                    dispatch_event(&ctx, event);
                }
                Some(snapshot_req) = snapshot_rx.recv() => {
                    let _ = snapshot_req.send(create_snapshot(&ctx.state.borrow()));
                }
                _ = &mut shutdown => {
                    tracing::info!("Interrupted");
                    break;
                }
                else => break,
            }
        }

        if let Err(e) = save_snapshot(&ctx.state.borrow()) {
            tracing::error!("Failed to save tree on exit: {:#}", e);
        }
        tracing::info!("Main loop exiting");
        Ok(())
    }
}

/// Build the initial state, restoring the previous session if one was saved.
/// An unreadable snapshot starts an empty session.
fn load_state(config: Config) -> State {
    let records = match &config.state_path {
        Some(path) => match persist::load(path) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Ignoring saved tree: {:#}", e);
                None
            }
        },
        None => None,
    };

    match records {
        Some(records) => State::with_tree(config, persist::restore(records)),
        None => State::new(config),
    }
}
