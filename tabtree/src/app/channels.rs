use tokio::sync::{broadcast, mpsc, oneshot};

use crate::core::Config;
use crate::event::Event;
use crate::ipc::{CommandSender, EventBroadcaster, EventServer, IpcServer, SnapshotSender};
use tabtree_ipc::{Command, Response, TreeEvent};

pub type IpcCommandWithResponse = (Command, mpsc::Sender<Response>);

pub type SnapshotRequest = oneshot::Sender<TreeEvent>;

/// Ends handed to the socket servers
pub struct ServerChannels {
    pub cmd_tx: CommandSender,
    pub event_server_rx: broadcast::Receiver<TreeEvent>,
    pub snapshot_tx: SnapshotSender,
}

/// Ends owned by the main loop
pub struct MainChannels {
    pub cmd_rx: mpsc::Receiver<IpcCommandWithResponse>,
    pub event_tx: mpsc::UnboundedSender<Event>,
    pub event_rx: mpsc::UnboundedReceiver<Event>,
    pub snapshot_rx: mpsc::Receiver<SnapshotRequest>,
    pub broadcaster: EventBroadcaster,
}

pub fn create_channels() -> (ServerChannels, MainChannels) {
    // Channel: IPC commands (servers -> main loop)
    let (cmd_tx, cmd_rx) = mpsc::channel::<IpcCommandWithResponse>(256);

    // Channel: host call completions (effect tasks -> main loop)
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    // Event broadcasting for tree streaming
    let broadcaster = EventBroadcaster::new(256);
    let event_server_rx = broadcaster.subscribe();

    // Channel: snapshot requests (event server -> main loop)
    let (snapshot_tx, snapshot_rx) = mpsc::channel::<SnapshotRequest>(16);

    let server_channels = ServerChannels {
        cmd_tx,
        event_server_rx,
        snapshot_tx,
    };
    let main_channels = MainChannels {
        cmd_rx,
        event_tx,
        event_rx,
        snapshot_rx,
        broadcaster,
    };

    (server_channels, main_channels)
}

/// Start the command and event socket servers
pub fn spawn_servers(config: &Config, channels: ServerChannels) {
    let ServerChannels {
        cmd_tx,
        event_server_rx,
        snapshot_tx,
    } = channels;

    let ipc_server = IpcServer::new(config.socket_path.clone(), cmd_tx);
    tokio::spawn(async move {
        if let Err(e) = ipc_server.run().await {
            tracing::error!("IPC server error: {}", e);
        }
    });

    let event_server = EventServer::new(
        config.event_socket_path.clone(),
        event_server_rx,
        snapshot_tx,
    );
    tokio::spawn(async move {
        if let Err(e) = event_server.run().await {
            tracing::error!("Event server error: {}", e);
        }
    });
}
