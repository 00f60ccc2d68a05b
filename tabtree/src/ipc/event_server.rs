use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};

use tabtree_ipc::{SubscribeRequest, TreeEvent};

pub type SnapshotSender = mpsc::Sender<oneshot::Sender<TreeEvent>>;

pub struct EventServer {
    socket_path: PathBuf,
    event_rx: broadcast::Receiver<TreeEvent>,
    snapshot_tx: SnapshotSender,
}

impl EventServer {
    pub fn new(
        socket_path: PathBuf,
        event_rx: broadcast::Receiver<TreeEvent>,
        snapshot_tx: SnapshotSender,
    ) -> Self {
        Self {
            socket_path,
            event_rx,
            snapshot_tx,
        }
    }

    pub async fn run(self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Event server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let event_rx = self.event_rx.resubscribe();
                    let snapshot_tx = self.snapshot_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, event_rx, snapshot_tx).await
                        {
                            // Only log if it's not a normal disconnection
                            if !e.to_string().contains("connection reset")
                                && !e.to_string().contains("Broken pipe")
                            {
                                tracing::debug!("Event subscriber disconnected: {}", e);
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Event server accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        stream: UnixStream,
        mut event_rx: broadcast::Receiver<TreeEvent>,
        snapshot_tx: SnapshotSender,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }

        let request: SubscribeRequest = serde_json::from_str(line.trim()).unwrap_or_default();
        let filter = request.effective_filter();
        tracing::debug!("New event subscriber with filter: {:?}", filter);

        if request.snapshot {
            if let Some(snapshot) = request_snapshot(&snapshot_tx).await {
                let json = serde_json::to_string(&snapshot)?;
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if filter.matches(&event) {
                        let json = serde_json::to_string(&event)?;
                        writer.write_all(json.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // A lagging subscriber misses tree events; it should
                    // reconnect with a snapshot to resynchronize
                    tracing::warn!("Event subscriber lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }

        Ok(())
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Ask the main loop for a snapshot of the current tree
async fn request_snapshot(snapshot_tx: &SnapshotSender) -> Option<TreeEvent> {
    let (resp_tx, resp_rx) = oneshot::channel();
    snapshot_tx.send(resp_tx).await.ok()?;
    resp_rx.await.ok()
}

/// Event broadcaster that holds the sender side of the broadcast channel
#[derive(Clone)]
pub struct EventBroadcaster {
    event_tx: broadcast::Sender<TreeEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    /// Get a receiver for the event server
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Send an event to all subscribers
    pub fn send(&self, event: TreeEvent) {
        // No subscribers is not an error
        let _ = self.event_tx.send(event);
    }
}
