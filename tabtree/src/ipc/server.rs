use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use tabtree_ipc::{Command, Response};

pub type CommandSender = mpsc::Sender<(Command, mpsc::Sender<Response>)>;

/// Line-delimited JSON command server. Serves both CLI clients and the
/// browser bridge, which streams `Command::Host` notifications over one
/// long-lived connection.
pub struct IpcServer {
    socket_path: PathBuf,
    cmd_tx: CommandSender,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf, cmd_tx: CommandSender) -> Self {
        Self {
            socket_path,
            cmd_tx,
        }
    }

    pub async fn run(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let cmd_tx = self.cmd_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, cmd_tx).await {
                            tracing::error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(stream: UnixStream, cmd_tx: CommandSender) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = handle_line(line, &cmd_tx).await;
            let response_json = serde_json::to_string(&response)?;
            writer.write_all(response_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        Ok(())
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Parse one command line and wait for the main loop's answer
async fn handle_line(line: &str, cmd_tx: &CommandSender) -> Response {
    let cmd = match serde_json::from_str::<Command>(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            return Response::Error {
                message: format!("Invalid command: {}", e),
            }
        }
    };
    match &cmd {
        Command::Host { .. } | Command::HostReply { .. } => {
            tracing::trace!("Received bridge message: {:?}", cmd)
        }
        _ => tracing::debug!("Received command: {:?}", cmd),
    }

    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    if cmd_tx.send((cmd, resp_tx)).await.is_err() {
        return Response::Error {
            message: "Internal error: command channel closed".to_string(),
        };
    }
    resp_rx.recv().await.unwrap_or(Response::Error {
        message: "Internal error: no response".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_line_rejects_invalid_json() {
        let (cmd_tx, _cmd_rx) = mpsc::channel(1);
        let response = handle_line("{\"type\":\"nope\"}", &cmd_tx).await;
        assert!(matches!(
            response,
            Response::Error { message } if message.starts_with("Invalid command")
        ));
    }

    #[tokio::test]
    async fn test_handle_line_forwards_to_main_loop() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<(Command, mpsc::Sender<Response>)>(1);
        tokio::spawn(async move {
            if let Some((cmd, resp_tx)) = cmd_rx.recv().await {
                assert!(matches!(cmd, Command::Reconcile));
                let _ = resp_tx.send(Response::Ok).await;
            }
        });
        let response = handle_line("{\"type\":\"reconcile\"}", &cmd_tx).await;
        assert_eq!(response, Response::Ok);
    }

    #[tokio::test]
    async fn test_handle_line_with_closed_loop() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(cmd_rx);
        let response = handle_line("{\"type\":\"get_tree\"}", &cmd_tx).await;
        assert!(matches!(response, Response::Error { .. }));
    }
}
