use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use anyhow::{Context, Result};

use tabtree_ipc::{Command, EventFilter, Response, SubscribeRequest, TreeEvent};

pub struct IpcClient {
    stream: UnixStream,
}

impl IpcClient {
    pub fn connect(socket_path: &Path) -> Result<Self> {
        let stream =
            UnixStream::connect(socket_path).context("Failed to connect to tabtree daemon")?;
        Ok(Self { stream })
    }

    pub fn send(&mut self, cmd: &Command) -> Result<Response> {
        let json = serde_json::to_string(cmd)?;
        writeln!(self.stream, "{}", json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.is_empty() {
            anyhow::bail!("Daemon closed the connection");
        }

        let response: Response =
            serde_json::from_str(&line).context("Malformed response from daemon")?;
        Ok(response)
    }
}

/// Client for subscribing to tree events
pub struct EventClient {
    reader: BufReader<UnixStream>,
}

impl EventClient {
    pub fn connect(socket_path: &Path, request: &SubscribeRequest) -> Result<Self> {
        let mut stream = UnixStream::connect(socket_path)
            .context("Failed to connect to tabtree event server")?;

        let json = serde_json::to_string(request)?;
        writeln!(stream, "{}", json)?;
        stream.flush()?;

        let reader = BufReader::new(stream);
        Ok(Self { reader })
    }

    /// Read the next event (blocking). `None` once the server hangs up.
    pub fn next_event(&mut self) -> Result<Option<TreeEvent>> {
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        if line.is_empty() {
            return Ok(None);
        }
        let event: TreeEvent = serde_json::from_str(&line)?;
        Ok(Some(event))
    }
}

/// Subscribe and print events to stdout, one JSON object per line
pub fn subscribe_and_print(
    socket_path: &Path,
    snapshot: bool,
    filter: Option<EventFilter>,
) -> Result<()> {
    let request = SubscribeRequest {
        snapshot,
        filter: filter.unwrap_or_default(),
    };

    let mut client = EventClient::connect(socket_path, &request)?;
    while let Some(event) = client.next_event()? {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
