// Persistent WebSocket connection to the device
//
// The socket lives in one spawned task. The panel talks to it through an
// unbounded command channel and hears back through an event channel; the
// current state is also mirrored in a watch channel so `send` can check it
// without awaiting.

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, trace, warn};

use crate::messages::OutboundFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Error,
}

impl ConnectionState {
    /// Status line shown to the operator
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "WebSocket is not connected",
            Self::Open => "WebSocket is connected",
            Self::Closed => "WebSocket closed",
            Self::Error => "WebSocket error!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    State(ConnectionState),
    /// Raw text payload of one inbound message
    Frame(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

#[derive(Debug)]
enum Command {
    Send(String),
    Close,
}

/// Handle to the connection task
pub struct Transport {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl Transport {
    /// Start connecting to `url`; must be called inside a tokio runtime
    ///
    /// Events arrive on the returned receiver in transport order. There is no
    /// reconnection: once `Closed` is reported the handle is spent.
    pub fn connect(url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let url = url.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let link = Link {
            events: event_tx,
            state: state_tx,
        };
        let task = tokio::spawn(run_connection(url, command_rx, link));

        let transport = Self {
            commands: command_tx,
            state: state_rx,
            task,
        };
        (transport, event_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Fire-and-forget send
    ///
    /// Frames sent while the connection is not open are dropped. Returns
    /// whether the frame was handed to the socket task.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        if self.state() != ConnectionState::Open {
            trace!("Dropping {} while {:?}", frame, self.state());
            return false;
        }
        self.commands.send(Command::Send(frame.encode())).is_ok()
    }

    /// Ask the task to close the socket
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Wait for the connection task to finish
    pub async fn closed(self) {
        if let Err(e) = self.task.await {
            warn!("Connection task ended abnormally: {}", e);
        }
    }
}

/// Task-side ends of the event and state channels
struct Link {
    events: mpsc::UnboundedSender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
}

impl Link {
    fn transition(&self, next: ConnectionState) {
        info!("Connection state: {:?}", next);
        self.state.send_replace(next);
        // The panel may already be gone during shutdown
        let _ = self.events.send(TransportEvent::State(next));
    }

    fn deliver(&self, text: String) {
        let _ = self.events.send(TransportEvent::Frame(text));
    }
}

async fn run_connection(url: String, commands: mpsc::UnboundedReceiver<Command>, link: Link) {
    link.transition(ConnectionState::Connecting);

    match drive_socket(&url, commands, &link).await {
        Ok(()) => info!("Connection to {} closed", url),
        Err(e) => {
            warn!("Connection to {} failed: {}", url, e);
            link.transition(ConnectionState::Error);
        }
    }

    link.transition(ConnectionState::Closed);
}

async fn drive_socket(
    url: &str,
    mut commands: mpsc::UnboundedReceiver<Command>,
    link: &Link,
) -> Result<(), TransportError> {
    let (socket, _response) = connect_async(url).await?;
    link.transition(ConnectionState::Open);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    trace!("-> {}", text);
                    sink.send(Message::Text(text)).await?;
                }
                Some(Command::Close) | None => {
                    debug!("Closing connection");
                    sink.send(Message::Close(None)).await?;
                    return Ok(());
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    trace!("<- {}", text);
                    link.deliver(text);
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Peer closed connection: {:?}", frame);
                    // Flushes the close reply tungstenite queued; the peer may
                    // already have hung up, so failure here is not an error
                    if let Err(e) = sink.close().await {
                        debug!("Close reply not delivered: {}", e);
                    }
                    return Ok(());
                }
                Some(Ok(other)) => debug!("Ignoring non-text message: {:?}", other),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        }
    }
}
