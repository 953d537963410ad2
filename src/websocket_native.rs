//! Native WebSocket driver for the connection status client
//!
//! Runs the same state machine as the browser build on a tokio task, with
//! tokio-tungstenite for the socket and in-memory elements standing in for
//! the page. Used by the CLI monitor.

use crate::core::{
    Command, ConnectionConfig, ConnectionStatus, MemoryElement, StatusElements, TimerId,
    UplinkError,
};
use crate::ws_state::WsState;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Duration, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectFuture = Pin<Box<dyn Future<Output = Result<WsStream, UplinkError>> + Send>>;

/// Snapshot of the client published after every step
#[derive(Clone, Debug, PartialEq)]
pub struct ClientStatus {
    pub state: WsState,
    pub degraded: bool,
    pub attempts: u64,
    pub outage_ms: Option<f64>,
}

/// Native WebSocket client running on a background task
pub struct NativeWsClient {
    /// Shared connection status
    pub status: Arc<Mutex<ClientStatus>>,
    /// Elements the client writes into (clones share content)
    pub elements: StatusElements<MemoryElement>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl NativeWsClient {
    /// Spawn the client onto the current tokio runtime and start connecting
    pub fn spawn(config: ConnectionConfig) -> Self {
        let elements = StatusElements {
            status: MemoryElement::new(),
            info: MemoryElement::new(),
        };
        let status = Arc::new(Mutex::new(ClientStatus {
            state: WsState::Connecting,
            degraded: false,
            attempts: 0,
            outage_ms: None,
        }));
        let (tx, rx) = oneshot::channel();

        let driver = Driver {
            machine: ConnectionStatus::new(config, elements.clone()),
            status: status.clone(),
            connecting: None,
            stream: None,
            timers: TimerQueue::default(),
        };
        let task = tokio::spawn(driver.run(rx));

        Self {
            status,
            elements,
            shutdown: Some(tx),
            task,
        }
    }

    pub fn status(&self) -> ClientStatus {
        self.status.lock().clone()
    }

    pub fn state(&self) -> WsState {
        self.status.lock().state
    }

    /// Stop reconnecting, close the socket and wait for the task to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            error!(error = %e, "Connection task failed");
        }
    }
}

/// Pending timers ordered by deadline, ties broken by schedule order
#[derive(Debug, Default)]
struct TimerQueue {
    pending: Vec<(Instant, TimerId)>,
}

impl TimerQueue {
    fn schedule(&mut self, id: TimerId, at: Instant) {
        self.pending.push((at, id));
    }

    /// Returns false if the timer was not pending
    fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(_, t)| *t != id);
        self.pending.len() != before
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|(at, _)| *at).min()
    }

    /// Remove and return the earliest timer due at `now`
    fn pop_due(&mut self, now: Instant) -> Option<TimerId> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= now)
            .min_by_key(|(_, entry)| **entry)
            .map(|(i, _)| i)?;
        Some(self.pending.remove(index).1)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

struct Driver {
    machine: ConnectionStatus<MemoryElement>,
    status: Arc<Mutex<ClientStatus>>,
    connecting: Option<ConnectFuture>,
    stream: Option<WsStream>,
    timers: TimerQueue,
}

impl Driver {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let commands = self.machine.connect();
        self.execute(commands).await;
        self.publish();

        loop {
            let deadline = self.timers.next_deadline();

            tokio::select! {
                _ = &mut shutdown => {
                    let commands = self.machine.shutdown();
                    self.execute(commands).await;
                    break;
                }
                result = next_connect(&mut self.connecting) => {
                    self.connecting = None;
                    let commands = match result {
                        Ok(stream) => {
                            self.stream = Some(stream);
                            self.machine.on_open()
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to connect");
                            self.machine.on_close()
                        }
                    };
                    self.execute(commands).await;
                }
                frame = next_frame(&mut self.stream) => {
                    let commands = match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.machine.on_message(&text);
                            Vec::new()
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!(?frame, "WebSocket closed by server");
                            self.stream = None;
                            self.machine.on_close()
                        }
                        Some(Ok(Message::Binary(data))) => {
                            debug!(len = data.len(), "Binary frame ignored");
                            Vec::new()
                        }
                        Some(Ok(_)) => Vec::new(),
                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            self.stream = None;
                            self.machine.on_close()
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            self.stream = None;
                            self.machine.on_close()
                        }
                    };
                    self.execute(commands).await;
                }
                _ = sleep_until_deadline(deadline) => {
                    let now = Instant::now();
                    while let Some(id) = self.timers.pop_due(now) {
                        let commands = self.machine.on_timer(id);
                        self.execute(commands).await;
                    }
                }
            }

            self.publish();
        }

        self.publish();
    }

    async fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Open { url } => {
                    // abandon any previous socket
                    self.stream = None;
                    let limit_ms = self.machine.config().connect_timeout_ms;
                    self.connecting = Some(Box::pin(open_stream(url, limit_ms)));
                }
                Command::Close => {
                    self.connecting = None;
                    if let Some(mut stream) = self.stream.take() {
                        if let Err(e) = stream.close(None).await {
                            debug!(error = %e, "Close handshake failed");
                        }
                    }
                }
                Command::Schedule { id, kind, delay_ms } => {
                    debug!(?id, ?kind, delay_ms, "Timer scheduled");
                    let at = Instant::now() + Duration::from_millis(delay_ms.into());
                    self.timers.schedule(id, at);
                }
                Command::Cancel { id } => {
                    self.timers.cancel(id);
                }
            }
        }
    }

    fn publish(&self) {
        *self.status.lock() = ClientStatus {
            state: self.machine.state(),
            degraded: self.machine.is_degraded(),
            attempts: self.machine.attempts(),
            outage_ms: self.machine.outage_millis(),
        };
    }
}

/// Connect and finish the handshake within `limit_ms`
async fn open_stream(url: String, limit_ms: u32) -> Result<WsStream, UplinkError> {
    match timeout(Duration::from_millis(limit_ms.into()), connect_async(url)).await {
        Ok(Ok((stream, _))) => Ok(stream),
        Ok(Err(e)) => Err(UplinkError::Socket(e.to_string())),
        Err(_) => Err(UplinkError::Socket(format!(
            "handshake timed out after {limit_ms} ms"
        ))),
    }
}

async fn next_connect(connecting: &mut Option<ConnectFuture>) -> Result<WsStream, UplinkError> {
    match connecting {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(
    stream: &mut Option<WsStream>,
) -> Option<Result<Message, tungstenite::Error>> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
