//! Connection status state machine
//!
//! Sans-IO: socket callbacks and timer expiries go in, [`Command`]s come out.
//! The browser and native drivers own the real socket and timers and
//! execute the commands; the machine only touches the two status elements.
//!
//! Lifecycle: Connecting -> Connected (open) -> Disconnected (close) ->
//! Connecting (after the reconnect delay) -> ... until [`ConnectionStatus::shutdown`].

use super::config::ConnectionConfig;
use super::element::ElementHandle;
use crate::time::now_millis;
use crate::ws_state::WsState;
use tracing::{debug, info, trace, warn};

/// Handle for a timer scheduled by the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Open a fresh socket
    Reconnect,
    /// Show the degraded status if still disconnected
    ErrorReport,
}

/// Side effects the driver must perform, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open a new socket, abandoning any previous one
    Open { url: String },
    /// Close the live socket and detach its handlers
    Close,
    Schedule {
        id: TimerId,
        kind: TimerKind,
        delay_ms: u32,
    },
    Cancel { id: TimerId },
}

/// The two elements the client reflects its status into
#[derive(Clone, Debug)]
pub struct StatusElements<E> {
    /// Receives the connected / disconnected message
    pub status: E,
    /// Receives pushed payloads and the marker class
    pub info: E,
}

/// Per-client connection state
pub struct ConnectionStatus<E> {
    config: ConnectionConfig,
    elements: StatusElements<E>,
    state: WsState,
    connected: bool,
    degraded: bool,
    reconnect_timer: Option<TimerId>,
    error_timer: Option<TimerId>,
    next_timer_id: u64,
    attempts: u64,
    /// Start of the current outage, app-relative milliseconds
    disconnected_since: Option<f64>,
}

impl<E: ElementHandle> ConnectionStatus<E> {
    pub fn new(config: ConnectionConfig, elements: StatusElements<E>) -> Self {
        Self {
            config,
            elements,
            state: WsState::Disconnected,
            connected: false,
            degraded: false,
            reconnect_timer: None,
            error_timer: None,
            next_timer_id: 0,
            attempts: 0,
            disconnected_since: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> WsState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the degraded status is currently shown
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Number of sockets opened so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// How long the current outage has lasted, if disconnected
    pub fn outage_millis(&self) -> Option<f64> {
        self.disconnected_since.map(|since| (now_millis() - since).max(0.0))
    }

    /// Open a new socket to the configured endpoint
    pub fn connect(&mut self) -> Vec<Command> {
        match self.state {
            WsState::Closed => {
                warn!("connect() after shutdown ignored");
                return Vec::new();
            }
            WsState::Connecting | WsState::Connected => {
                debug!(state = self.state.label(), "Socket already live");
                return Vec::new();
            }
            WsState::Disconnected => {}
        }

        let mut commands = Vec::with_capacity(2);
        if let Some(id) = self.reconnect_timer.take() {
            commands.push(Command::Cancel { id });
        }

        self.attempts += 1;
        self.state = WsState::Connecting;
        info!(url = %self.config.endpoint_url, attempt = self.attempts, "Connecting to WebSocket");
        commands.push(Command::Open {
            url: self.config.endpoint_url.clone(),
        });
        commands
    }

    pub fn on_open(&mut self) -> Vec<Command> {
        match self.state {
            WsState::Connecting => {}
            WsState::Closed => {
                debug!("Socket opened after shutdown, closing it");
                return vec![Command::Close];
            }
            _ => {
                trace!(state = self.state.label(), "Unexpected open ignored");
                return Vec::new();
            }
        }

        info!(attempt = self.attempts, "WebSocket connected");
        self.state = WsState::Connected;
        self.connected = true;
        self.disconnected_since = None;
        self.restore();

        self.error_timer
            .take()
            .map(|id| Command::Cancel { id })
            .into_iter()
            .collect()
    }

    /// Connection lost. Graceful close and failure take the same path.
    pub fn on_close(&mut self) -> Vec<Command> {
        if !matches!(self.state, WsState::Connecting | WsState::Connected) {
            trace!(state = self.state.label(), "Close without live socket ignored");
            return Vec::new();
        }

        self.state = WsState::Disconnected;
        self.connected = false;
        if self.disconnected_since.is_none() {
            self.disconnected_since = Some(now_millis());
        }

        let mut commands = Vec::with_capacity(2);

        let id = self.alloc_timer();
        self.reconnect_timer = Some(id);
        commands.push(Command::Schedule {
            id,
            kind: TimerKind::Reconnect,
            delay_ms: self.config.reconnect_delay_ms,
        });

        // One error report per outage: a failed reconnect does not re-arm it
        if self.error_timer.is_none() && !self.degraded {
            let id = self.alloc_timer();
            self.error_timer = Some(id);
            commands.push(Command::Schedule {
                id,
                kind: TimerKind::ErrorReport,
                delay_ms: self.config.error_report_delay_ms,
            });
        }

        warn!(
            reconnect_ms = self.config.reconnect_delay_ms,
            "WebSocket closed, reconnect scheduled"
        );
        commands
    }

    /// Replace the info element's content with a pushed payload
    pub fn on_message(&mut self, payload: &str) {
        if self.state != WsState::Connected {
            trace!(state = self.state.label(), "Message without open socket ignored");
            return;
        }
        debug!(len = payload.len(), "Info updated");
        self.elements.info.set_inner_html(payload);
    }

    pub fn on_timer(&mut self, id: TimerId) -> Vec<Command> {
        if self.reconnect_timer == Some(id) {
            self.reconnect_timer = None;
            return self.connect();
        }
        if self.error_timer == Some(id) {
            self.error_timer = None;
            if !self.connected && self.state != WsState::Closed {
                self.degrade();
            }
            return Vec::new();
        }
        trace!(?id, "Stale timer ignored");
        Vec::new()
    }

    /// Stop reconnecting: cancel pending timers and close the live socket.
    pub fn shutdown(&mut self) -> Vec<Command> {
        if self.state == WsState::Closed {
            return Vec::new();
        }

        let mut commands: Vec<Command> = [self.reconnect_timer.take(), self.error_timer.take()]
            .into_iter()
            .flatten()
            .map(|id| Command::Cancel { id })
            .collect();
        if matches!(self.state, WsState::Connecting | WsState::Connected) {
            commands.push(Command::Close);
        }

        info!(attempts = self.attempts, "Connection client shut down");
        self.state = WsState::Closed;
        self.connected = false;
        commands
    }

    fn alloc_timer(&mut self) -> TimerId {
        self.next_timer_id += 1;
        TimerId(self.next_timer_id)
    }

    fn degrade(&mut self) {
        warn!(
            disconnected_message = %self.config.disconnected_message,
            outage_ms = ?self.outage_millis(),
            "Connection degraded"
        );
        self.degraded = true;
        self.elements
            .status
            .set_text(&self.config.disconnected_message);
        self.elements.info.add_class(&self.config.marker_class);
    }

    fn restore(&mut self) {
        self.degraded = false;
        self.elements.status.set_text(self.config.connected_text());
        self.elements.info.remove_class(&self.config.marker_class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::MemoryElement;

    const DOWN: &str = "down";

    /// Drives the machine against a simulated clock
    struct Harness {
        client: ConnectionStatus<MemoryElement>,
        status: MemoryElement,
        info: MemoryElement,
        now: u64,
        timers: Vec<(u64, TimerId, TimerKind)>,
        opens: Vec<u64>,
        closes: usize,
    }

    impl Harness {
        fn new(reconnect_delay_ms: u32, error_report_delay_ms: u32) -> Self {
            Self::with_config(ConnectionConfig {
                reconnect_delay_ms,
                error_report_delay_ms,
                disconnected_message: DOWN.into(),
                ..ConnectionConfig::new("ws://localhost/ws")
            })
        }

        fn with_config(config: ConnectionConfig) -> Self {
            let status = MemoryElement::new();
            let info = MemoryElement::with_class_name("info");
            let client = ConnectionStatus::new(
                config,
                StatusElements {
                    status: status.clone(),
                    info: info.clone(),
                },
            );
            Self {
                client,
                status,
                info,
                now: 0,
                timers: Vec::new(),
                opens: Vec::new(),
                closes: 0,
            }
        }

        fn apply(&mut self, commands: Vec<Command>) {
            for command in commands {
                match command {
                    Command::Open { .. } => self.opens.push(self.now),
                    Command::Close => self.closes += 1,
                    Command::Schedule { id, kind, delay_ms } => {
                        self.timers.push((self.now + delay_ms as u64, id, kind))
                    }
                    Command::Cancel { id } => self.timers.retain(|t| t.1 != id),
                }
            }
        }

        fn connect(&mut self) {
            let c = self.client.connect();
            self.apply(c);
        }

        fn open(&mut self) {
            let c = self.client.on_open();
            self.apply(c);
        }

        fn close(&mut self) {
            let c = self.client.on_close();
            self.apply(c);
        }

        /// Fire due timers in deadline order, then move the clock to `now + ms`
        fn advance(&mut self, ms: u64) {
            let target = self.now + ms;
            loop {
                let next = self
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.0 <= target)
                    .min_by_key(|(_, t)| (t.0, t.1))
                    .map(|(i, _)| i);
                let Some(i) = next else { break };
                let (at, id, _) = self.timers.remove(i);
                self.now = at;
                let c = self.client.on_timer(id);
                self.apply(c);
            }
            self.now = target;
        }

        fn pending(&self, kind: TimerKind) -> Vec<(u64, TimerId)> {
            self.timers
                .iter()
                .filter(|t| t.2 == kind)
                .map(|t| (t.0, t.1))
                .collect()
        }

        fn degraded_ui(&self) -> bool {
            self.status.text() == DOWN && self.info.has_class("xconn")
        }
    }

    #[test]
    fn open_clears_status_and_marker() {
        let mut h = Harness::new(1000, 5000);
        h.status.set_text("stale");
        h.info.add_class("xconn");

        h.connect();
        assert_eq!(h.client.state(), WsState::Connecting);
        h.open();

        assert_eq!(h.client.state(), WsState::Connected);
        assert!(h.client.is_connected());
        assert_eq!(h.status.text(), "");
        assert_eq!(h.info.class_name(), "info");
    }

    #[test]
    fn open_shows_connected_message() {
        let mut h = Harness::with_config(ConnectionConfig {
            connected_message: Some("live".into()),
            ..ConnectionConfig::new("ws://localhost/ws")
        });
        h.connect();
        h.open();
        assert_eq!(h.status.text(), "live");
        assert!(!h.info.has_class("xconn"));
    }

    #[test]
    fn quick_reconnect_never_degrades() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();

        h.advance(1000);
        assert_eq!(h.opens, vec![0, 1000]);
        h.open();

        h.advance(10_000);
        assert!(!h.degraded_ui());
        assert!(!h.client.is_degraded());
        assert!(h.timers.is_empty());
    }

    /// Collects the field names of every event
    #[derive(Default)]
    struct FieldNames(std::sync::Mutex<Vec<Vec<String>>>);

    struct NameVisitor<'a>(&'a mut Vec<String>);

    impl tracing::field::Visit for NameVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, _: &dyn std::fmt::Debug) {
            self.0.push(field.name().to_string());
        }
    }

    impl tracing::Subscriber for FieldNames {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }
        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            let mut names = Vec::new();
            event.record(&mut NameVisitor(&mut names));
            self.0.lock().unwrap().push(names);
        }
        fn enter(&self, _: &tracing::span::Id) {}
        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn degraded_event_has_single_message() {
        let fields = std::sync::Arc::new(FieldNames::default());
        tracing::subscriber::with_default(fields.clone(), || {
            let mut h = Harness::new(1000, 5000);
            h.connect();
            h.close();
            h.advance(5000);
            assert!(h.degraded_ui());
        });

        let events = fields.0.lock().unwrap();
        let degraded = events
            .iter()
            .find(|names| names.iter().any(|n| n == "disconnected_message"))
            .expect("degraded event logged");
        assert_eq!(degraded.iter().filter(|n| *n == "message").count(), 1);
    }

    #[test]
    fn long_outage_shows_degraded_status() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();

        // reconnect at 1000 hangs without open or close
        h.advance(4999);
        assert!(!h.degraded_ui());
        h.advance(1);
        assert!(h.degraded_ui());
        assert_eq!(h.status.text(), DOWN);
        assert_eq!(h.info.class_name(), "info xconn");
        assert!(h.client.is_degraded());
    }

    #[test]
    fn degraded_status_cleared_on_reconnect() {
        let mut h = Harness::new(1000, 2000);
        h.connect();
        h.open();
        h.close();
        h.advance(1000);
        h.close();
        h.advance(1000);
        assert!(h.degraded_ui());

        h.open();
        assert_eq!(h.status.text(), "");
        assert_eq!(h.info.class_name(), "info");
        assert!(!h.client.is_degraded());
    }

    #[test]
    fn one_reconnect_per_close() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();
        assert_eq!(h.pending(TimerKind::Reconnect).len(), 1);

        h.advance(999);
        assert_eq!(h.opens.len(), 1);
        h.advance(1);
        assert_eq!(h.opens, vec![0, 1000]);

        // no further close, no further attempt
        h.advance(20_000);
        assert_eq!(h.opens.len(), 2);
        assert_eq!(h.client.attempts(), 2);
    }

    #[test]
    fn duplicate_close_schedules_once() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();
        h.close();
        assert_eq!(h.pending(TimerKind::Reconnect).len(), 1);
        assert_eq!(h.pending(TimerKind::ErrorReport).len(), 1);
    }

    #[test]
    fn failed_reconnects_do_not_rearm_error_report() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();

        for _ in 0..4 {
            h.advance(1000);
            assert_eq!(h.opens.last(), Some(&h.now));
            h.close();
            assert_eq!(h.pending(TimerKind::ErrorReport).len(), 1);
            assert_eq!(h.pending(TimerKind::ErrorReport)[0].0, 5000);
        }

        assert_eq!(h.now, 4000);
        h.advance(999);
        assert!(!h.degraded_ui());
        h.advance(1);
        assert!(h.degraded_ui());
        // the 5000ms reconnect still goes out
        assert_eq!(h.opens, vec![0, 1000, 2000, 3000, 4000, 5000]);
    }

    #[test]
    fn error_report_can_precede_reconnect() {
        let mut h = Harness::new(1000, 500);
        h.connect();
        h.open();
        h.close();

        h.advance(500);
        assert!(h.degraded_ui());
        assert_eq!(h.opens.len(), 1);
        h.advance(500);
        assert_eq!(h.opens.len(), 2);
    }

    #[test]
    fn failed_first_connect_retries() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.close();
        assert_eq!(h.client.state(), WsState::Disconnected);
        h.advance(1000);
        assert_eq!(h.opens, vec![0, 1000]);
        assert_eq!(h.client.state(), WsState::Connecting);
    }

    #[test]
    fn stale_error_timer_from_previous_outage_ignored() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();
        let (_, first_report) = h.pending(TimerKind::ErrorReport)[0];

        h.advance(1000);
        h.open();
        assert!(h.pending(TimerKind::ErrorReport).is_empty());
        h.close();

        // the cancelled report fires anyway (driver raced the cancel)
        let c = h.client.on_timer(first_report);
        assert!(c.is_empty());
        assert!(!h.degraded_ui());

        h.advance(4999);
        assert!(!h.degraded_ui());
        h.advance(1);
        assert!(h.degraded_ui());
    }

    #[test]
    fn message_replaces_info_content() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.info.set_inner_html("<p>old</p>");
        h.client.on_message("<ul><li>report.pdf</li></ul>");
        assert_eq!(h.info.text(), "<ul><li>report.pdf</li></ul>");
        assert_eq!(h.info.class_name(), "info");
    }

    #[test]
    fn message_while_disconnected_ignored() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.client.on_message("early");
        assert_eq!(h.info.text(), "");
    }

    #[test]
    fn shutdown_cancels_timers() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();
        assert_eq!(h.timers.len(), 2);

        let c = h.client.shutdown();
        assert!(!c.contains(&Command::Close));
        h.apply(c);
        assert!(h.timers.is_empty());
        assert_eq!(h.client.state(), WsState::Closed);

        h.advance(60_000);
        assert_eq!(h.opens.len(), 1);
        assert!(!h.degraded_ui());
        assert!(h.client.connect().is_empty());
        assert!(h.client.on_close().is_empty());
    }

    #[test]
    fn shutdown_closes_live_socket() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        let c = h.client.shutdown();
        assert_eq!(c, vec![Command::Close]);
        assert!(h.client.shutdown().is_empty());
    }

    #[test]
    fn open_after_shutdown_closes_socket() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        let c = h.client.shutdown();
        h.apply(c);
        assert_eq!(h.closes, 1);
        assert_eq!(h.client.on_open(), vec![Command::Close]);
        assert!(!h.client.is_connected());
    }

    #[test]
    fn manual_connect_cancels_pending_reconnect() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        h.close();
        h.advance(200);
        h.connect();
        assert_eq!(h.opens, vec![0, 200]);
        assert!(h.pending(TimerKind::Reconnect).is_empty());
        h.advance(2000);
        assert_eq!(h.opens.len(), 2);
    }

    #[test]
    fn outage_tracked_until_open() {
        let mut h = Harness::new(1000, 5000);
        h.connect();
        h.open();
        assert!(h.client.outage_millis().is_none());
        h.close();
        assert!(h.client.outage_millis().is_some());
        h.advance(1000);
        h.open();
        assert!(h.client.outage_millis().is_none());
    }
}
