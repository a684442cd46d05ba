//! Client task.
//!
//! One task per [`crate::ChatClient`] owns the session, the transport and
//! the reconnection controller. Caller commands, inbound bytes, dial
//! completion and timer expiry are arms of a single `select!`, so every
//! state change happens in one place and in order: a command the session
//! issues in response to a line is written before the next read.

use std::{future, sync::Arc};

use kst_core::{
    ChatEvent, Credentials, Environment, ErrorKind, ReconnectController, Session, SessionAction,
    SessionInput,
};
use kst_proto::{Locator, Room};
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    config::ClientConfig,
    error::ClientError,
    notify::NotificationSink,
    transport::{self, Transport},
};

/// Messages from the handle to the task.
#[derive(Debug)]
pub(crate) enum ClientCommand {
    Connect { credentials: Credentials, room: Room, grid: Option<Locator> },
    Disconnect,
    SendText(String),
    SetGrid(Locator),
    RefreshUsers,
    LoadHistory,
    Shutdown,
}

/// Connection state owned by the task.
#[derive(Debug, Default)]
enum Link {
    #[default]
    Idle,
    Dialing(JoinHandle<Result<TcpStream, ClientError>>),
    Open(Transport),
}

/// Something the transport did.
enum LinkEvent {
    Dialed(Result<TcpStream, ClientError>),
    Read(std::io::Result<Vec<u8>>),
}

/// Why the loop woke up.
enum Wake {
    Command(Option<ClientCommand>),
    Link(LinkEvent),
    Timer,
}

pub(crate) struct ClientTask<E: Environment> {
    env: E,
    config: ClientConfig,
    events: broadcast::Sender<ChatEvent>,
    sink: Option<Arc<dyn NotificationSink>>,
    grid: Option<Locator>,
    session: Option<Session<E::Instant>>,
    link: Link,
    reconnect: ReconnectController<E::Instant>,
}

impl<E: Environment> ClientTask<E> {
    pub(crate) fn new(
        env: E,
        config: ClientConfig,
        events: broadcast::Sender<ChatEvent>,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Self {
        let reconnect = ReconnectController::new(config.backoff);
        Self {
            env,
            config,
            events,
            sink,
            grid: None,
            session: None,
            link: Link::Idle,
            reconnect,
        }
    }

    /// Run until shut down or every handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ClientCommand>) {
        loop {
            let deadline = self.next_deadline();
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                event = poll_link(&mut self.link) => Wake::Link(event),
                () = wait_until(&self.env, deadline) => Wake::Timer,
            };

            match wake {
                Wake::Command(None | Some(ClientCommand::Shutdown)) => break,
                Wake::Command(Some(command)) => self.on_command(command).await,
                Wake::Link(LinkEvent::Dialed(result)) => self.on_dialed(result),
                Wake::Link(LinkEvent::Read(result)) => self.on_read(result).await,
                Wake::Timer => self.on_timer().await,
            }
        }

        self.disconnect();
        tracing::debug!("client task stopped");
    }

    fn next_deadline(&self) -> Option<E::Instant> {
        let session = self.session.as_ref().and_then(Session::next_deadline);
        [session, self.reconnect.deadline()].into_iter().flatten().min()
    }

    async fn on_command(&mut self, command: ClientCommand) {
        let now = self.env.now();
        match command {
            ClientCommand::Connect { credentials, room, grid } => {
                self.disconnect();
                if grid.is_some() {
                    self.grid = grid;
                }
                match Session::new(
                    self.config.session.clone(),
                    credentials,
                    room,
                    self.grid.clone(),
                ) {
                    Ok(session) => {
                        self.session = Some(session);
                        self.start_dial();
                    },
                    Err(e) => self.raise(ErrorKind::Transport, e.to_string()),
                }
            },
            ClientCommand::Disconnect => self.disconnect(),
            ClientCommand::SendText(text) => {
                self.user_input(SessionInput::SendText { text, now }).await;
            },
            ClientCommand::SetGrid(grid) => {
                self.grid = Some(grid.clone());
                if self.session.is_some() {
                    self.user_input(SessionInput::SetGrid { grid, now }).await;
                }
            },
            ClientCommand::RefreshUsers => {
                self.user_input(SessionInput::RefreshUsers { now }).await;
            },
            ClientCommand::LoadHistory => {
                self.user_input(SessionInput::LoadHistory { now }).await;
            },
            ClientCommand::Shutdown => {},
        }
    }

    /// Feed a user intent; rejections surface as send errors.
    async fn user_input(&mut self, input: SessionInput<E::Instant>) {
        let Some(session) = self.session.as_mut() else {
            self.raise(ErrorKind::Send, "not connected".to_string());
            return;
        };
        match session.handle(input) {
            Ok(actions) => self.execute(actions).await,
            Err(e) => self.raise(ErrorKind::Send, e.to_string()),
        }
    }

    fn start_dial(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.begin_connect() {
            tracing::warn!("cannot dial: {e}");
            return;
        }

        tracing::info!(server = %self.config.server, "connecting");
        let handle = tokio::spawn(transport::dial(
            self.config.server.clone(),
            self.config.connect_timeout,
            self.config.keepalive,
        ));
        self.link = Link::Dialing(handle);
    }

    fn on_dialed(&mut self, result: Result<TcpStream, ClientError>) {
        match result {
            Ok(stream) => {
                self.link = Link::Open(Transport::new(stream));
                let now = self.env.now();
                if let Some(session) = self.session.as_mut()
                    && let Err(e) = session.handle(SessionInput::TransportReady { now })
                {
                    tracing::warn!("transport ready rejected: {e}");
                }
            },
            Err(e) => {
                self.link = Link::Idle;
                self.transport_failed(&e.to_string());
            },
        }
    }

    async fn on_read(&mut self, result: std::io::Result<Vec<u8>>) {
        let data = match result {
            Ok(data) if data.is_empty() => {
                self.transport_failed("connection closed by server");
                return;
            },
            Ok(data) => data,
            Err(e) => {
                self.transport_failed(&e.to_string());
                return;
            },
        };

        let now = self.env.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.handle(SessionInput::Received { data, now }) {
            Ok(actions) => self.execute(actions).await,
            Err(e) => tracing::debug!("inbound data rejected: {e}"),
        }
    }

    async fn on_timer(&mut self) {
        let now = self.env.now();
        if self.reconnect.poll(now) {
            tracing::info!(attempt = self.reconnect.attempts(), "reconnecting");
            self.start_dial();
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.handle(SessionInput::Tick { now }) {
            Ok(actions) => self.execute(actions).await,
            Err(e) => tracing::debug!("tick rejected: {e}"),
        }
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Transmit(line) => self.transmit(line).await,
                SessionAction::Emit(ChatEvent::ConnectionStateChanged { connected: true }) => {
                    self.emit(ChatEvent::ConnectionStateChanged { connected: true });
                    if self.reconnect.on_login_complete() {
                        tracing::info!("reconnected");
                        if let Some(sink) = &self.sink {
                            sink.notify_reconnected();
                        }
                        self.emit(ChatEvent::Reconnected);
                    }
                },
                SessionAction::Emit(event) => self.emit(event),
                SessionAction::Notify(message) => {
                    if let Some(sink) = &self.sink {
                        sink.notify(&message);
                    }
                },
                SessionAction::Close { reason } => {
                    tracing::info!(%reason, "closing connection");
                    self.link = Link::Idle;
                    self.reconnect.reset();
                },
            }
        }
    }

    async fn transmit(&mut self, line: String) {
        let Link::Open(transport) = &mut self.link else {
            tracing::debug!("no transport, dropping outbound line");
            return;
        };
        if let Err(e) = transport.send_line(line).await {
            tracing::warn!("send failed: {e}");
            self.raise(ErrorKind::Send, e.to_string());
        }
    }

    /// Transport lost without being asked to.
    fn transport_failed(&mut self, reason: &str) {
        let was_connected = self.session.as_ref().is_some_and(Session::is_connected);
        self.link = Link::Idle;
        if let Some(session) = self.session.as_mut() {
            session.close();
        }

        tracing::warn!(%reason, "transport failed");
        self.raise(ErrorKind::Transport, reason.to_string());
        if was_connected {
            self.emit(ChatEvent::ConnectionStateChanged { connected: false });
        }

        let now = self.env.now();
        let has_credentials = self.session.as_ref().is_some_and(|s| {
            let credentials = s.credentials();
            !credentials.username.is_empty() && !credentials.password.is_empty()
        });
        match self.reconnect.on_transport_failure(now, has_credentials) {
            Some(delay) => tracing::info!(?delay, "reconnect scheduled"),
            None => tracing::warn!("not reconnecting"),
        }
    }

    /// Drop the connection on request. Idempotent.
    fn disconnect(&mut self) {
        if let Link::Dialing(handle) = &self.link {
            handle.abort();
        }
        self.link = Link::Idle;
        self.reconnect.reset();

        let was_connected = self.session.as_ref().is_some_and(Session::is_connected);
        if let Some(session) = self.session.as_mut() {
            session.close();
        }
        if was_connected {
            tracing::info!("disconnected");
            self.emit(ChatEvent::ConnectionStateChanged { connected: false });
        }
    }

    fn raise(&self, kind: ErrorKind, message: String) {
        self.emit(ChatEvent::ErrorRaised { kind, message });
    }

    /// Best-effort: no subscribers is not an error.
    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }
}

/// Resolves when the dial finishes or data arrives; pends while idle.
async fn poll_link(link: &mut Link) -> LinkEvent {
    match link {
        Link::Idle => future::pending().await,
        Link::Dialing(handle) => {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ClientError::Io(std::io::Error::other(e))),
            };
            // Keep the finished handle from being polled again
            *link = Link::Idle;
            LinkEvent::Dialed(result)
        },
        Link::Open(transport) => LinkEvent::Read(transport.read_chunk().await),
    }
}

async fn wait_until<E: Environment>(env: &E, deadline: Option<E::Instant>) {
    match deadline {
        Some(at) => env.sleep_until(at).await,
        None => future::pending().await,
    }
}
