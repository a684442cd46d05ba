//! Caller-facing handle.

use std::sync::Arc;

use kst_core::{ChatEvent, Credentials, Environment};
use kst_proto::{Locator, PendingCommand, Room};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    config::ClientConfig,
    credentials::CredentialStore,
    error::ClientError,
    notify::NotificationSink,
    runtime::{ClientCommand, ClientTask},
};

/// Broadcast event stream handed to subscribers.
pub type EventStream = broadcast::Receiver<ChatEvent>;

/// Handle to a running chat client.
///
/// Every operation enqueues a command for the client task and returns at
/// once; outcomes arrive on the [`EventStream`]. Input that fails local
/// validation is rejected here and never reaches the task. Cloning the
/// handle shares the same client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    commands: mpsc::UnboundedSender<ClientCommand>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatClient {
    /// Spawn a client task on the current tokio runtime.
    pub fn spawn<E: Environment>(env: E, config: ClientConfig) -> (Self, JoinHandle<()>) {
        Self::spawn_with_sink(env, config, None)
    }

    /// Spawn a client task that reports live messages to `sink`.
    pub fn spawn_with_sink<E: Environment>(
        env: E,
        config: ClientConfig,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));

        let task = ClientTask::new(env, config, event_tx.clone(), sink);
        let handle = tokio::spawn(task.run(command_rx));

        (Self { commands: command_tx, events: event_tx }, handle)
    }

    /// Subscribe to client events.
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Connect and log in, replacing any existing connection.
    ///
    /// A `grid` of `None` keeps the grid set earlier, if any.
    pub fn connect(
        &self,
        credentials: Credentials,
        room: Room,
        grid: Option<Locator>,
    ) -> Result<(), ClientError> {
        if let Some(grid) = &grid {
            PendingCommand::set_grid(grid)?;
        }
        self.send(ClientCommand::Connect { credentials, room, grid })
    }

    /// Connect with credentials loaded from `store`.
    pub fn connect_with_store(
        &self,
        store: &dyn CredentialStore,
        room: Room,
        grid: Option<Locator>,
    ) -> Result<(), ClientError> {
        let credentials = store.load()?.ok_or(ClientError::MissingCredentials)?;
        self.connect(credentials, room, grid)
    }

    /// Drop the connection and cancel any pending reconnection.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::Disconnect)
    }

    /// Send a chat line or server command.
    ///
    /// Empty text and `/chat` are rejected locally.
    pub fn send_text(&self, text: &str) -> Result<(), ClientError> {
        PendingCommand::user_text(text)?;
        self.send(ClientCommand::SendText(text.to_string()))
    }

    /// Change the announced grid square.
    ///
    /// Parsed strictly; returns the normalized locator.
    pub fn set_grid(&self, grid: &str) -> Result<Locator, ClientError> {
        let locator: Locator = grid.parse()?;
        self.send(ClientCommand::SetGrid(locator.clone()))?;
        Ok(locator)
    }

    /// Ask for a fresh user list.
    pub fn refresh_users(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::RefreshUsers)
    }

    /// Ask for the room history.
    pub fn load_history(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::LoadHistory)
    }

    /// Stop the client task. Further calls fail with [`ClientError::Closed`].
    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::Shutdown)
    }

    fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}
