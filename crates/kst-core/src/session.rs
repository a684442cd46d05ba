//! Session state machine.
//!
//! Drives one telnet login and the command traffic that follows. Uses the
//! action pattern: [`Session::handle`] takes an input (with the current time)
//! and returns actions for the driver to execute. No I/O happens here.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ connect ┌────────────┐ ready ┌─────────────────────┐
//! │ Disconnected │────────>│ Connecting │──────>│ AwaitingLoginPrompt │
//! └──────────────┘         └────────────┘       └─────────────────────┘
//!        ^                                          │ Login: / timeout
//!        │ auth error                               ↓
//!        │                 ┌─────────────────────────────┐
//!        ├─────────────────│ AuthenticatingUsername      │
//!        │                 └─────────────────────────────┘
//!        │                                          │ Password:
//!        │                 ┌─────────────────────────────┐
//!        ├─────────────────│ AuthenticatingPassword      │
//!        │                 └─────────────────────────────┘
//!        │                                          │ Your choice :
//!        │                 ┌───────────────┐  echo  ┌───────────┐
//!        └─────────────────│ SelectingRoom │───────>│ Connected │
//!                          └───────────────┘        └───────────┘
//! ```
//!
//! # Timers
//!
//! - login prompt: if `Login:` never shows up, the username is sent anyway
//! - user list timeout: rows of a slow `/sh us` are applied early; after a
//!   second period without an echo the command is given up
//! - user list refresh: `/sh us` is re-issued after each completed listing

use std::{fmt, time::Duration};

use kst_proto::{
    AuthErrorKind, ChatMessage, ChatTime, CommandKind, DEFAULT_HISTORY_COUNT, LineClassifier,
    LineEvent, LineFramer, Locator, PendingCommand, Room, UserRecord, parse_chat_message,
    parse_user_record,
};

use crate::{
    channel::{CommandChannel, CompletedCommand, Dispatch},
    env::{Moment, earliest},
    error::SessionError,
    event::{ChatEvent, ErrorKind, SessionAction, SessionInput},
    log::{DEFAULT_MESSAGE_CAPACITY, MessageLog, sort_history},
    roster::Roster,
};

/// How long to wait for `Login:` before sending the username anyway.
pub const DEFAULT_LOGIN_PROMPT_TIMEOUT: Duration = Duration::from_secs(3);

/// Interval between automatic user-list refreshes.
pub const DEFAULT_USERS_REFRESH_INTERVAL: Duration = Duration::from_secs(180);

/// How long a `/sh us` may stay unanswered before its partial rows are
/// applied. After the same period again the command is abandoned.
pub const DEFAULT_USERS_TIMEOUT: Duration = Duration::from_secs(5);

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No transport
    Disconnected,
    /// Dialing
    Connecting,
    /// Transport up, waiting for `Login:`
    AwaitingLoginPrompt,
    /// Username sent
    AuthenticatingUsername,
    /// Password sent
    AuthenticatingPassword,
    /// Room index sent, waiting for the first echo
    SelectingRoom,
    /// Logged in
    Connected,
}

impl SessionPhase {
    /// Whether the login exchange is in progress.
    pub fn is_authenticating(self) -> bool {
        matches!(
            self,
            Self::AuthenticatingUsername | Self::AuthenticatingPassword | Self::SelectingRoom
        )
    }
}

/// Login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Callsign used as username
    pub username: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Credentials with the username normalized to uppercase.
    pub fn new(username: &str, password: impl Into<String>) -> Self {
        Self { username: username.trim().to_ascii_uppercase(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait for `Login:` before sending the username unprompted
    pub login_prompt_timeout: Duration,
    /// Re-issue `/sh us` this long after each completed listing
    pub users_refresh_interval: Duration,
    /// Close an unanswered `/sh us` after this long
    pub users_timeout: Duration,
    /// Request room history right after login
    pub history_on_login: bool,
    /// Entries requested by `/show msg`
    pub history_count: u16,
    /// Messages kept in the log
    pub message_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_prompt_timeout: DEFAULT_LOGIN_PROMPT_TIMEOUT,
            users_refresh_interval: DEFAULT_USERS_REFRESH_INTERVAL,
            users_timeout: DEFAULT_USERS_TIMEOUT,
            history_on_login: true,
            history_count: DEFAULT_HISTORY_COUNT,
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timers<I> {
    login_prompt: Option<I>,
    users_timeout: Option<I>,
    users_refresh: Option<I>,
    /// The user list timed out once and is still owed its echo.
    users_overdue: bool,
}

impl<I> Timers<I> {
    fn cleared() -> Self {
        Self { login_prompt: None, users_timeout: None, users_refresh: None, users_overdue: false }
    }
}

/// Session state machine
///
/// Roster and message log live here too so that every update and the event
/// announcing it come from the same place. Everything but credentials, room
/// and grid is torn down by [`Session::close`], so each connection starts
/// from a clean slate.
///
/// Generic over `I` (Instant type) for deterministic testing.
#[derive(Debug)]
pub struct Session<I> {
    phase: SessionPhase,
    config: SessionConfig,
    credentials: Credentials,
    room: Room,
    grid: Option<Locator>,
    classifier: LineClassifier,
    framer: LineFramer,
    commands: CommandChannel,
    roster: Roster,
    log: MessageLog,
    timers: Timers<I>,
}

impl<I: Moment> Session<I> {
    /// Create a session in [`SessionPhase::Disconnected`].
    pub fn new(
        config: SessionConfig,
        credentials: Credentials,
        room: Room,
        grid: Option<Locator>,
    ) -> Result<Self, SessionError> {
        let classifier = LineClassifier::new(&credentials.username, room.name())?;
        let log = MessageLog::new(config.message_capacity);

        Ok(Self {
            phase: SessionPhase::Disconnected,
            config,
            credentials,
            room,
            grid,
            classifier,
            framer: LineFramer::new(),
            commands: CommandChannel::new(),
            roster: Roster::new(),
            log,
            timers: Timers::cleared(),
        })
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether login has completed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase == SessionPhase::Connected
    }

    /// Credentials this session logs in with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Room this session joins.
    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Grid announced after login.
    pub fn grid(&self) -> Option<&Locator> {
        self.grid.as_ref()
    }

    /// Current roster.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Current message log.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Outbound command state.
    pub fn commands(&self) -> &CommandChannel {
        &self.commands
    }

    /// Earliest pending timer, for the driver to sleep towards.
    pub fn next_deadline(&self) -> Option<I> {
        earliest([self.timers.login_prompt, self.timers.users_timeout, self.timers.users_refresh])
    }

    /// Dialing started.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is disconnected.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Disconnected {
            return Err(self.invalid("connect"));
        }
        self.phase = SessionPhase::Connecting;
        Ok(())
    }

    /// Transport gone. Drops commands, timers, partial input, roster and log.
    ///
    /// Credentials, room and grid are kept for the next [`Session::begin_connect`].
    pub fn close(&mut self) {
        let dropped = self.commands.abandon();
        if dropped > 0 {
            tracing::debug!(dropped, "abandoned outstanding commands");
        }
        self.framer.clear();
        self.roster.clear();
        self.log.clear();
        self.timers = Timers::cleared();
        self.phase = SessionPhase::Disconnected;
    }

    /// Process one input and return the actions it causes.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the input makes no sense in the current phase
    /// - `NotConnected` for user commands before login
    /// - `Protocol` for text or grids rejected by local validation
    pub fn handle(&mut self, input: SessionInput<I>) -> Result<Vec<SessionAction>, SessionError> {
        let mut actions = Vec::new();
        match input {
            SessionInput::TransportReady { now } => self.on_ready(now)?,
            SessionInput::Received { data, now } => self.on_received(&data, now, &mut actions)?,
            SessionInput::Tick { now } => self.on_tick(now, &mut actions),
            SessionInput::SendText { text, now } => {
                self.require_connected()?;
                let command = PendingCommand::user_text(&text)?;
                self.submit(command, now, &mut actions);
            },
            SessionInput::SetGrid { grid, now } => {
                let command = PendingCommand::set_grid(&grid)?;
                self.grid = Some(grid);
                if self.is_connected() {
                    self.submit(command, now, &mut actions);
                }
            },
            SessionInput::RefreshUsers { now } => {
                self.require_connected()?;
                self.request_users(now, &mut actions);
            },
            SessionInput::LoadHistory { now } => {
                self.require_connected()?;
                self.request_history(now, &mut actions);
            },
        }
        Ok(actions)
    }

    fn on_ready(&mut self, now: I) -> Result<(), SessionError> {
        if !matches!(self.phase, SessionPhase::Connecting | SessionPhase::Disconnected) {
            return Err(self.invalid("accept transport"));
        }
        self.framer.clear();
        self.phase = SessionPhase::AwaitingLoginPrompt;
        self.timers.login_prompt = Some(now + self.config.login_prompt_timeout);
        tracing::debug!("transport ready, awaiting login prompt");
        Ok(())
    }

    fn on_received(
        &mut self,
        data: &[u8],
        now: I,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), SessionError> {
        if matches!(self.phase, SessionPhase::Disconnected | SessionPhase::Connecting) {
            return Err(self.invalid("receive data"));
        }

        for line in self.framer.feed(data) {
            self.process_line(&line, now, actions);
            if self.phase == SessionPhase::Disconnected {
                return Ok(());
            }
        }

        // Prompts arrive without a terminator
        if let Some(tail) = self.framer.pending() {
            let event = self.classifier.classify(&tail, self.commands.active_kind());
            if event.is_prompt() {
                self.framer.take_pending();
                self.process_event(event, &tail, now, actions);
            }
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str, now: I, actions: &mut Vec<SessionAction>) {
        let event = self.classifier.classify(line, self.commands.active_kind());
        self.process_event(event, line, now, actions);
    }

    fn process_event(
        &mut self,
        event: LineEvent,
        line: &str,
        now: I,
        actions: &mut Vec<SessionAction>,
    ) {
        match event {
            LineEvent::LoginPrompt => match self.phase {
                SessionPhase::AwaitingLoginPrompt | SessionPhase::AuthenticatingUsername => {
                    self.send_username(now, actions);
                },
                _ => self.absorb(line),
            },
            LineEvent::PasswordPrompt => match self.phase {
                SessionPhase::AuthenticatingUsername | SessionPhase::AuthenticatingPassword => {
                    let password = PendingCommand::login(self.credentials.password.clone());
                    self.submit(password, now, actions);
                    self.phase = SessionPhase::AuthenticatingPassword;
                    tracing::debug!("password sent");
                },
                _ => self.absorb(line),
            },
            LineEvent::RoomPrompt => {
                if self.phase.is_authenticating() {
                    let index = PendingCommand::login(self.room.index().to_string());
                    self.submit(index, now, actions);
                    self.phase = SessionPhase::SelectingRoom;
                    tracing::debug!(room = self.room.index(), "room selected");
                } else {
                    self.absorb(line);
                }
            },
            LineEvent::AuthError(kind) => {
                if self.phase.is_authenticating() {
                    self.fail_login(kind, actions);
                } else {
                    self.absorb(line);
                }
            },
            LineEvent::CommandEcho { time } => match self.phase {
                SessionPhase::AuthenticatingPassword | SessionPhase::SelectingRoom => {
                    self.complete_login(time, now, actions);
                },
                SessionPhase::Connected => self.complete_active(time, now, actions),
                _ => tracing::trace!("echo before login ignored"),
            },
            LineEvent::ChatLine { time, sender, body } => {
                let live = self.is_connected()
                    && self.commands.active_kind() != Some(CommandKind::ShowMessages);
                if live {
                    self.append_live(time, sender, body, actions);
                } else {
                    self.absorb(line);
                }
            },
            LineEvent::UserRecordLine(record) => {
                if self.is_connected() {
                    self.upsert_user(record, actions);
                }
            },
            LineEvent::CommandOutput(text) => self.absorb(&text),
            LineEvent::Unrecognized(text) => tracing::trace!(line = %text, "unrecognized line"),
        }
    }

    fn send_username(&mut self, now: I, actions: &mut Vec<SessionAction>) {
        self.timers.login_prompt = None;
        let username = PendingCommand::login(self.credentials.username.clone());
        self.submit(username, now, actions);
        self.phase = SessionPhase::AuthenticatingUsername;
        tracing::debug!(username = %self.credentials.username, "username sent");
    }

    fn fail_login(&mut self, kind: AuthErrorKind, actions: &mut Vec<SessionAction>) {
        tracing::warn!(%kind, "login refused");
        let message = format!("login refused: {kind}");
        actions.push(SessionAction::Emit(ChatEvent::ErrorRaised {
            kind: ErrorKind::Auth,
            message: message.clone(),
        }));
        actions.push(SessionAction::Close { reason: message });
        self.close();
    }

    fn complete_login(&mut self, time: ChatTime, now: I, actions: &mut Vec<SessionAction>) {
        self.timers.login_prompt = None;
        if let Some(done) = self.commands.complete() {
            self.finalize(done.finished, time, now, actions);
        }
        self.phase = SessionPhase::Connected;
        tracing::info!(room = %self.room, "logged in");
        actions.push(SessionAction::Emit(ChatEvent::ConnectionStateChanged { connected: true }));

        if let Some(command) =
            self.grid.as_ref().and_then(|grid| PendingCommand::set_grid(grid).ok())
        {
            self.submit(command, now, actions);
        }
        self.request_users(now, actions);
        if self.config.history_on_login {
            self.request_history(now, actions);
        }
    }

    fn complete_active(&mut self, time: ChatTime, now: I, actions: &mut Vec<SessionAction>) {
        let Some(done) = self.commands.complete() else {
            tracing::trace!("echo with no active command");
            return;
        };
        self.finalize(done.finished, time, now, actions);
        if let Some(next) = done.next {
            self.transmit(next, now, actions);
        }
    }

    fn finalize(
        &mut self,
        done: CompletedCommand,
        time: ChatTime,
        now: I,
        actions: &mut Vec<SessionAction>,
    ) {
        match done.command.kind() {
            CommandKind::ShowUsers => {
                self.timers.users_timeout = None;
                self.timers.users_overdue = false;
                let records: Vec<UserRecord> =
                    done.lines.iter().filter_map(|l| parse_user_record(l)).collect();
                self.replace_roster(records, actions);
                self.timers.users_refresh = Some(now + self.config.users_refresh_interval);
            },
            CommandKind::ShowMessages => {
                let mut batch: Vec<ChatMessage> =
                    done.lines.iter().filter_map(|l| parse_chat_message(l)).collect();
                if batch.is_empty() {
                    return;
                }
                sort_history(&mut batch);
                tracing::debug!(count = batch.len(), "history loaded");
                self.log.prepend(batch.clone());
                actions.push(SessionAction::Emit(ChatEvent::HistoryLoaded(batch)));
            },
            CommandKind::Login | CommandKind::UserCommand | CommandKind::SetGrid => {
                if done.lines.is_empty() {
                    return;
                }
                let message = ChatMessage::system(time, done.lines.join("\n"));
                self.log.append(message.clone());
                actions.push(SessionAction::Emit(ChatEvent::MessageAppended(message)));
            },
        }
    }

    fn append_live(
        &mut self,
        time: ChatTime,
        sender: String,
        body: String,
        actions: &mut Vec<SessionAction>,
    ) {
        let callsign = sender.split_whitespace().next().unwrap_or_default();
        let grid = self.roster.grid_of(callsign);
        let message = ChatMessage::new(time, sender, body, grid);

        self.log.append(message.clone());
        // Sink sees a message before subscribers do
        actions.push(SessionAction::Notify(message.clone()));
        actions.push(SessionAction::Emit(ChatEvent::MessageAppended(message)));
    }

    fn upsert_user(&mut self, record: UserRecord, actions: &mut Vec<SessionAction>) {
        if self.roster.upsert(record.clone()) {
            tracing::debug!(callsign = record.callsign(), "user joined");
            actions.push(SessionAction::Emit(ChatEvent::UserUpserted(record)));
        }
    }

    fn replace_roster(&mut self, records: Vec<UserRecord>, actions: &mut Vec<SessionAction>) {
        self.roster.replace(records);
        tracing::debug!(users = self.roster.len(), "roster replaced");
        actions.push(SessionAction::Emit(ChatEvent::RosterReplaced(self.roster.snapshot())));
    }

    fn on_tick(&mut self, now: I, actions: &mut Vec<SessionAction>) {
        if due(self.timers.login_prompt, now) {
            self.timers.login_prompt = None;
            if self.phase == SessionPhase::AwaitingLoginPrompt {
                tracing::debug!("no login prompt, sending username unprompted");
                self.send_username(now, actions);
            }
        }

        if due(self.timers.users_timeout, now) {
            self.timers.users_timeout = None;
            self.expire_user_list(now, actions);
        }

        if due(self.timers.users_refresh, now) {
            self.timers.users_refresh = None;
            if self.is_connected() {
                self.request_users(now, actions);
            }
        }
    }

    /// Apply the rows of a slow `/sh us`, or give it up on the second expiry.
    ///
    /// The first expiry keeps the command active: the server answers in
    /// order, so its echo still has to close `/sh us` and not whatever is
    /// queued behind it.
    fn expire_user_list(&mut self, now: I, actions: &mut Vec<SessionAction>) {
        if self.commands.active_kind() != Some(CommandKind::ShowUsers) {
            self.timers.users_overdue = false;
            return;
        }

        let records: Vec<UserRecord> =
            self.commands.lines().iter().filter_map(|l| parse_user_record(l)).collect();
        let partial = records.len();
        if partial > 0 {
            self.replace_roster(records, actions);
        }

        if !self.timers.users_overdue {
            tracing::warn!(partial, "user list slow, waiting for echo");
            self.timers.users_overdue = true;
            self.timers.users_timeout = Some(now + self.config.users_timeout);
            return;
        }

        tracing::warn!("user list never finished, giving up");
        self.timers.users_overdue = false;
        self.timers.users_refresh = Some(now + self.config.users_refresh_interval);
        if let Some(done) = self.commands.complete()
            && let Some(next) = done.next
        {
            self.transmit(next, now, actions);
        }
    }

    fn request_users(&mut self, now: I, actions: &mut Vec<SessionAction>) {
        if self.commands.is_pending(CommandKind::ShowUsers) {
            return;
        }
        self.submit(PendingCommand::show_users(), now, actions);
    }

    fn request_history(&mut self, now: I, actions: &mut Vec<SessionAction>) {
        if self.commands.is_pending(CommandKind::ShowMessages) {
            return;
        }
        self.submit(PendingCommand::show_messages(self.config.history_count), now, actions);
    }

    fn submit(&mut self, command: PendingCommand, now: I, actions: &mut Vec<SessionAction>) {
        match self.commands.submit(command) {
            Dispatch::Transmit(command) => self.transmit(command, now, actions),
            Dispatch::Queued { position } => tracing::trace!(position, "command queued"),
        }
    }

    fn transmit(&mut self, command: PendingCommand, now: I, actions: &mut Vec<SessionAction>) {
        if command.kind() == CommandKind::ShowUsers {
            self.timers.users_timeout = Some(now + self.config.users_timeout);
        }
        tracing::trace!(?command, "transmit");
        actions.push(SessionAction::Transmit(command.into_payload()));
    }

    /// Attribute a line to the active command, if there is one.
    fn absorb(&mut self, line: &str) {
        if !self.commands.push_line(line) {
            tracing::trace!(line, "output with no active command dropped");
        }
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        if self.is_connected() { Ok(()) } else { Err(SessionError::NotConnected) }
    }

    fn invalid(&self, operation: &str) -> SessionError {
        SessionError::InvalidState { phase: self.phase, operation: operation.to_string() }
    }
}

fn due<I: Moment>(deadline: Option<I>, now: I) -> bool {
    deadline.is_some_and(|at| at <= now)
}
