//! `kst` terminal chat client.
//!
//! Reads lines from stdin and prints chat traffic to stdout. Logs go to
//! stderr so the chat stream can be piped.
//!
//! # Usage
//!
//! ```bash
//! # Credentials from the environment
//! KST_USERNAME=W1ABC KST_PASSWORD=secret kst --room 2 --grid FN42AA
//!
//! # Save credentials once, reuse them later
//! kst -u W1ABC -p secret --credentials-file ~/.config/kst/credentials
//! kst --credentials-file ~/.config/kst/credentials --highlight sked
//! ```
//!
//! Lines starting with `:` are local commands (`:quit`, `:grid LOC`, `:users`,
//! `:who`, `:history`, `:connect`, `:disconnect`); everything else is sent to
//! the server as typed.

mod input;
mod render;

use std::{io, path::PathBuf, sync::Arc};

use clap::Parser;
use input::Input;
use kst_client::{
    ChatClient, ClientConfig, ClientError, CredentialStore, DEFAULT_SERVER, FileCredentialStore,
    KeywordRules, NotificationSink, SystemEnv,
};
use kst_core::Credentials;
use kst_proto::{ChatMessage, KNOWN_ROOMS, Locator, Room};
use render::Renderer;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// KST chat client
#[derive(Parser, Debug)]
#[command(name = "kst")]
#[command(about = "Terminal client for the ON4KST amateur radio chat")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = DEFAULT_SERVER)]
    server: String,

    /// Callsign used to log in
    #[arg(short, long, env = "KST_USERNAME")]
    username: Option<String>,

    /// Account password
    #[arg(short, long, env = "KST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// File to load credentials from, or save them to when given on the command line
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// Room index (1-12; 2 is 144/432 MHz)
    #[arg(short, long, default_value_t = 2)]
    room: u8,

    /// Own grid square, announced after login
    #[arg(short, long)]
    grid: Option<String>,

    /// Extra highlight keyword (repeatable); own callsign is always one
    #[arg(long = "highlight")]
    highlight: Vec<String>,

    /// Skip loading room history after login
    #[arg(long)]
    no_history: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("unknown room index {0} (valid: 1-{max})", max = KNOWN_ROOMS.len())]
    UnknownRoom(u8),

    #[error("no credentials: pass --username/--password or --credentials-file")]
    MissingCredentials,

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Live-message hook; the terminal output itself comes from events.
struct TraceSink;

impl NotificationSink for TraceSink {
    fn notify(&self, message: &ChatMessage) {
        tracing::debug!(sender = message.sender(), "live message");
    }

    fn notify_reconnected(&self) {
        tracing::info!("reconnected to server");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let room = Room::by_index(args.room).ok_or(CliError::UnknownRoom(args.room))?;
    let grid = args.grid.as_deref().map(str::parse::<Locator>).transpose()?;
    let credentials = resolve_credentials(&args)?;

    let mut config = ClientConfig::with_server(args.server.clone());
    config.session.history_on_login = !args.no_history;

    let rules = KeywordRules::new(&credentials.username, &args.highlight);
    let mut renderer = Renderer::new(rules, grid.clone());

    tracing::info!(server = %config.server, %room, "starting");
    let sink: Arc<dyn NotificationSink> = Arc::new(TraceSink);
    let (client, task) = ChatClient::spawn_with_sink(SystemEnv::new(), config, Some(sink));
    let mut events = client.subscribe();
    client.connect(credentials.clone(), room.clone(), grid)?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let lines = match Input::parse(&line) {
                    Input::Quit => break,
                    input => run_input(&client, &mut renderer, input, &credentials, &room),
                };
                write_lines(&mut stdout, &lines).await?;
            },
            event = events.recv() => match event {
                Ok(event) => write_lines(&mut stdout, &renderer.render(&event)).await?,
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown()?;
    task.await?;
    Ok(())
}

/// Execute a local command or send text. Returns lines to print.
fn run_input(
    client: &ChatClient,
    renderer: &mut Renderer,
    input: Input,
    credentials: &Credentials,
    room: &Room,
) -> Vec<String> {
    let result = match input {
        Input::Empty | Input::Quit => Ok(()),
        Input::Grid(grid) => match client.set_grid(&grid) {
            Ok(locator) => {
                renderer.set_home(locator);
                Ok(())
            },
            Err(e) => Err(e),
        },
        Input::RefreshUsers => client.refresh_users(),
        Input::Who => return renderer.who(),
        Input::History => client.load_history(),
        Input::Connect => client.connect(credentials.clone(), room.clone(), None),
        Input::Disconnect => client.disconnect(),
        Input::Text(text) => client.send_text(&text),
    };
    match result {
        Ok(()) => Vec::new(),
        Err(e) => vec![format!("!!! {e}")],
    }
}

fn resolve_credentials(args: &Args) -> Result<Credentials, CliError> {
    let store = args.credentials_file.clone().map(FileCredentialStore::new);

    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        let credentials = Credentials::new(username, password.clone());
        if let Some(store) = &store {
            store.save(&credentials)?;
            tracing::info!(path = %store.path().display(), "credentials saved");
        }
        return Ok(credentials);
    }

    match &store {
        Some(store) => store.load()?.ok_or(CliError::MissingCredentials),
        None => Err(CliError::MissingCredentials),
    }
}

async fn write_lines(stdout: &mut Stdout, lines: &[String]) -> io::Result<()> {
    for line in lines {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await
}
