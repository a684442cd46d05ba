//! Scripted in-process chat server for client tests.

#![allow(dead_code)]

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use kst_client::{ClientConfig, EventStream, NotificationSink};
use kst_core::{BackoffPolicy, ChatEvent, SessionConfig};
use kst_proto::ChatMessage;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpListener,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::broadcast::error::RecvError,
};

/// Upper bound on any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

pub const CALLSIGN: &str = "W1ABC";
pub const PASSWORD: &str = "secret";

/// The echo that closes every command's output.
pub fn echo(hhmm: &str) -> String {
    format!("{hhmm}Z {CALLSIGN} 144/432 MHz chat>")
}

/// Fast timers, no history on login, no keep-alive.
pub fn test_config(server: String) -> ClientConfig {
    ClientConfig {
        server,
        connect_timeout: Duration::from_secs(1),
        keepalive: None,
        event_buffer: 64,
        session: SessionConfig { history_on_login: false, ..SessionConfig::default() },
        backoff: BackoffPolicy {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_attempts: 3,
        },
    }
}

pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

/// Server side of one accepted connection.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) =
            tokio::time::timeout(WAIT, listener.accept()).await.expect("no connection").unwrap();
        let (reader, writer) = stream.into_split();
        Self { reader: BufReader::new(reader), writer }
    }

    pub async fn send(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next line from the client, terminator stripped.
    pub async fn expect_line(&mut self) -> String {
        let mut line = String::new();
        let n = tokio::time::timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("client sent nothing")
            .unwrap();
        assert!(n > 0, "client closed the connection");
        assert!(line.ends_with("\r\n"), "line not CRLF terminated: {line:?}");
        line.trim_end().to_string()
    }

    /// Whether the client sends nothing for `window`.
    pub async fn is_silent_for(&mut self, window: Duration) -> bool {
        let mut line = String::new();
        tokio::time::timeout(window, self.reader.read_line(&mut line)).await.is_err()
    }

    /// Wait for the client to close its side.
    pub async fn expect_eof(&mut self) {
        let mut line = String::new();
        let n = tokio::time::timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("client kept the connection open")
            .unwrap_or(0);
        assert_eq!(n, 0, "unexpected data: {line:?}");
    }

    /// Run the login exchange up to the first echo.
    pub async fn login(&mut self) {
        self.send("Welcome to the test chat\r\nLogin: ").await;
        assert_eq!(self.expect_line().await, CALLSIGN);
        self.send("Password: ").await;
        assert_eq!(self.expect_line().await, PASSWORD);
        self.send("Your choice           : ").await;
        assert_eq!(self.expect_line().await, "2");
        self.send(&format!("Hello {CALLSIGN}, welcome to 144/432 MHz\r\n{}", echo("1200")))
            .await;
    }

    /// Log in and answer the automatic user list.
    pub async fn login_with_users(&mut self, rows: &[&str]) {
        self.login().await;
        assert_eq!(self.expect_line().await, "/sh us");
        let mut listing = String::new();
        for row in rows {
            listing.push_str(row);
            listing.push_str("\r\n");
        }
        listing.push_str(&echo("1201"));
        self.send(&listing).await;
    }
}

/// Next event matching `pred`, skipping the rest.
pub async fn wait_for(
    events: &mut EventStream,
    mut pred: impl FnMut(&ChatEvent) -> bool,
) -> ChatEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => {},
                Err(RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Records everything handed to the notification hook.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<ChatMessage>>,
    reconnects: AtomicUsize,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, message: &ChatMessage) {
        self.messages.lock().unwrap().push(message.clone());
    }

    fn notify_reconnected(&self) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
    }
}
