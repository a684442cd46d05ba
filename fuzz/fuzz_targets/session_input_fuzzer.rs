//! Fuzz target for the session state machine
//!
//! # Strategy
//!
//! - Random interleavings of server data, ticks and user intents
//! - Server data biased towards real prompt and echo shapes so the login
//!   path and the command channel are reached
//!
//! # Invariants
//!
//! - Every input is handled without panicking
//! - A disconnected session has no pending timers and no commands

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use kst_core::{Credentials, Session, SessionConfig, SessionInput, SessionPhase};
use kst_proto::{Locator, Room};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Step {
    Ready,
    Prompt(PromptKind),
    Echo { minute: u8 },
    Chat { minute: u8, body: String },
    UserRow { call: u8 },
    Raw(Vec<u8>),
    Tick { advance_ms: u16 },
    SendText(String),
    SetGrid(String),
    RefreshUsers,
    LoadHistory,
    Close,
}

#[derive(Debug, Arbitrary)]
enum PromptKind {
    Login,
    Password,
    Room,
    UnknownUser,
}

fuzz_target!(|steps: Vec<Step>| {
    let Ok(mut session) = Session::<Instant>::new(
        SessionConfig::default(),
        Credentials::new("W1ABC", "pw"),
        Room::default(),
        Some(Locator::parse("JO20EU")),
    ) else {
        return;
    };

    let mut now = Instant::now();

    for step in steps.into_iter().take(256) {
        let input = match step {
            Step::Ready => {
                let _ = session.begin_connect();
                SessionInput::TransportReady { now }
            },
            Step::Prompt(kind) => {
                let text = match kind {
                    PromptKind::Login => "Login: ",
                    PromptKind::Password => "Password: ",
                    PromptKind::Room => "Your choice           : ",
                    PromptKind::UnknownUser => "Unknown user\r\n",
                };
                SessionInput::Received { data: text.as_bytes().to_vec(), now }
            },
            Step::Echo { minute } => {
                let data = format!("12{:02}Z W1ABC 144/432 MHz chat>", minute % 60).into_bytes();
                SessionInput::Received { data, now }
            },
            Step::Chat { minute, body } => {
                let data = format!("13{:02}Z DL1XYZ Hans> {body}\r\n", minute % 60).into_bytes();
                SessionInput::Received { data, now }
            },
            Step::UserRow { call } => {
                let data = format!("DL{call}XYZ JO31AB Hans\r\n").into_bytes();
                SessionInput::Received { data, now }
            },
            Step::Raw(data) => SessionInput::Received { data, now },
            Step::Tick { advance_ms } => {
                now += Duration::from_millis(u64::from(advance_ms) * 10);
                SessionInput::Tick { now }
            },
            Step::SendText(text) => SessionInput::SendText { text, now },
            Step::SetGrid(grid) => SessionInput::SetGrid { grid: Locator::parse(&grid), now },
            Step::RefreshUsers => SessionInput::RefreshUsers { now },
            Step::LoadHistory => SessionInput::LoadHistory { now },
            Step::Close => {
                session.close();
                continue;
            },
        };

        let _ = session.handle(input);

        if session.phase() == SessionPhase::Disconnected {
            assert!(session.next_deadline().is_none(), "timers survive disconnect");
            assert!(session.commands().is_idle(), "commands survive disconnect");
        }
    }
});
