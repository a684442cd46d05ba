//! Session state machine tests driven by scripted server output.
//!
//! Every test starts from raw server bytes and checks the actions the
//! session asks its driver to perform.

use std::time::{Duration, Instant};

use kst_core::{
    ChatEvent, Credentials, ErrorKind, Session, SessionAction, SessionConfig, SessionError,
    SessionInput, SessionPhase,
};
use kst_proto::{CommandKind, Locator, ProtocolError, Room};

const ROOM_PROMPT: &str = "Your choice           : ";

fn new_session(grid: Option<&str>) -> Session<Instant> {
    Session::new(
        SessionConfig::default(),
        Credentials::new("w1abc", "secret"),
        Room::default(),
        grid.map(Locator::parse),
    )
    .unwrap()
}

fn echo(hhmm: &str) -> String {
    format!("{hhmm}Z W1ABC 144/432 MHz chat>")
}

fn feed(session: &mut Session<Instant>, text: &str, now: Instant) -> Vec<SessionAction> {
    session.handle(SessionInput::Received { data: text.as_bytes().to_vec(), now }).unwrap()
}

fn transmits(actions: &[SessionAction]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            SessionAction::Transmit(line) => Some(line.as_str()),
            _ => None,
        })
        .collect()
}

fn events(actions: &[SessionAction]) -> Vec<&ChatEvent> {
    actions
        .iter()
        .filter_map(|a| match a {
            SessionAction::Emit(event) => Some(event),
            _ => None,
        })
        .collect()
}

fn notifications(actions: &[SessionAction]) -> usize {
    actions.iter().filter(|a| matches!(a, SessionAction::Notify(_))).count()
}

/// Drive a session through the login exchange, returning every action.
fn login(session: &mut Session<Instant>, now: Instant) -> Vec<SessionAction> {
    session.begin_connect().unwrap();
    let mut actions = session.handle(SessionInput::TransportReady { now }).unwrap();
    actions.extend(feed(session, "Welcome to ON4KST\r\nLogin: ", now));
    actions.extend(feed(session, "Password: ", now));
    actions.extend(feed(session, ROOM_PROMPT, now));
    actions.extend(feed(session, &format!("You are in 144/432 MHz\r\n{}", echo("1200")), now));
    actions
}

/// Logged in with no grid and no history request; channel left holding `/sh us`.
fn connected_without_extras(now: Instant) -> Session<Instant> {
    let config = SessionConfig { history_on_login: false, ..SessionConfig::default() };
    let mut session =
        Session::new(config, Credentials::new("W1ABC", "secret"), Room::default(), None).unwrap();
    login(&mut session, now);
    session
}

/// Connected session with an idle channel.
fn idle_connected(now: Instant) -> Session<Instant> {
    let mut session = connected_without_extras(now);
    feed(&mut session, &echo("1200"), now);
    assert!(session.commands().is_idle());
    session
}

#[test]
fn login_exchange_sends_credentials_in_order() {
    let t0 = Instant::now();
    let mut session = new_session(None);

    let actions = login(&mut session, t0);

    assert_eq!(transmits(&actions)[..3], ["W1ABC", "secret", "2"]);
    assert_eq!(session.phase(), SessionPhase::Connected);
    assert!(events(&actions).contains(&&ChatEvent::ConnectionStateChanged { connected: true }));
}

#[test]
fn login_output_becomes_system_message() {
    let t0 = Instant::now();
    let mut session = new_session(None);

    let actions = login(&mut session, t0);

    let system: Vec<_> = events(&actions)
        .into_iter()
        .filter_map(|e| match e {
            ChatEvent::MessageAppended(m) => Some(m.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(system.len(), 1);
    assert!(system[0].is_system());
    assert_eq!(system[0].body(), "You are in 144/432 MHz");
    assert_eq!(system[0].time().to_string(), "1200Z");
    assert_eq!(notifications(&actions), 0);
}

#[test]
fn post_login_sends_grid_then_user_list_then_history() {
    let t0 = Instant::now();
    let mut session = new_session(Some("fn42aa"));

    let actions = login(&mut session, t0);
    assert_eq!(transmits(&actions)[3..], ["/set qra FN42AA"]);

    let actions = feed(&mut session, &echo("1200"), t0);
    assert_eq!(transmits(&actions), ["/sh us"]);

    let actions = feed(&mut session, &format!("DL1XYZ JO31AB Hans\r\n{}", echo("1201")), t0);
    assert_eq!(transmits(&actions), ["/show msg 50"]);
}

#[test]
fn user_list_replaces_roster() {
    let t0 = Instant::now();
    let mut session = connected_without_extras(t0);
    assert_eq!(session.commands().active_kind(), Some(CommandKind::ShowUsers));

    let listing = format!(
        "W1ABC FN42AA John\r\n(DL1XYZ) JO31AB Hans 2m only\r\nG4ABC IO91WM Bob\r\n{}",
        echo("1201")
    );
    let actions = feed(&mut session, &listing, t0);

    let Some(ChatEvent::RosterReplaced(users)) = events(&actions).first().copied() else {
        panic!("expected roster replacement, got {actions:?}");
    };
    let calls: Vec<&str> = users.iter().map(|u| u.callsign()).collect();
    assert_eq!(calls, ["DL1XYZ", "G4ABC", "W1ABC"]);
    assert_eq!(session.roster().get("DL1XYZ").unwrap().comment(), "Hans 2m only");
    assert!(session.commands().is_idle());
}

#[test]
fn live_chat_is_logged_notified_and_tagged_with_grid() {
    let t0 = Instant::now();
    let mut session = connected_without_extras(t0);
    feed(&mut session, &format!("DL1XYZ JO31AB Hans\r\n{}", echo("1201")), t0);

    let actions = feed(&mut session, "1203Z DL1XYZ Hans> anyone on 2m?\r\n", t0);

    assert_eq!(notifications(&actions), 1);
    let Some(ChatEvent::MessageAppended(message)) = events(&actions).first().copied() else {
        panic!("expected appended message");
    };
    assert_eq!(message.sender(), "DL1XYZ Hans");
    assert_eq!(message.body(), "anyone on 2m?");
    assert_eq!(message.origin_grid().map(Locator::raw), Some("JO31AB"));
    assert_eq!(session.log().latest(), Some(message));
}

#[test]
fn history_is_sorted_and_not_notified() {
    let t0 = Instant::now();
    let mut session = new_session(None);
    login(&mut session, t0);
    // Close out `/sh us` so `/show msg` becomes active
    let actions = feed(&mut session, &echo("1200"), t0);
    assert_eq!(transmits(&actions), ["/show msg 50"]);

    let history = format!(
        "1100Z DL1XYZ Hans> second\r\n1050Z G4ABC Bob> first\r\n1100Z OK1AB Petr> third\r\n{}",
        echo("1201")
    );
    let actions = feed(&mut session, &history, t0);

    assert_eq!(notifications(&actions), 0);
    let Some(ChatEvent::HistoryLoaded(batch)) = events(&actions).first().copied() else {
        panic!("expected history batch");
    };
    let bodies: Vec<&str> = batch.iter().map(|m| m.body()).collect();
    assert_eq!(bodies, ["first", "second", "third"]);

    // History sits in front of the login system message
    let logged: Vec<&str> = session.log().iter().map(|m| m.body()).collect();
    assert_eq!(logged[..3], ["first", "second", "third"]);
}

#[test]
fn unknown_user_closes_without_retry_signal() {
    let t0 = Instant::now();
    let mut session = new_session(None);
    session.begin_connect().unwrap();
    session.handle(SessionInput::TransportReady { now: t0 }).unwrap();
    feed(&mut session, "Login: ", t0);

    let actions = feed(&mut session, "Unknown user\r\n", t0);

    assert!(matches!(
        events(&actions)[..],
        [ChatEvent::ErrorRaised { kind: ErrorKind::Auth, .. }]
    ));
    assert!(matches!(actions.last(), Some(SessionAction::Close { .. })));
    assert_eq!(session.phase(), SessionPhase::Disconnected);
}

#[test]
fn wrong_password_is_an_auth_error() {
    let t0 = Instant::now();
    let mut session = new_session(None);
    session.begin_connect().unwrap();
    session.handle(SessionInput::TransportReady { now: t0 }).unwrap();
    feed(&mut session, "Login: ", t0);
    feed(&mut session, "Password: ", t0);

    let actions = feed(&mut session, "Wrong password!\r\n", t0);

    assert!(actions.iter().any(|a| matches!(a, SessionAction::Close { .. })));
    assert!(!session.is_connected());
}

#[test]
fn username_is_sent_unprompted_after_timeout() {
    let t0 = Instant::now();
    let mut session = new_session(None);
    session.begin_connect().unwrap();
    session.handle(SessionInput::TransportReady { now: t0 }).unwrap();
    assert_eq!(session.next_deadline(), Some(t0 + Duration::from_secs(3)));

    let early =
        session.handle(SessionInput::Tick { now: t0 + Duration::from_secs(2) }).unwrap();
    assert!(early.is_empty());

    let actions = session.handle(SessionInput::Tick { now: t0 + Duration::from_secs(3) }).unwrap();
    assert_eq!(transmits(&actions), ["W1ABC"]);
    assert_eq!(session.phase(), SessionPhase::AuthenticatingUsername);

    // A late prompt re-sends the username
    let actions = feed(&mut session, "Login: ", t0 + Duration::from_secs(4));
    assert_eq!(transmits(&actions), ["W1ABC"]);
}

#[test]
fn slow_user_list_keeps_partial_rows_and_its_slot() {
    let t0 = Instant::now();
    let mut session = new_session(None);
    login(&mut session, t0);
    feed(&mut session, "DL1XYZ JO31AB Hans\r\n", t0);
    assert_eq!(session.commands().active_kind(), Some(CommandKind::ShowUsers));

    let actions = session.handle(SessionInput::Tick { now: t0 + Duration::from_secs(5) }).unwrap();

    // Partial rows are applied but `/show msg` stays queued behind `/sh us`
    assert!(matches!(events(&actions)[..], [ChatEvent::RosterReplaced(users)] if users.len() == 1));
    assert!(transmits(&actions).is_empty());
    assert_eq!(session.commands().active_kind(), Some(CommandKind::ShowUsers));
    assert_eq!(session.next_deadline(), Some(t0 + Duration::from_secs(10)));
}

#[test]
fn late_user_list_echo_does_not_leak_history_into_live_chat() {
    let t0 = Instant::now();
    let mut session = new_session(None);
    login(&mut session, t0);
    session.handle(SessionInput::Tick { now: t0 + Duration::from_secs(6) }).unwrap();

    // The overdue listing still closes `/sh us`
    let t1 = t0 + Duration::from_secs(7);
    let actions = feed(&mut session, &format!("DL1XYZ JO31AB Hans\r\n{}", echo("1201")), t1);
    assert!(matches!(events(&actions)[..], [ChatEvent::RosterReplaced(users)] if users.len() == 1));
    assert_eq!(transmits(&actions), ["/show msg 50"]);

    let history = format!(
        "1100Z DL1XYZ Hans> old one\r\n1101Z DL2XX Bob> old two\r\n{}",
        echo("1202")
    );
    let actions = feed(&mut session, &history, t1);

    assert_eq!(notifications(&actions), 0);
    assert!(matches!(events(&actions)[..], [ChatEvent::HistoryLoaded(batch)] if batch.len() == 2));
    assert_eq!(session.roster().len(), 1);
    assert!(session.commands().is_idle());
}

#[test]
fn user_list_is_abandoned_after_second_timeout() {
    let t0 = Instant::now();
    let mut session = new_session(None);
    login(&mut session, t0);

    let first = session.handle(SessionInput::Tick { now: t0 + Duration::from_secs(5) }).unwrap();
    assert!(first.is_empty());

    let actions =
        session.handle(SessionInput::Tick { now: t0 + Duration::from_secs(10) }).unwrap();
    assert_eq!(transmits(&actions), ["/show msg 50"]);
    assert_eq!(session.commands().active_kind(), Some(CommandKind::ShowMessages));
    assert_eq!(session.roster().len(), 0);
}

#[test]
fn user_list_refreshes_periodically() {
    let t0 = Instant::now();
    let mut session = connected_without_extras(t0);
    feed(&mut session, &echo("1201"), t0);
    assert_eq!(session.next_deadline(), Some(t0 + Duration::from_secs(180)));

    let actions =
        session.handle(SessionInput::Tick { now: t0 + Duration::from_secs(180) }).unwrap();
    assert_eq!(transmits(&actions), ["/sh us"]);
}

#[test]
fn refresh_request_is_deduplicated() {
    let t0 = Instant::now();
    let mut session = connected_without_extras(t0);

    // `/sh us` from login is still active
    let actions = session.handle(SessionInput::RefreshUsers { now: t0 }).unwrap();
    assert!(actions.is_empty());
    assert_eq!(session.commands().queued().count(), 0);
}

#[test]
fn unsolicited_user_row_is_upserted_once() {
    let t0 = Instant::now();
    let mut session = idle_connected(t0);

    let actions = feed(&mut session, "OK1AB JN79AA Petr\r\n", t0);
    assert!(matches!(events(&actions)[..], [ChatEvent::UserUpserted(_)]));

    let again = feed(&mut session, "OK1AB JN79AA Petr\r\n", t0);
    assert!(again.is_empty());
    assert_eq!(session.roster().len(), 1);
}

#[test]
fn command_output_becomes_system_message_with_echo_time() {
    let t0 = Instant::now();
    let mut session = idle_connected(t0);

    let actions = session.handle(SessionInput::SendText { text: "/sh dx".into(), now: t0 }).unwrap();
    assert_eq!(transmits(&actions), ["/sh dx"]);

    feed(&mut session, "no spots\r\n", t0);
    let actions = feed(&mut session, &echo("1305"), t0);

    let Some(ChatEvent::MessageAppended(message)) = events(&actions).first().copied() else {
        panic!("expected system message");
    };
    assert!(message.is_system());
    assert_eq!(message.body(), "no spots");
    assert_eq!(message.time().to_string(), "1305Z");
}

#[test]
fn text_before_login_is_rejected() {
    let mut session = new_session(None);
    let err = session
        .handle(SessionInput::SendText { text: "hello".into(), now: Instant::now() })
        .unwrap_err();
    assert_eq!(err, SessionError::NotConnected);
    assert!(err.is_transient());
}

#[test]
fn chat_command_never_reaches_the_wire() {
    let t0 = Instant::now();
    let mut session = idle_connected(t0);

    let err =
        session.handle(SessionInput::SendText { text: "/CHAT x".into(), now: t0 }).unwrap_err();
    assert!(matches!(err, SessionError::Protocol(ProtocolError::ForbiddenCommand { .. })));
    assert!(session.commands().is_idle());
}

#[test]
fn set_grid_before_login_is_remembered() {
    let t0 = Instant::now();
    let mut session = new_session(None);

    let actions =
        session.handle(SessionInput::SetGrid { grid: Locator::parse("jo20eu"), now: t0 }).unwrap();
    assert!(actions.is_empty());

    let actions = login(&mut session, t0);
    assert!(transmits(&actions).contains(&"/set qra JO20EU"));
}

#[test]
fn invalid_grid_is_rejected() {
    let mut session = new_session(None);
    let err = session
        .handle(SessionInput::SetGrid { grid: Locator::parse("ZZ99"), now: Instant::now() })
        .unwrap_err();
    assert!(matches!(err, SessionError::Protocol(ProtocolError::InvalidLocator { .. })));
    assert!(session.grid().is_none());
}

#[test]
fn data_before_transport_is_invalid() {
    let mut session = new_session(None);
    let err = session
        .handle(SessionInput::Received { data: b"Login: ".to_vec(), now: Instant::now() })
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidState { phase: SessionPhase::Disconnected, .. }));
}

#[test]
fn close_tears_down_everything_but_login_details() {
    let t0 = Instant::now();
    let mut session = new_session(Some("fn42aa"));
    login(&mut session, t0);
    feed(&mut session, &echo("1200"), t0);
    feed(&mut session, &format!("DL1XYZ JO31AB Hans\r\n{}", echo("1201")), t0);
    assert_eq!(session.roster().len(), 1);

    session.close();

    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert!(session.commands().is_idle());
    assert_eq!(session.next_deadline(), None);
    assert!(session.roster().is_empty());
    assert!(session.log().is_empty());
    assert_eq!(session.credentials().username, "W1ABC");
    assert_eq!(session.grid().map(Locator::raw), Some("FN42AA"));
}

#[test]
fn reconnection_starts_with_an_empty_roster() {
    let t0 = Instant::now();
    let mut session = connected_without_extras(t0);
    feed(&mut session, &format!("DL1XYZ JO31AB Hans\r\n{}", echo("1201")), t0);
    session.close();

    login(&mut session, t0);
    assert_eq!(session.commands().active_kind(), Some(CommandKind::ShowUsers));

    // No grid from the previous connection's roster
    let actions = feed(&mut session, "1203Z DL1XYZ Hans> back again\r\n", t0);
    let Some(ChatEvent::MessageAppended(message)) = events(&actions).first().copied() else {
        panic!("expected live message, got {actions:?}");
    };
    assert_eq!(message.origin_grid(), None);
    assert!(session.roster().is_empty());
}
