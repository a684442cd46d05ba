//! Single-slot command channel.
//!
//! The server answers commands strictly in order and closes each answer with
//! an echo of our own prompt. So at most one command is outstanding: later
//! submissions queue FIFO and are transmitted as the slot frees up.
//!
//! Login answers are the exception. Their output ends with the next prompt,
//! not an echo, so a new login answer replaces the active one immediately.

use std::collections::VecDeque;

use kst_proto::{CommandKind, PendingCommand};

/// Outcome of [`CommandChannel::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Slot was free (or held a login answer): write this to the wire now
    Transmit(PendingCommand),
    /// Slot busy: command waits at this 1-based queue position
    Queued {
        /// Position in the queue
        position: usize,
    },
}

/// A command whose output is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCommand {
    /// The command that finished
    pub command: PendingCommand,
    /// Output lines collected while it was active
    pub lines: Vec<String>,
}

/// Result of [`CommandChannel::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The command that just finished
    pub finished: CompletedCommand,
    /// Next command pulled from the queue; the caller transmits it
    pub next: Option<PendingCommand>,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    Busy {
        active: PendingCommand,
        lines: Vec<String>,
        queue: VecDeque<PendingCommand>,
    },
}

/// Serializes outbound commands so their output can be attributed.
#[derive(Debug, Default)]
pub struct CommandChannel {
    slot: Slot,
}

impl CommandChannel {
    /// Empty, idle channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a command.
    pub fn submit(&mut self, command: PendingCommand) -> Dispatch {
        match &mut self.slot {
            Slot::Idle => {
                self.slot = Slot::Busy {
                    active: command.clone(),
                    lines: Vec::new(),
                    queue: VecDeque::new(),
                };
                Dispatch::Transmit(command)
            },
            Slot::Busy { active, lines, .. } if active.kind() == CommandKind::Login => {
                *active = command.clone();
                lines.clear();
                Dispatch::Transmit(command)
            },
            Slot::Busy { queue, .. } => {
                queue.push_back(command);
                Dispatch::Queued { position: queue.len() }
            },
        }
    }

    /// Attribute an output line to the active command.
    ///
    /// Returns `false` (dropping the line) when nothing is active.
    pub fn push_line(&mut self, line: impl Into<String>) -> bool {
        match &mut self.slot {
            Slot::Idle => false,
            Slot::Busy { lines, .. } => {
                lines.push(line.into());
                true
            },
        }
    }

    /// Close out the active command and pull the next one from the queue.
    ///
    /// Returns `None` when the channel is idle (a stray echo).
    pub fn complete(&mut self) -> Option<Completion> {
        let Slot::Busy { active, lines, mut queue } = std::mem::take(&mut self.slot) else {
            return None;
        };

        let next = queue.pop_front();
        if let Some(next) = &next {
            self.slot = Slot::Busy { active: next.clone(), lines: Vec::new(), queue };
        }

        Some(Completion { finished: CompletedCommand { command: active, lines }, next })
    }

    /// Drop the active command and everything queued.
    ///
    /// Returns how many commands were discarded.
    pub fn abandon(&mut self) -> usize {
        match std::mem::take(&mut self.slot) {
            Slot::Idle => 0,
            Slot::Busy { queue, .. } => queue.len() + 1,
        }
    }

    /// The command currently awaiting its echo.
    pub fn active(&self) -> Option<&PendingCommand> {
        match &self.slot {
            Slot::Idle => None,
            Slot::Busy { active, .. } => Some(active),
        }
    }

    /// Kind of the active command.
    pub fn active_kind(&self) -> Option<CommandKind> {
        self.active().map(PendingCommand::kind)
    }

    /// Lines collected so far for the active command.
    pub fn lines(&self) -> &[String] {
        match &self.slot {
            Slot::Idle => &[],
            Slot::Busy { lines, .. } => lines,
        }
    }

    /// Commands waiting behind the active one, in transmit order.
    pub fn queued(&self) -> impl Iterator<Item = &PendingCommand> {
        let queue = match &self.slot {
            Slot::Idle => None,
            Slot::Busy { queue, .. } => Some(queue),
        };
        queue.into_iter().flatten()
    }

    /// Whether a command of `kind` is active or queued.
    pub fn is_pending(&self, kind: CommandKind) -> bool {
        self.active_kind() == Some(kind) || self.queued().any(|c| c.kind() == kind)
    }

    /// No command is active.
    pub fn is_idle(&self) -> bool {
        matches!(self.slot, Slot::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> PendingCommand {
        PendingCommand::user_text(s).unwrap()
    }

    #[test]
    fn first_command_transmits_rest_queue() {
        let mut channel = CommandChannel::new();

        assert_eq!(channel.submit(text("a")), Dispatch::Transmit(text("a")));
        assert_eq!(channel.submit(text("b")), Dispatch::Queued { position: 1 });
        assert_eq!(channel.submit(text("c")), Dispatch::Queued { position: 2 });
        assert_eq!(channel.active(), Some(&text("a")));
    }

    #[test]
    fn completion_hands_over_in_fifo_order() {
        let mut channel = CommandChannel::new();
        channel.submit(text("a"));
        channel.submit(text("b"));
        channel.push_line("output of a");

        let done = channel.complete().unwrap();
        assert_eq!(done.finished.command, text("a"));
        assert_eq!(done.finished.lines, vec!["output of a".to_string()]);
        assert_eq!(done.next, Some(text("b")));
        assert!(channel.lines().is_empty());

        let done = channel.complete().unwrap();
        assert_eq!(done.next, None);
        assert!(channel.is_idle());
        assert!(channel.complete().is_none());
    }

    #[test]
    fn login_answers_replace_each_other() {
        let mut channel = CommandChannel::new();
        channel.submit(PendingCommand::login("W1ABC"));
        channel.push_line("Password:");

        let dispatch = channel.submit(PendingCommand::login("secret"));
        assert!(matches!(dispatch, Dispatch::Transmit(_)));
        assert!(channel.lines().is_empty());
        assert_eq!(channel.queued().count(), 0);
    }

    #[test]
    fn lines_without_active_command_are_dropped() {
        let mut channel = CommandChannel::new();
        assert!(!channel.push_line("stray"));
    }

    #[test]
    fn is_pending_sees_active_and_queued() {
        let mut channel = CommandChannel::new();
        channel.submit(text("a"));
        channel.submit(PendingCommand::show_users());

        assert!(channel.is_pending(CommandKind::UserCommand));
        assert!(channel.is_pending(CommandKind::ShowUsers));
        assert!(!channel.is_pending(CommandKind::ShowMessages));
    }

    #[test]
    fn abandon_counts_and_clears() {
        let mut channel = CommandChannel::new();
        channel.submit(text("a"));
        channel.submit(text("b"));
        channel.submit(text("c"));

        assert_eq!(channel.abandon(), 3);
        assert!(channel.is_idle());
        assert_eq!(channel.abandon(), 0);
    }
}
