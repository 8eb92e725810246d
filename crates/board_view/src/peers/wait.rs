use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::game::{GameState, GridCoord};
use crate::geometry::PixelPoint;
use crate::input::{resolve, Resolution};
use crate::layout::Viewport;
use crate::session::{HighlightKind, InputType, Offers, ViewerId};
use crate::transport::TransportError;
use crate::wire::ViewerMessage;

use super::PeerGroup;

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub poll_interval: Duration,
    pub move_time_limit: Duration,
    pub peer_messages_per_poll: usize,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            move_time_limit: Duration::from_secs(120),
            peer_messages_per_poll: 8,
        }
    }
}

/// Why a wait ended without an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Resize { width: u32, height: u32 },
    Quit,
    Disconnected,
}

/// Resolved outcome of the active viewer's turn, as handed to the rule engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    /// `kind` is `None` for a click on a cell with no highlight.
    GridMove {
        kind: Option<HighlightKind>,
        cell: GridCoord,
    },
    Toggle(HighlightKind),
    PreferredTile(usize),
    RouteFollow {
        route: Vec<GridCoord>,
        destination: GridCoord,
    },
    UndoRequest,
    Timeout,
    Interrupted(Interrupt),
    /// The viewer is not a member of the group.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOutcome {
    Value(i64),
    Timeout,
    Interrupted(Interrupt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceOutcome {
    Chosen(usize),
    Timeout,
    Interrupted(Interrupt),
}

/// One step of a blocking wait.
enum Poll {
    Message(ViewerMessage),
    Idle,
    Gone,
}

impl PeerGroup {
    /// Blocks until the active viewer picks an action, the deadline passes, or
    /// every member has voted to undo.
    pub fn await_action(&mut self, active: ViewerId, game: &GameState) -> TurnAction {
        if !self.begin_wait(active, game, None, InputType::Move) {
            return TurnAction::None;
        }
        loop {
            if self.check_peers_undo() {
                info!(viewer = %active, "undo_consensus_reached");
                return TurnAction::UndoRequest;
            }
            if self.deadline_expired(active) {
                info!(viewer = %active, "move_timed_out");
                return TurnAction::Timeout;
            }
            let message = match self.poll_active(active, game) {
                Poll::Message(message) => message,
                Poll::Idle => continue,
                Poll::Gone => return TurnAction::Interrupted(Interrupt::Disconnected),
            };
            if let Some(interrupt) = self.interrupt_for(active, &message) {
                return TurnAction::Interrupted(interrupt);
            }
            let ViewerMessage::Coords(point) = message else {
                continue;
            };
            self.reset_deadline(active);
            let Some(index) = self.index_of(active) else {
                return TurnAction::Interrupted(Interrupt::Disconnected);
            };
            let member = &self.viewers[index];
            match resolve(point, &member.registry, &member.session) {
                Resolution::Highlight { kind, cell } => {
                    return TurnAction::GridMove {
                        kind: Some(kind),
                        cell,
                    }
                }
                Resolution::Cell(cell) => return TurnAction::GridMove { kind: None, cell },
                Resolution::Toggle(kind) => return TurnAction::Toggle(kind),
                Resolution::PreferredTile(slot) => return TurnAction::PreferredTile(slot),
                Resolution::RouteFollow { route, destination } => {
                    return TurnAction::RouteFollow { route, destination }
                }
                Resolution::UndoVote => {
                    let vote = self.viewers[index].session.toggle_undo_vote();
                    debug!(viewer = %active, vote, "undo_vote");
                    self.redraw_all(game);
                }
                Resolution::Focus(change) => {
                    if self.viewers[index].session.apply_focus(change, game) {
                        self.redraw(active, game);
                    }
                }
                Resolution::Offer(_) | Resolution::NoMatch => {}
            }
        }
    }

    /// Asks the active viewer for a number in `minimum..=maximum`, re-sending
    /// the prompt after every unusable answer.
    pub fn await_value(
        &mut self,
        active: ViewerId,
        game: &GameState,
        prompt: &str,
        minimum: i64,
        maximum: i64,
    ) -> ValueOutcome {
        self.set_prompt(active, prompt);
        if !self.begin_wait(active, game, None, InputType::Value) {
            return ValueOutcome::Interrupted(Interrupt::Disconnected);
        }
        loop {
            if self.deadline_expired(active) {
                info!(viewer = %active, "value_timed_out");
                return ValueOutcome::Timeout;
            }
            let message = match self.poll_active(active, game) {
                Poll::Message(message) => message,
                Poll::Idle => continue,
                Poll::Gone => return ValueOutcome::Interrupted(Interrupt::Disconnected),
            };
            if let Some(interrupt) = self.interrupt_for(active, &message) {
                return ValueOutcome::Interrupted(interrupt);
            }
            self.reset_deadline(active);
            match message {
                ViewerMessage::Text(text) => {
                    if let Some(value) = parse_in_range(&text, minimum, maximum) {
                        return ValueOutcome::Value(value);
                    }
                    debug!(viewer = %active, input = %text, minimum, maximum, "value_rejected");
                    self.set_prompt(
                        active,
                        format!("{prompt} (a whole number from {minimum} to {maximum})"),
                    );
                    if !self.resend_prompt(active) {
                        return ValueOutcome::Interrupted(Interrupt::Disconnected);
                    }
                }
                ViewerMessage::Coords(point) => self.apply_local_focus(active, game, point),
                _ => {}
            }
        }
    }

    /// Shows `offers` to every member and waits for the active viewer to pick one.
    /// Offers are cleared from every member afterwards.
    pub fn await_choice(
        &mut self,
        active: ViewerId,
        game: &GameState,
        offers: &Offers,
    ) -> ChoiceOutcome {
        let outcome = self.wait_for_offer(active, game, offers);
        for member in &mut self.viewers {
            member.session.set_offers(None);
        }
        self.redraw_all(game);
        outcome
    }

    fn wait_for_offer(
        &mut self,
        active: ViewerId,
        game: &GameState,
        offers: &Offers,
    ) -> ChoiceOutcome {
        if let Some(session) = self.session_mut(active) {
            session.set_offers(Some(offers.clone()));
        }
        if !self.begin_wait(active, game, Some(offers), offers.input_type()) {
            return ChoiceOutcome::Interrupted(Interrupt::Disconnected);
        }
        loop {
            if self.deadline_expired(active) {
                info!(viewer = %active, "choice_timed_out");
                return ChoiceOutcome::Timeout;
            }
            let message = match self.poll_active(active, game) {
                Poll::Message(message) => message,
                Poll::Idle => continue,
                Poll::Gone => return ChoiceOutcome::Interrupted(Interrupt::Disconnected),
            };
            if let Some(interrupt) = self.interrupt_for(active, &message) {
                return ChoiceOutcome::Interrupted(interrupt);
            }
            let ViewerMessage::Coords(point) = message else {
                continue;
            };
            self.reset_deadline(active);
            let Some(member) = self.viewer(active) else {
                return ChoiceOutcome::Interrupted(Interrupt::Disconnected);
            };
            if let Resolution::Offer(index) = resolve(point, &member.registry, &member.session) {
                return ChoiceOutcome::Chosen(index);
            }
        }
    }

    /// Pushes the active frame, refreshes every peer and starts the countdown.
    fn begin_wait(
        &mut self,
        active: ViewerId,
        game: &GameState,
        offers: Option<&Offers>,
        input_type: InputType,
    ) -> bool {
        if self.index_of(active).is_none() {
            warn!(viewer = %active, "wait_for_unknown_viewer");
            return false;
        }
        self.reset_deadline(active);
        self.redraw(active, game);
        self.refresh_peers(active, game, offers, input_type);
        self.index_of(active).is_some()
    }

    fn reset_deadline(&mut self, active: ViewerId) {
        if let Some(session) = self.session_mut(active) {
            session.move_deadline_mut().reset(Instant::now());
        }
    }

    fn deadline_expired(&self, active: ViewerId) -> bool {
        self.session(active)
            .is_some_and(|session| session.move_deadline().is_expired(Instant::now()))
    }

    /// Takes one message from the active viewer and services peers once. While
    /// the active viewer is quiet the wait sleeps for one poll interval.
    fn poll_active(&mut self, active: ViewerId, game: &GameState) -> Poll {
        let Some(index) = self.index_of(active) else {
            return Poll::Gone;
        };
        let polled = self.viewers[index].transport.poll();
        self.check_peer_input(active, game);
        match polled {
            Ok(Some(message)) => Poll::Message(message),
            Ok(None) => {
                thread::sleep(self.config.poll_interval);
                Poll::Idle
            }
            Err(TransportError::Wire(err)) => {
                warn!(viewer = %active, error = %err, "viewer_frame_malformed");
                Poll::Idle
            }
            Err(err) => {
                info!(viewer = %active, error = %err, "active_viewer_disconnected");
                self.leave(active);
                Poll::Gone
            }
        }
    }

    /// Resize and quit end any wait. The new viewport is kept for the retry.
    fn interrupt_for(&mut self, active: ViewerId, message: &ViewerMessage) -> Option<Interrupt> {
        match *message {
            ViewerMessage::Resize { width, height } => {
                let index = self.index_of(active)?;
                self.viewers[index]
                    .renderer
                    .set_viewport(Viewport::new(width, height));
                info!(viewer = %active, width, height, "viewer_resized");
                Some(Interrupt::Resize { width, height })
            }
            ViewerMessage::Quit => {
                info!(viewer = %active, "viewer_quit");
                self.leave(active);
                Some(Interrupt::Quit)
            }
            _ => None,
        }
    }

    fn apply_local_focus(&mut self, active: ViewerId, game: &GameState, point: PixelPoint) {
        let Some(index) = self.index_of(active) else {
            return;
        };
        let member = &mut self.viewers[index];
        if let Resolution::Focus(change) = resolve(point, &member.registry, &member.session) {
            if member.session.apply_focus(change, game) {
                self.redraw(active, game);
            }
        }
    }

    fn resend_prompt(&mut self, active: ViewerId) -> bool {
        let Some(index) = self.index_of(active) else {
            return false;
        };
        match self.viewers[index].send_prompt() {
            Ok(()) => true,
            Err(err) => {
                warn!(viewer = %active, error = %err, "prompt_send_failed");
                self.leave(active);
                false
            }
        }
    }
}

fn parse_in_range(text: &str, minimum: i64, maximum: i64) -> Option<i64> {
    text.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| (minimum..=maximum).contains(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_outside_range_or_not_numbers_are_rejected() {
        assert_eq!(parse_in_range(" 4 ", 0, 5), Some(4));
        assert_eq!(parse_in_range("0", 0, 5), Some(0));
        assert_eq!(parse_in_range("5", 0, 5), Some(5));
        assert_eq!(parse_in_range("6", 0, 5), None);
        assert_eq!(parse_in_range("-1", 0, 5), None);
        assert_eq!(parse_in_range("four", 0, 5), None);
        assert_eq!(parse_in_range("", 0, 5), None);
    }

    #[test]
    fn default_wait_config_polls_faster_than_it_times_out() {
        let config = WaitConfig::default();
        assert!(config.poll_interval < config.move_time_limit);
        assert!(config.peer_messages_per_poll > 0);
    }
}
