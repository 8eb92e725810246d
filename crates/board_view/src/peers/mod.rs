use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::game::{AdventurerRef, GameState, PlayerIndex};
use crate::input::{resolve, Resolution};
use crate::layout::Viewport;
use crate::regions::RegionRegistry;
use crate::rendering::{encode_png_base64, FrameRenderer};
use crate::session::{HighlightKind, HighlightSet, InputType, Offers, ViewerId, VisualSession};
use crate::snapshot::SerializationCache;
use crate::transport::{TransportError, ViewerTransport};
use crate::wire::{OutboundMessage, ViewerMessage};

mod wait;

pub use wait::{ChoiceOutcome, Interrupt, TurnAction, ValueOutcome, WaitConfig};

/// Everything the host keeps for one connected viewer.
pub struct Viewer {
    session: VisualSession,
    registry: RegionRegistry,
    cache: SerializationCache,
    renderer: FrameRenderer,
    transport: Box<dyn ViewerTransport>,
}

impl Viewer {
    pub fn session(&self) -> &VisualSession {
        &self.session
    }

    pub fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &SerializationCache {
        &self.cache
    }

    pub fn viewport(&self) -> Viewport {
        self.renderer.viewport()
    }

    /// Redraws and sends IMAGE, STATE and PROMPT, in that order.
    fn push(&mut self, game: &GameState, peer_undo_requested: bool) -> Result<(), TransportError> {
        if let Some(image) = self.renderer.render(
            game,
            &self.session,
            peer_undo_requested,
            &mut self.registry,
        ) {
            match encode_png_base64(&image) {
                Ok(payload) => self.transport.send(&OutboundMessage::Image(payload))?,
                Err(err) => warn!(viewer = %self.session.viewer(), error = %err, "frame_encode_failed"),
            }
        }
        match self.cache.encode(game) {
            Ok(state) => self.transport.send(&OutboundMessage::State(state))?,
            Err(err) => warn!(viewer = %self.session.viewer(), error = %err, "state_encode_failed"),
        }
        self.transport
            .send(&OutboundMessage::Prompt(self.session.prompt().to_string()))
    }

    fn send_prompt(&mut self) -> Result<(), TransportError> {
        self.transport
            .send(&OutboundMessage::Prompt(self.session.prompt().to_string()))
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("session", &self.session)
            .field("viewport", &self.renderer.viewport())
            .field("regions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// What one round of peer polling observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerActivity {
    pub handled: usize,
    pub undo_changed: bool,
    pub departed: Vec<ViewerId>,
}

/// All viewers of one game. Only the rule engine's thread touches it.
#[derive(Debug, Default)]
pub struct PeerGroup {
    config: WaitConfig,
    viewers: Vec<Viewer>,
}

impl PeerGroup {
    pub fn new(config: WaitConfig) -> Self {
        Self {
            config,
            viewers: Vec::new(),
        }
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    /// Adds a viewer, replacing any member already using `viewer`.
    pub fn join(
        &mut self,
        viewer: ViewerId,
        players: Vec<PlayerIndex>,
        viewport: Viewport,
        transport: Box<dyn ViewerTransport>,
    ) {
        if self.leave(viewer) {
            debug!(viewer = %viewer, "viewer_replaced");
        }
        info!(
            viewer = %viewer,
            players = ?players,
            width = viewport.width,
            height = viewport.height,
            "viewer_joined"
        );
        let mut session = VisualSession::new(viewer, players, self.config.move_time_limit);
        if let Some(current) = self.viewers.first().and_then(|member| member.session.current()) {
            session.start_turn(current);
        }
        self.viewers.push(Viewer {
            session,
            registry: RegionRegistry::new(),
            cache: SerializationCache::new(),
            renderer: FrameRenderer::new(viewport),
            transport,
        });
    }

    pub fn leave(&mut self, viewer: ViewerId) -> bool {
        let before = self.viewers.len();
        self.viewers.retain(|member| member.session.viewer() != viewer);
        let removed = self.viewers.len() != before;
        if removed {
            info!(viewer = %viewer, remaining = self.viewers.len(), "viewer_left");
        }
        removed
    }

    pub fn viewer_ids(&self) -> Vec<ViewerId> {
        self.viewers
            .iter()
            .map(|member| member.session.viewer())
            .collect()
    }

    pub fn viewer(&self, viewer: ViewerId) -> Option<&Viewer> {
        self.viewers
            .iter()
            .find(|member| member.session.viewer() == viewer)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &VisualSession> + '_ {
        self.viewers.iter().map(|member| &member.session)
    }

    pub fn session(&self, viewer: ViewerId) -> Option<&VisualSession> {
        self.viewer(viewer).map(|member| &member.session)
    }

    pub fn session_mut(&mut self, viewer: ViewerId) -> Option<&mut VisualSession> {
        self.index_of(viewer)
            .map(|index| &mut self.viewers[index].session)
    }

    /// The member whose turn it is, if its viewer is connected.
    pub fn active_viewer(&self) -> Option<ViewerId> {
        self.sessions()
            .find(|session| session.is_active())
            .map(VisualSession::viewer)
    }

    pub fn viewer_for_player(&self, player: PlayerIndex) -> Option<ViewerId> {
        self.sessions()
            .find(|session| session.controls(player))
            .map(VisualSession::viewer)
    }

    /// Sets whose turn it is on every member at once.
    pub fn start_turn(&mut self, adventurer: AdventurerRef) {
        for member in &mut self.viewers {
            member.session.start_turn(adventurer);
            member.session.set_offers(None);
        }
        debug!(
            player = adventurer.player.0,
            adventurer = adventurer.index,
            members = self.viewers.len(),
            "turn_started"
        );
    }

    /// Move options, and the count of moves since the last rest, are shown
    /// only to the viewer whose turn it is.
    pub fn draw_move_options(&mut self, highlights: HighlightSet, moves_since_rest: Option<u32>) {
        for member in &mut self.viewers {
            if member.session.is_active() {
                member.session.set_highlights(highlights.clone());
                member.session.set_moves_since_rest(moves_since_rest);
            } else {
                member.session.clear_highlights();
                member.session.set_moves_since_rest(None);
            }
        }
    }

    /// Tells every member who won and pushes the final frame.
    pub fn declare_win(&mut self, winner: PlayerIndex, game: &GameState) {
        let name = game
            .player(winner)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| format!("player {}", winner.0));
        let prompt = format!("{name} won the game");
        for member in &mut self.viewers {
            member.session.declare_winner(winner, prompt.clone());
        }
        info!(winner = winner.0, name = %name, members = self.viewers.len(), "game_won");
        self.redraw_all(game);
    }

    /// Toggle states belong to one player and reach only the members controlling them.
    pub fn set_toggle_states(&mut self, player: PlayerIndex, states: &[(HighlightKind, Option<bool>)]) {
        for member in &mut self.viewers {
            if !member.session.controls(player) {
                continue;
            }
            for (kind, state) in states {
                member.session.set_toggle_state(*kind, *state);
            }
        }
    }

    pub fn set_prompt(&mut self, viewer: ViewerId, prompt: impl Into<String>) {
        if let Some(session) = self.session_mut(viewer) {
            session.set_prompt(prompt);
        }
    }

    /// True iff every member has voted to undo.
    pub fn check_peers_undo(&self) -> bool {
        !self.viewers.is_empty() && self.sessions().all(VisualSession::undo_vote)
    }

    pub fn reset_peer_undos(&mut self) {
        for member in &mut self.viewers {
            member.session.set_undo_vote(false);
        }
    }

    /// Redraws every member except `caller` exactly once, telling each who
    /// the group is waiting for.
    pub fn refresh_peers(
        &mut self,
        caller: ViewerId,
        game: &GameState,
        offers: Option<&Offers>,
        input_type: InputType,
    ) -> usize {
        let waiting_on = self
            .session(caller)
            .and_then(VisualSession::current_player)
            .and_then(|player| game.player(player))
            .map(|player| player.name.clone())
            .unwrap_or_else(|| "another player".to_string());
        let prompt = format!("Waiting for {waiting_on} to {}", input_type.verb());

        let mut refreshed = HashSet::new();
        let mut targets = Vec::new();
        for (index, member) in self.viewers.iter_mut().enumerate() {
            let id = member.session.viewer();
            if id == caller || !refreshed.insert(id) {
                continue;
            }
            member.session.set_prompt(prompt.clone());
            member.session.set_offers(offers.cloned());
            targets.push(index);
        }
        self.push_indices(&targets, game);
        refreshed.len()
    }

    /// Redraws every member once.
    pub fn redraw_all(&mut self, game: &GameState) {
        let all: Vec<usize> = (0..self.viewers.len()).collect();
        self.push_indices(&all, game);
    }

    pub fn redraw(&mut self, viewer: ViewerId, game: &GameState) {
        if let Some(index) = self.index_of(viewer) {
            self.push_indices(&[index], game);
        }
    }

    /// Handles queued clicks from every member other than `active`. Peers may
    /// only change their own focus and undo vote.
    pub fn check_peer_input(&mut self, active: ViewerId, game: &GameState) -> PeerActivity {
        let mut activity = PeerActivity::default();
        let mut needs_redraw = Vec::new();
        let limit = self.config.peer_messages_per_poll.max(1);

        for (index, member) in self.viewers.iter_mut().enumerate() {
            let id = member.session.viewer();
            if id == active {
                continue;
            }
            let mut redraw = false;
            for _ in 0..limit {
                let message = match member.transport.poll() {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(TransportError::Wire(err)) => {
                        warn!(viewer = %id, error = %err, "peer_frame_malformed");
                        continue;
                    }
                    Err(err) => {
                        info!(viewer = %id, error = %err, "peer_disconnected");
                        activity.departed.push(id);
                        break;
                    }
                };
                activity.handled += 1;
                match message {
                    ViewerMessage::Coords(point) => {
                        match resolve(point, &member.registry, &member.session) {
                            Resolution::Focus(change) => {
                                redraw |= member.session.apply_focus(change, game);
                            }
                            Resolution::UndoVote => {
                                let vote = member.session.toggle_undo_vote();
                                debug!(viewer = %id, vote, "peer_undo_vote");
                                activity.undo_changed = true;
                            }
                            _ => {}
                        }
                    }
                    ViewerMessage::Resize { width, height }
                    | ViewerMessage::Start { width, height } => {
                        member.renderer.set_viewport(Viewport::new(width, height));
                        redraw = true;
                    }
                    ViewerMessage::Text(_) => {}
                    ViewerMessage::Quit => {
                        info!(viewer = %id, "peer_quit");
                        activity.departed.push(id);
                        break;
                    }
                }
            }
            if redraw && !activity.departed.contains(&id) {
                needs_redraw.push(index);
            }
        }

        if activity.undo_changed {
            needs_redraw = (0..self.viewers.len()).collect();
        }
        needs_redraw.retain(|index| {
            !activity
                .departed
                .contains(&self.viewers[*index].session.viewer())
        });
        self.push_indices(&needs_redraw, game);
        for id in &activity.departed {
            self.leave(*id);
        }
        activity
    }

    fn index_of(&self, viewer: ViewerId) -> Option<usize> {
        self.viewers
            .iter()
            .position(|member| member.session.viewer() == viewer)
    }

    fn push_indices(&mut self, indices: &[usize], game: &GameState) {
        let votes: Vec<bool> = self.sessions().map(VisualSession::undo_vote).collect();
        let mut failed = Vec::new();
        for &index in indices {
            let peer_undo_requested = votes
                .iter()
                .enumerate()
                .any(|(other, vote)| other != index && *vote);
            let Some(member) = self.viewers.get_mut(index) else {
                continue;
            };
            if let Err(err) = member.push(game, peer_undo_requested) {
                warn!(viewer = %member.session.viewer(), error = %err, "viewer_push_failed");
                failed.push(member.session.viewer());
            }
        }
        for id in failed {
            self.leave(id);
        }
    }
}
