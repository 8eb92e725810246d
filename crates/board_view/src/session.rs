use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::{AdventurerRef, Card, GameState, GridCoord, PlayerIndex, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(pub u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    Move,
    Abandon,
    Invalid,
    Buy,
    Attack,
    Rest,
    BuyRest,
    MoveAgent,
    AgentTransfer,
}

impl HighlightKind {
    pub const ALL: [HighlightKind; 9] = [
        HighlightKind::Move,
        HighlightKind::Abandon,
        HighlightKind::Invalid,
        HighlightKind::Buy,
        HighlightKind::Attack,
        HighlightKind::Rest,
        HighlightKind::BuyRest,
        HighlightKind::MoveAgent,
        HighlightKind::AgentTransfer,
    ];

    /// Kinds with an automatic-response toggle in the menu, in display order.
    pub const TOGGLEABLE: [HighlightKind; 3] =
        [HighlightKind::Buy, HighlightKind::Attack, HighlightKind::Rest];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Abandon => "abandon",
            Self::Invalid => "invalid",
            Self::Buy => "buy",
            Self::Attack => "attack",
            Self::Rest => "rest",
            Self::BuyRest => "buy_rest",
            Self::MoveAgent => "move_agent",
            Self::AgentTransfer => "agent_transfer",
        }
    }
}

impl fmt::Display for HighlightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HighlightError {
    #[error("unknown highlight kind '{0}'")]
    UnknownKind(String),
}

impl FromStr for HighlightKind {
    type Err = HighlightError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| HighlightError::UnknownKind(raw.to_string()))
    }
}

/// Highlighted cells offered for the current move, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightSet(BTreeMap<HighlightKind, Vec<GridCoord>>);

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: HighlightKind, cells: impl IntoIterator<Item = GridCoord>) -> Self {
        self.0.entry(kind).or_default().extend(cells);
        self
    }

    /// Builds a set from the rule engine's string-keyed mapping.
    pub fn from_named<'a, I, C>(entries: I) -> Result<Self, HighlightError>
    where
        I: IntoIterator<Item = (&'a str, C)>,
        C: IntoIterator<Item = GridCoord>,
    {
        let mut set = Self::new();
        for (name, cells) in entries {
            let kind = name.parse::<HighlightKind>()?;
            set = set.with(kind, cells);
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn cells(&self, kind: HighlightKind) -> &[GridCoord] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (HighlightKind, GridCoord)> + '_ {
        self.0
            .iter()
            .flat_map(|(kind, cells)| cells.iter().map(move |cell| (*kind, *cell)))
    }

    /// First kind, in declaration order, that highlights `cell`.
    pub fn kind_at(&self, cell: GridCoord) -> Option<HighlightKind> {
        self.iter()
            .find(|(_, highlighted)| *highlighted == cell)
            .map(|(kind, _)| kind)
    }
}

/// What the active viewer is currently being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Move,
    Value,
    ChooseTile,
    ChooseDiscovery,
    ChooseCompany,
    ChooseCharacter,
}

impl InputType {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Value => "enter a value",
            Self::ChooseTile => "choose a tile",
            Self::ChooseDiscovery => "choose a discovery",
            Self::ChooseCompany => "choose a company",
            Self::ChooseCharacter => "choose a character",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offers {
    Cards(Vec<Card>),
    Tiles(Vec<Tile>),
}

impl Offers {
    pub fn len(&self) -> usize {
        match self {
            Self::Cards(cards) => cards.len(),
            Self::Tiles(tiles) => tiles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn input_type(&self) -> InputType {
        match self {
            Self::Tiles(_) => InputType::ChooseTile,
            Self::Cards(cards) => {
                let prefix = cards.first().map(|card| card.card_type.as_str()).unwrap_or("");
                if prefix.starts_with("com") {
                    InputType::ChooseCompany
                } else if prefix.starts_with("adv") {
                    InputType::ChooseCharacter
                } else {
                    InputType::ChooseDiscovery
                }
            }
        }
    }
}

/// Score cells and tokens focus either a whole player or one adventurer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusTarget {
    Player(PlayerIndex),
    Adventurer(AdventurerRef),
}

/// Local view changes a click can make without touching game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    View(FocusTarget),
    SelectCard(Option<usize>),
    ToggleRouteDisplay,
}

#[derive(Debug, Clone, Copy)]
pub struct MoveDeadline {
    limit: Duration,
    expires_at: Instant,
}

impl MoveDeadline {
    pub fn new(limit: Duration, now: Instant) -> Self {
        Self {
            limit,
            expires_at: now + limit,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.expires_at = now + self.limit;
    }

    pub fn set_limit(&mut self, limit: Duration, now: Instant) {
        self.limit = limit;
        self.reset(now);
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// One viewer's private view of the shared game.
#[derive(Debug, Clone)]
pub struct VisualSession {
    viewer: ViewerId,
    players: Vec<PlayerIndex>,
    current: Option<AdventurerRef>,
    viewed: Option<AdventurerRef>,
    highlights: HighlightSet,
    selected_card_index: Option<usize>,
    undo_vote: bool,
    draw_all_routes: bool,
    toggle_states: BTreeMap<HighlightKind, Option<bool>>,
    prompt: String,
    offers: Option<Offers>,
    moves_since_rest: Option<u32>,
    winner: Option<PlayerIndex>,
    move_deadline: MoveDeadline,
}

impl VisualSession {
    pub fn new(viewer: ViewerId, players: Vec<PlayerIndex>, move_time_limit: Duration) -> Self {
        Self {
            viewer,
            players,
            current: None,
            viewed: None,
            highlights: HighlightSet::new(),
            selected_card_index: None,
            undo_vote: false,
            draw_all_routes: false,
            toggle_states: HighlightKind::TOGGLEABLE
                .into_iter()
                .map(|kind| (kind, None))
                .collect(),
            prompt: String::new(),
            offers: None,
            moves_since_rest: None,
            winner: None,
            move_deadline: MoveDeadline::new(move_time_limit, Instant::now()),
        }
    }

    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    pub fn players(&self) -> &[PlayerIndex] {
        &self.players
    }

    pub fn controls(&self, player: PlayerIndex) -> bool {
        self.players.contains(&player)
    }

    /// True when it is this viewer's turn.
    pub fn is_active(&self) -> bool {
        self.current
            .is_some_and(|current| self.controls(current.player))
    }

    pub fn current(&self) -> Option<AdventurerRef> {
        self.current
    }

    pub fn current_player(&self) -> Option<PlayerIndex> {
        self.current.map(|current| current.player)
    }

    pub fn current_adventurer_index(&self) -> Option<usize> {
        self.current.map(|current| current.index)
    }

    pub fn viewed(&self) -> Option<AdventurerRef> {
        self.viewed
    }

    pub fn viewed_player(&self) -> Option<PlayerIndex> {
        self.viewed.map(|viewed| viewed.player)
    }

    pub fn viewed_adventurer_index(&self) -> Option<usize> {
        self.viewed.map(|viewed| viewed.index)
    }

    pub fn highlights(&self) -> &HighlightSet {
        &self.highlights
    }

    pub fn selected_card_index(&self) -> Option<usize> {
        self.selected_card_index
    }

    pub fn undo_vote(&self) -> bool {
        self.undo_vote
    }

    pub fn draw_all_routes(&self) -> bool {
        self.draw_all_routes
    }

    pub fn toggle_state(&self, kind: HighlightKind) -> Option<bool> {
        self.toggle_states.get(&kind).copied().flatten()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn offers(&self) -> Option<&Offers> {
        self.offers.as_ref()
    }

    /// Shown next to the move options while it is this viewer's turn.
    pub fn moves_since_rest(&self) -> Option<u32> {
        self.moves_since_rest
    }

    /// Set once the game is over.
    pub fn winner(&self) -> Option<PlayerIndex> {
        self.winner
    }

    pub fn move_deadline(&self) -> &MoveDeadline {
        &self.move_deadline
    }

    pub fn move_deadline_mut(&mut self) -> &mut MoveDeadline {
        &mut self.move_deadline
    }

    /// Reset point for everything tied to the previous turn.
    pub fn start_turn(&mut self, adventurer: AdventurerRef) {
        self.current = Some(adventurer);
        self.viewed = Some(adventurer);
        self.undo_vote = false;
        self.selected_card_index = None;
        self.highlights = HighlightSet::new();
        self.moves_since_rest = None;
    }

    pub fn set_highlights(&mut self, highlights: HighlightSet) {
        self.highlights = highlights;
    }

    pub fn clear_highlights(&mut self) {
        self.highlights = HighlightSet::new();
    }

    pub fn set_moves_since_rest(&mut self, moves: Option<u32>) {
        self.moves_since_rest = moves;
    }

    /// Ends the game for this viewer: the winner takes focus and nothing stays clickable
    /// apart from the local view controls.
    pub fn declare_winner(&mut self, winner: PlayerIndex, prompt: impl Into<String>) {
        self.winner = Some(winner);
        self.highlights = HighlightSet::new();
        self.offers = None;
        self.moves_since_rest = None;
        self.undo_vote = false;
        self.prompt = prompt.into();
    }

    pub fn set_toggle_state(&mut self, kind: HighlightKind, state: Option<bool>) {
        self.toggle_states.insert(kind, state);
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn set_offers(&mut self, offers: Option<Offers>) {
        self.offers = offers;
    }

    pub fn set_undo_vote(&mut self, vote: bool) {
        self.undo_vote = vote;
    }

    pub fn toggle_undo_vote(&mut self) -> bool {
        self.undo_vote = !self.undo_vote;
        self.undo_vote
    }

    /// Applies a local focus change. Returns whether anything visible changed.
    pub fn apply_focus(&mut self, change: FocusChange, game: &GameState) -> bool {
        match change {
            FocusChange::View(FocusTarget::Adventurer(adventurer)) => {
                if game.adventurer(adventurer).is_none() || self.viewed == Some(adventurer) {
                    return false;
                }
                self.viewed = Some(adventurer);
                self.selected_card_index = None;
                true
            }
            FocusChange::View(FocusTarget::Player(player)) => {
                if self.viewed_player() == Some(player) {
                    return false;
                }
                let first = AdventurerRef { player, index: 0 };
                if game.adventurer(first).is_none() {
                    return false;
                }
                self.viewed = Some(first);
                self.selected_card_index = None;
                true
            }
            FocusChange::SelectCard(index) => {
                let changed = self.selected_card_index != index;
                self.selected_card_index = index;
                changed
            }
            FocusChange::ToggleRouteDisplay => {
                self.draw_all_routes = !self.draw_all_routes;
                true
            }
        }
    }
}
