use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use board_view::{
    Adventurer, AdventurerCore, AdventurerRef, Agent, AgentCore, Card, ChoiceOutcome,
    GameState, GridCoord, HighlightError, HighlightKind, HighlightSet, Interrupt, Offers,
    PeerGroup, Player, PlayerIndex, Tile, TileBack, TileKind, TilePile, TurnAction,
    ValueOutcome, ViewerId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::HostError;

/// A game position plus the turns the host will walk the viewers through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    pub(crate) game: GameState,
    #[serde(default = "default_rounds")]
    pub(crate) rounds: u32,
    pub(crate) turns: Vec<ScriptedTurn>,
}

fn default_rounds() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptedTurn {
    pub(crate) adventurer: AdventurerRef,
    /// Highlight kind name to the cells offered under it.
    #[serde(default)]
    pub(crate) highlights: BTreeMap<String, Vec<GridCoord>>,
    #[serde(default)]
    pub(crate) prompt: Option<String>,
    /// Asks how much wealth to leave on the current tile before moving.
    #[serde(default)]
    pub(crate) wealth_drop: Option<String>,
    #[serde(default)]
    pub(crate) offer: Option<ScriptedOffer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ScriptedOffer {
    Tiles(Vec<Tile>),
    Cards(Vec<Card>),
}

impl ScriptedOffer {
    fn to_offers(&self) -> Offers {
        match self {
            Self::Tiles(tiles) => Offers::Tiles(tiles.clone()),
            Self::Cards(cards) => Offers::Cards(cards.clone()),
        }
    }
}

impl ScriptedTurn {
    fn highlight_set(&self) -> Result<HighlightSet, HighlightError> {
        HighlightSet::from_named(
            self.highlights
                .iter()
                .map(|(name, cells)| (name.as_str(), cells.iter().copied())),
        )
    }
}

impl Scenario {
    pub(crate) fn load(path: &Path) -> Result<Self, HostError> {
        let raw = fs::read_to_string(path).map_err(|source| HostError::ScenarioRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut deserializer = serde_json::Deserializer::from_str(&raw);
        let scenario = serde_path_to_error::deserialize::<_, Scenario>(&mut deserializer)
            .map_err(|error| HostError::ScenarioParse {
                path: path.to_path_buf(),
                field: error.path().to_string(),
                source: error.into_inner(),
            })?;
        scenario
            .validate()
            .map_err(|(turn, message)| HostError::ScenarioInvalid {
                path: path.to_path_buf(),
                turn,
                message,
            })?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), (usize, String)> {
        for (index, turn) in self.turns.iter().enumerate() {
            if self.game.adventurer(turn.adventurer).is_none() {
                return Err((
                    index,
                    format!(
                        "no adventurer {} for player {}",
                        turn.adventurer.index, turn.adventurer.player.0
                    ),
                ));
            }
            turn.highlight_set()
                .map_err(|err| (index, err.to_string()))?;
            if turn
                .offer
                .as_ref()
                .is_some_and(|offer| offer.to_offers().is_empty())
            {
                return Err((index, "offer has nothing to choose from".to_string()));
            }
        }
        Ok(())
    }

    /// Built-in two-player game used when no scenario file is configured.
    pub(crate) fn demo() -> Self {
        let mut game = GameState::new(
            "demo",
            vec![
                Player {
                    name: "Amber".to_string(),
                    colour: "orange".to_string(),
                    vault_wealth: 0,
                    cadre_card: None,
                },
                Player {
                    name: "Teal".to_string(),
                    colour: "blue".to_string(),
                    vault_wealth: 2,
                    cadre_card: None,
                },
            ],
        );
        for lon in -1..=1 {
            for lat in -1..=1 {
                let back = if lon == 0 && lat == 0 {
                    TileBack::Land
                } else {
                    TileBack::Water
                };
                game.play_area
                    .insert(GridCoord::new(lon, lat), Tile::plain(format!("t{lon}_{lat}"), back));
            }
        }
        if let Some(capital) = game.play_area.get_mut(&GridCoord::new(0, 0)) {
            capital.kind = TileKind::City { is_capital: true };
        }
        game.tile_piles = vec![
            TilePile {
                back: TileBack::Water,
                remaining: 40,
                capacity: 48,
            },
            TilePile {
                back: TileBack::Land,
                remaining: 20,
                capacity: 24,
            },
        ];
        game.adventurers[0].push(Adventurer::Advanced {
            core: AdventurerCore {
                position: GridCoord::new(0, 0),
                wealth: 4,
                route: vec![GridCoord::new(0, 0)],
            },
            pirate_token: false,
            character_card: Some(Card::new("adv_navigator", "adv_navigator")),
            discovery_cards: vec![Card::new("dis_map", "dis_map")],
            chest_tiles: Vec::new(),
            chest_capacity: 2,
            preferred_tile: None,
        });
        game.adventurers[1].push(Adventurer::Regular {
            core: AdventurerCore::at(GridCoord::new(0, 0)),
            pirate_token: true,
        });
        game.agents[1].push(Agent::Regular {
            core: AgentCore {
                position: GridCoord::new(-1, 1),
                wealth: 1,
            },
            is_dispossessed: false,
        });

        let amber = AdventurerRef::new(0, 0);
        let teal = AdventurerRef::new(1, 0);
        let turns = vec![
            ScriptedTurn {
                adventurer: amber,
                highlights: named([
                    ("move", vec![GridCoord::new(1, 0), GridCoord::new(0, 1)]),
                    ("buy", vec![GridCoord::new(0, -1)]),
                ]),
                prompt: Some("Amber: sail to a highlighted tile".to_string()),
                wealth_drop: None,
                offer: None,
            },
            ScriptedTurn {
                adventurer: teal,
                highlights: named([
                    ("move", vec![GridCoord::new(-1, 0), GridCoord::new(2, 0)]),
                    ("attack", vec![GridCoord::new(0, 1)]),
                ]),
                prompt: Some("Teal: explore or attack".to_string()),
                wealth_drop: None,
                offer: None,
            },
            ScriptedTurn {
                adventurer: amber,
                highlights: named([("rest", vec![GridCoord::new(1, 1)])]),
                prompt: Some("Amber: rest before the next leg".to_string()),
                wealth_drop: Some("How much wealth will you leave here?".to_string()),
                offer: Some(ScriptedOffer::Tiles(vec![
                    Tile::plain("chest_a", TileBack::Water),
                    Tile::plain("chest_b", TileBack::Land),
                ])),
            },
        ];

        Self {
            game,
            rounds: 1,
            turns,
        }
    }
}

fn named<const N: usize>(entries: [(&str, Vec<GridCoord>); N]) -> BTreeMap<String, Vec<GridCoord>> {
    entries
        .into_iter()
        .map(|(name, cells)| (name.to_string(), cells))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) turns_played: u32,
    pub(crate) moves: u32,
    pub(crate) undos: u32,
    pub(crate) timeouts: u32,
    pub(crate) winner: Option<PlayerIndex>,
}

/// Fixed answer a player has set for one kind of decision: unset, always or never.
type ToggleStates = BTreeMap<HighlightKind, Option<bool>>;

fn next_toggle_state(state: Option<bool>) -> Option<bool> {
    match state {
        None => Some(true),
        Some(true) => Some(false),
        Some(false) => None,
    }
}

/// The part of `route` from `current` up to the first later visit of
/// `destination`, excluding `current`. `None` when `current` is not on the
/// route or `destination` does not follow it.
fn route_leg(route: &[GridCoord], current: GridCoord, destination: GridCoord) -> Option<Vec<GridCoord>> {
    let start = route.iter().position(|cell| *cell == current)?;
    let ahead = &route[start + 1..];
    let end = ahead.iter().position(|cell| *cell == destination)?;
    Some(ahead[..=end].to_vec())
}

/// Result of one pass through the action wait.
enum Step {
    Done,
    Retry,
}

/// Walks the viewers through a scenario, standing in for the rule engine.
#[derive(Debug)]
pub(crate) struct ScriptedEngine {
    game: GameState,
    rounds: u32,
    turns: Vec<ScriptedTurn>,
    /// States before each applied move, newest last.
    history: Vec<GameState>,
    toggles: BTreeMap<PlayerIndex, ToggleStates>,
    summary: RunSummary,
}

impl ScriptedEngine {
    pub(crate) fn new(scenario: Scenario) -> Self {
        let unset: ToggleStates = HighlightKind::TOGGLEABLE
            .into_iter()
            .map(|kind| (kind, None))
            .collect();
        let toggles = (0..scenario.game.players.len())
            .map(|player| (PlayerIndex(player), unset.clone()))
            .collect();
        Self {
            game: scenario.game,
            rounds: scenario.rounds,
            turns: scenario.turns,
            history: Vec::new(),
            toggles,
            summary: RunSummary::default(),
        }
    }

    pub(crate) fn game(&self) -> &GameState {
        &self.game
    }

    pub(crate) fn run(&mut self, group: &mut PeerGroup) -> RunSummary {
        let turns = self.turns.clone();
        'rounds: for round in 0..self.rounds {
            for turn in &turns {
                if group.is_empty() {
                    info!(round, "all_viewers_gone");
                    break 'rounds;
                }
                self.play_turn(group, turn);
            }
        }
        if !group.is_empty() {
            if let Some(winner) = self.leading_player() {
                group.declare_win(winner, &self.game);
                self.summary.winner = Some(winner);
            }
        }
        self.summary
    }

    /// Highest vault wealth; ties go to the earlier player.
    fn leading_player(&self) -> Option<PlayerIndex> {
        self.game
            .players
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, player)| player.vault_wealth)
            .map(|(index, _)| PlayerIndex(index))
    }

    /// Moves taken since the adventurer last stood on a city, counted back
    /// along its route.
    fn moves_since_rest(&self, adventurer: AdventurerRef) -> Option<u32> {
        let route = self.game.adventurer(adventurer)?.route();
        let moves = route
            .iter()
            .rev()
            .take_while(|cell| {
                !matches!(
                    self.game.tile_at(**cell).map(|tile| tile.kind),
                    Some(TileKind::City { .. })
                )
            })
            .count();
        Some(moves as u32)
    }

    fn play_turn(&mut self, group: &mut PeerGroup, turn: &ScriptedTurn) {
        let Some(active) = group.viewer_for_player(turn.adventurer.player) else {
            warn!(player = turn.adventurer.player.0, "turn_skipped_no_viewer");
            return;
        };
        self.game.turn = self.game.turn.saturating_add(1);
        self.summary.turns_played += 1;
        group.start_turn(turn.adventurer);
        self.publish_toggles(group, turn.adventurer.player);
        info!(
            turn = self.game.turn,
            player = turn.adventurer.player.0,
            adventurer = turn.adventurer.index,
            viewer = %active,
            "turn_started"
        );

        if let Some(prompt) = &turn.wealth_drop {
            self.ask_wealth_drop(group, active, turn.adventurer, prompt);
        }
        if let Some(offer) = &turn.offer {
            self.ask_offer(group, active, turn.adventurer, offer);
        }

        let highlights = match turn.highlight_set() {
            Ok(highlights) => highlights,
            Err(err) => {
                warn!(error = %err, "turn_highlights_invalid");
                HighlightSet::new()
            }
        };
        let prompt = turn
            .prompt
            .clone()
            .unwrap_or_else(|| "Choose a highlighted move".to_string());
        loop {
            group.set_prompt(active, prompt.as_str());
            group.draw_move_options(highlights.clone(), self.moves_since_rest(turn.adventurer));
            let action = group.await_action(active, &self.game);
            match self.apply_action(group, turn.adventurer, action) {
                Step::Done => break,
                Step::Retry => continue,
            }
        }
    }

    fn apply_action(
        &mut self,
        group: &mut PeerGroup,
        adventurer: AdventurerRef,
        action: TurnAction,
    ) -> Step {
        match action {
            TurnAction::GridMove {
                kind: Some(kind),
                cell,
            } => {
                self.move_adventurer(adventurer, &[cell]);
                info!(kind = %kind, lon = cell.longitude, lat = cell.latitude, "move_applied");
                Step::Done
            }
            TurnAction::GridMove { kind: None, cell } => {
                debug!(lon = cell.longitude, lat = cell.latitude, "click_without_move");
                Step::Retry
            }
            TurnAction::Toggle(kind) => {
                let player = adventurer.player;
                let state = self.toggles.entry(player).or_default().entry(kind).or_default();
                *state = next_toggle_state(*state);
                info!(player = player.0, kind = %kind, state = ?*state, "toggle_changed");
                self.publish_toggles(group, player);
                Step::Retry
            }
            TurnAction::PreferredTile(slot) => {
                if let Some(Adventurer::Advanced { preferred_tile, .. }) =
                    self.game.adventurer_mut(adventurer)
                {
                    *preferred_tile = if *preferred_tile == Some(slot) {
                        None
                    } else {
                        Some(slot)
                    };
                    debug!(slot, preferred = ?*preferred_tile, "preferred_tile_changed");
                }
                Step::Retry
            }
            TurnAction::RouteFollow { route, destination } => {
                let Some(current) = self.game.adventurer(adventurer).map(Adventurer::position) else {
                    return Step::Done;
                };
                let Some(leg) = route_leg(&route, current, destination) else {
                    debug!(
                        lon = destination.longitude,
                        lat = destination.latitude,
                        "route_not_followable"
                    );
                    return Step::Retry;
                };
                self.move_adventurer(adventurer, &leg);
                info!(
                    steps = leg.len(),
                    lon = destination.longitude,
                    lat = destination.latitude,
                    "route_followed"
                );
                Step::Done
            }
            TurnAction::UndoRequest => {
                group.reset_peer_undos();
                match self.history.pop() {
                    Some(previous) => {
                        self.game = previous;
                        self.summary.undos += 1;
                        info!(turn = self.game.turn, "move_undone");
                    }
                    None => debug!("undo_with_empty_history"),
                }
                group.redraw_all(&self.game);
                Step::Retry
            }
            TurnAction::Timeout => {
                self.summary.timeouts += 1;
                Step::Done
            }
            TurnAction::Interrupted(Interrupt::Resize { .. }) => Step::Retry,
            TurnAction::Interrupted(Interrupt::Quit | Interrupt::Disconnected)
            | TurnAction::None => Step::Done,
        }
    }

    /// Steps along `path`, laying a tile on any empty cell it enters.
    fn move_adventurer(&mut self, adventurer: AdventurerRef, path: &[GridCoord]) {
        let Some(&destination) = path.last() else {
            return;
        };
        self.history.push(self.game.clone());
        for &cell in path {
            if !self.game.play_area.contains_key(&cell) {
                self.place_tile(cell);
            }
        }
        if let Some(moving) = self.game.adventurer_mut(adventurer) {
            let core = moving.core_mut();
            core.position = destination;
            for &cell in path {
                if core.route.last() != Some(&cell) {
                    core.route.push(cell);
                }
            }
        }
        self.summary.moves += 1;
    }

    fn place_tile(&mut self, cell: GridCoord) {
        let Some(pile) = self.game.tile_piles.iter_mut().find(|pile| pile.remaining > 0) else {
            warn!(lon = cell.longitude, lat = cell.latitude, "tile_piles_empty");
            return;
        };
        pile.remaining -= 1;
        let back = pile.back;
        let id = format!("{}_{}", back.as_str(), pile.capacity - pile.remaining);
        debug!(tile = %id, lon = cell.longitude, lat = cell.latitude, "tile_placed");
        self.game.play_area.insert(cell, Tile::plain(id, back));
    }

    fn ask_wealth_drop(
        &mut self,
        group: &mut PeerGroup,
        active: ViewerId,
        adventurer: AdventurerRef,
        prompt: &str,
    ) {
        let Some(carried) = self
            .game
            .adventurer(adventurer)
            .map(|adventurer| adventurer.core().wealth)
        else {
            return;
        };
        match group.await_value(active, &self.game, prompt, 0, carried) {
            ValueOutcome::Value(amount) => {
                let Some(moving) = self.game.adventurer_mut(adventurer) else {
                    return;
                };
                let core = moving.core_mut();
                core.wealth -= amount;
                let position = core.position;
                if let Some(tile) = self.game.play_area.get_mut(&position) {
                    tile.dropped_wealth += amount;
                }
                info!(amount, "wealth_dropped");
            }
            ValueOutcome::Timeout => self.summary.timeouts += 1,
            ValueOutcome::Interrupted(interrupt) => {
                debug!(interrupt = ?interrupt, "wealth_drop_interrupted");
            }
        }
    }

    fn ask_offer(
        &mut self,
        group: &mut PeerGroup,
        active: ViewerId,
        adventurer: AdventurerRef,
        offer: &ScriptedOffer,
    ) {
        match group.await_choice(active, &self.game, &offer.to_offers()) {
            ChoiceOutcome::Chosen(index) => {
                info!(index, "offer_chosen");
                self.take_offer(adventurer, offer, index);
            }
            ChoiceOutcome::Timeout => self.summary.timeouts += 1,
            ChoiceOutcome::Interrupted(interrupt) => {
                debug!(interrupt = ?interrupt, "offer_interrupted");
            }
        }
    }

    fn take_offer(&mut self, adventurer: AdventurerRef, offer: &ScriptedOffer, index: usize) {
        let Some(Adventurer::Advanced {
            discovery_cards,
            chest_tiles,
            chest_capacity,
            ..
        }) = self.game.adventurer_mut(adventurer)
        else {
            debug!(index, "offer_without_storage");
            return;
        };
        let overflow = match offer {
            ScriptedOffer::Cards(cards) => {
                discovery_cards.extend(cards.get(index).cloned());
                None
            }
            ScriptedOffer::Tiles(tiles) => match tiles.get(index) {
                Some(tile) if chest_tiles.len() < *chest_capacity => {
                    chest_tiles.push(tile.clone());
                    None
                }
                other => other.cloned(),
            },
        };
        if let Some(tile) = overflow {
            self.game.discard_pile.push(tile);
        }
    }

    fn publish_toggles(&self, group: &mut PeerGroup, player: PlayerIndex) {
        let states: Vec<(HighlightKind, Option<bool>)> = self
            .toggles
            .get(&player)
            .map(|states| states.iter().map(|(kind, state)| (*kind, *state)).collect())
            .unwrap_or_default();
        group.set_toggle_states(player, &states);
    }
}
