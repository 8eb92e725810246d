use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::game::{
    Adventurer, AdventurerRef, Agent, Card, CardId, GameState, GridCoord, PlayerIndex, Tile,
    TileBack, TileEdges, TileId, TileKind, WindDirection,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode state snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A tile is sent in full once per viewer, then only by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TileEntry {
    Full(Box<TileRecord>),
    Ref { tile_id: TileId },
}

impl TileEntry {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileRecord {
    pub tile_id: TileId,
    pub tile_back: TileBack,
    pub wind_direction: WindDirection,
    pub tile_edges: TileEdges,
    #[serde(flatten)]
    pub kind: TileKind,
    pub dropped_wealth: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CardEntry {
    Full { card_id: CardId, card_type: String },
    Ref { card_id: CardId },
}

impl CardEntry {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }
}

/// Players travel as identity plus scores; their adventurers are listed separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRecord {
    pub name: String,
    pub index: PlayerIndex,
    pub colour: String,
    pub vault_wealth: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedTile {
    pub longitude: i32,
    pub latitude: i32,
    pub tile: TileEntry,
}

/// The owning player is named rather than embedded, which keeps the
/// player-adventurer cycle out of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdventurerRecord {
    pub player: String,
    pub player_index: PlayerIndex,
    pub num: usize,
    pub variant: &'static str,
    pub position: GridCoord,
    pub wealth: i64,
    pub vault_wealth: i64,
    pub cadre_card: Option<CardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pirate_token: Option<bool>,
    pub route: Vec<TileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_card: Option<CardEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discovery_cards: Vec<CardEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chest_tiles: Vec<TileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_tile: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRecord {
    pub player: String,
    pub player_index: PlayerIndex,
    pub position: GridCoord,
    pub wealth: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dispossessed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TilePileRecord {
    pub tile_back: TileBack,
    pub remaining: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub game_id: String,
    pub turn: u32,
    pub players: Vec<PlayerRecord>,
    pub play_area: Vec<PlacedTile>,
    pub adventurers: Vec<AdventurerRecord>,
    pub agents: Vec<AgentRecord>,
    pub tile_piles: Vec<TilePileRecord>,
    pub discard_pile: Vec<TileEntry>,
}

/// Per-viewer record of which tiles and cards have already been sent in full.
/// Entities never change once created, so entries stay valid until the game changes.
#[derive(Debug, Default)]
pub struct SerializationCache {
    game_id: Option<String>,
    sent_tiles: HashSet<TileId>,
    sent_cards: HashSet<CardId>,
}

impl SerializationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the cache to `game_id`, forgetting everything if it was tracking another game.
    pub fn begin_game(&mut self, game_id: &str) -> bool {
        if self.game_id.as_deref() == Some(game_id) {
            return false;
        }
        if let Some(previous) = self.game_id.replace(game_id.to_string()) {
            debug!(previous = %previous, game_id, "serialization_cache_reset_for_new_game");
        }
        self.sent_tiles.clear();
        self.sent_cards.clear();
        true
    }

    pub fn is_tile_sent(&self, id: &TileId) -> bool {
        self.sent_tiles.contains(id)
    }

    pub fn is_card_sent(&self, id: &CardId) -> bool {
        self.sent_cards.contains(id)
    }

    pub fn sent_counts(&self) -> (usize, usize) {
        (self.sent_tiles.len(), self.sent_cards.len())
    }

    pub fn tile_entry(&mut self, tile: &Tile) -> TileEntry {
        // Marked before the record is built, so anything reached from it sees a reference.
        if !self.sent_tiles.insert(tile.id.clone()) {
            return TileEntry::Ref {
                tile_id: tile.id.clone(),
            };
        }
        TileEntry::Full(Box::new(TileRecord {
            tile_id: tile.id.clone(),
            tile_back: tile.back,
            wind_direction: tile.wind,
            tile_edges: tile.edges,
            kind: tile.kind,
            dropped_wealth: tile.dropped_wealth,
        }))
    }

    pub fn card_entry(&mut self, card: &Card) -> CardEntry {
        if !self.sent_cards.insert(card.id.clone()) {
            return CardEntry::Ref {
                card_id: card.id.clone(),
            };
        }
        CardEntry::Full {
            card_id: card.id.clone(),
            card_type: card.card_type.clone(),
        }
    }

    pub fn snapshot(&mut self, game: &GameState) -> StateSnapshot {
        self.begin_game(&game.game_id);

        let players = game
            .players
            .iter()
            .enumerate()
            .map(|(index, player)| PlayerRecord {
                name: player.name.clone(),
                index: PlayerIndex(index),
                colour: player.colour.clone(),
                vault_wealth: player.vault_wealth,
            })
            .collect();

        let play_area = game
            .play_area
            .iter()
            .map(|(at, tile)| PlacedTile {
                longitude: at.longitude,
                latitude: at.latitude,
                tile: self.tile_entry(tile),
            })
            .collect();

        let adventurers = game
            .all_adventurer_refs()
            .filter_map(|adventurer| self.adventurer_record(game, adventurer))
            .collect();

        let mut agents = Vec::new();
        for (player_index, list) in game.agents.iter().enumerate() {
            let player_name = player_name(game, PlayerIndex(player_index));
            for agent in list {
                agents.push(agent_record(&player_name, PlayerIndex(player_index), agent));
            }
        }

        let tile_piles = game
            .tile_piles
            .iter()
            .map(|pile| TilePileRecord {
                tile_back: pile.back,
                remaining: pile.remaining,
                capacity: pile.capacity,
            })
            .collect();

        let discard_pile = game
            .discard_pile
            .iter()
            .map(|tile| self.tile_entry(tile))
            .collect();

        StateSnapshot {
            game_id: game.game_id.clone(),
            turn: game.turn,
            players,
            play_area,
            adventurers,
            agents,
            tile_piles,
            discard_pile,
        }
    }

    pub fn encode(&mut self, game: &GameState) -> Result<String, SnapshotError> {
        let snapshot = self.snapshot(game);
        Ok(serde_json::to_string(&snapshot)?)
    }

    fn adventurer_record(
        &mut self,
        game: &GameState,
        adventurer_ref: AdventurerRef,
    ) -> Option<AdventurerRecord> {
        let adventurer = game.adventurer(adventurer_ref)?;
        let player = game.player(adventurer_ref.player);
        let core = adventurer.core();

        let route = core
            .route
            .iter()
            .filter_map(|step| game.tile_at(*step))
            .map(|tile| self.tile_entry(tile))
            .collect();
        let cadre_card = player
            .and_then(|player| player.cadre_card.as_ref())
            .map(|card| self.card_entry(card));
        let character_card = adventurer
            .character_card()
            .map(|card| self.card_entry(card));
        let discovery_cards = adventurer
            .discovery_cards()
            .iter()
            .map(|card| self.card_entry(card))
            .collect();
        let chest_tiles = adventurer
            .chest()
            .map(|(tiles, _)| tiles.iter().map(|tile| self.tile_entry(tile)).collect())
            .unwrap_or_default();

        Some(AdventurerRecord {
            player: player_name(game, adventurer_ref.player),
            player_index: adventurer_ref.player,
            num: adventurer_ref.index,
            variant: adventurer_variant(adventurer),
            position: core.position,
            wealth: core.wealth,
            vault_wealth: player.map(|player| player.vault_wealth).unwrap_or_default(),
            cadre_card,
            pirate_token: adventurer.pirate_token(),
            route,
            character_card,
            discovery_cards,
            chest_tiles,
            preferred_tile: adventurer.preferred_tile(),
        })
    }
}

fn player_name(game: &GameState, player: PlayerIndex) -> String {
    game.player(player)
        .map(|player| player.name.clone())
        .unwrap_or_default()
}

fn adventurer_variant(adventurer: &Adventurer) -> &'static str {
    match adventurer {
        Adventurer::Beginner { .. } => "beginner",
        Adventurer::Regular { .. } => "regular",
        Adventurer::Advanced { .. } => "advanced",
    }
}

fn agent_record(player: &str, player_index: PlayerIndex, agent: &Agent) -> AgentRecord {
    AgentRecord {
        player: player.to_string(),
        player_index,
        position: agent.position(),
        wealth: agent.core().wealth,
        is_dispossessed: agent.is_dispossessed(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::game::{AdventurerCore, AgentCore, Player};

    fn sample_game() -> GameState {
        let mut game = GameState::new(
            "cartography-1",
            vec![Player {
                name: "Ada".to_string(),
                colour: "red".to_string(),
                vault_wealth: 4,
                cadre_card: Some(Card::new("cadre-1", "com+rest")),
            }],
        );
        game.play_area
            .insert(GridCoord::new(0, 0), Tile::plain("t-origin", TileBack::Water));
        game.play_area
            .insert(GridCoord::new(1, 0), Tile::plain("t-east", TileBack::Land));
        game.adventurers[0].push(Adventurer::Advanced {
            core: AdventurerCore {
                position: GridCoord::new(1, 0),
                wealth: 2,
                route: vec![GridCoord::new(0, 0), GridCoord::new(1, 0)],
            },
            pirate_token: false,
            character_card: Some(Card::new("char-1", "adv+agents")),
            discovery_cards: vec![Card::new("disc-1", "dis+market")],
            chest_tiles: vec![Tile::plain("t-chest", TileBack::Water)],
            chest_capacity: 2,
            preferred_tile: Some(0),
        });
        game.agents[0].push(Agent::Regular {
            core: AgentCore {
                position: GridCoord::new(0, 0),
                wealth: 1,
            },
            is_dispossessed: false,
        });
        game
    }

    #[test]
    fn same_tile_twice_is_full_then_reference() {
        let mut cache = SerializationCache::new();
        let tile = Tile::plain("t9", TileBack::Land);
        assert!(cache.tile_entry(&tile).is_full());
        assert_eq!(
            cache.tile_entry(&tile),
            TileEntry::Ref {
                tile_id: TileId("t9".to_string())
            }
        );
    }

    #[test]
    fn fresh_cache_sends_full_structure_again() {
        let game = sample_game();
        let mut first = SerializationCache::new();
        let mut second = SerializationCache::new();
        let one = first.snapshot(&game);
        let again = first.snapshot(&game);
        let other = second.snapshot(&game);
        assert!(one.play_area.iter().all(|placed| placed.tile.is_full()));
        assert!(again.play_area.iter().all(|placed| !placed.tile.is_full()));
        assert!(other.play_area.iter().all(|placed| placed.tile.is_full()));
    }

    #[test]
    fn route_tiles_reference_play_area_entries() {
        let game = sample_game();
        let mut cache = SerializationCache::new();
        let snapshot = cache.snapshot(&game);
        let adventurer = &snapshot.adventurers[0];
        assert_eq!(adventurer.route.len(), 2);
        assert!(adventurer.route.iter().all(|step| !step.is_full()));
        assert!(adventurer.chest_tiles[0].is_full());
    }

    #[test]
    fn snapshot_json_names_player_instead_of_embedding_it() {
        let game = sample_game();
        let mut cache = SerializationCache::new();
        let value: Value = serde_json::from_str(&cache.encode(&game).expect("encode")).expect("json");
        let adventurer = &value["adventurers"][0];
        assert_eq!(adventurer["player"], json!("Ada"));
        assert_eq!(adventurer["player_index"], json!(0));
        assert_eq!(adventurer["vault_wealth"], json!(4));
        assert_eq!(
            adventurer["cadre_card"],
            json!({"card_id": "cadre-1", "card_type": "com+rest"})
        );
        assert_eq!(adventurer["route"][0], json!({"tile_id": "t-origin"}));
        assert_eq!(value["agents"][0]["is_dispossessed"], json!(false));
        assert_eq!(value["play_area"][0]["tile"]["type"], json!("plain"));
    }

    #[test]
    fn cards_are_deduplicated_across_snapshots() {
        let game = sample_game();
        let mut cache = SerializationCache::new();
        cache.snapshot(&game);
        let second = cache.snapshot(&game);
        let adventurer = &second.adventurers[0];
        assert_eq!(
            adventurer.discovery_cards,
            vec![CardEntry::Ref {
                card_id: CardId("disc-1".to_string())
            }]
        );
        assert_eq!(cache.sent_counts(), (3, 3));
    }

    #[test]
    fn new_game_resets_cache_but_same_game_does_not() {
        let game = sample_game();
        let mut cache = SerializationCache::new();
        cache.snapshot(&game);
        assert!(!cache.begin_game("cartography-1"));
        assert!(cache.is_tile_sent(&TileId("t-origin".to_string())));

        let mut next = game.clone();
        next.game_id = "cartography-2".to_string();
        let snapshot = cache.snapshot(&next);
        assert!(snapshot.play_area.iter().all(|placed| placed.tile.is_full()));
    }

    #[test]
    fn beginner_fields_are_omitted() {
        let mut game = sample_game();
        game.adventurers[0][0] = Adventurer::Beginner {
            core: AdventurerCore::at(GridCoord::new(0, 0)),
        };
        game.agents[0][0] = Agent::Beginner {
            core: AgentCore {
                position: GridCoord::new(0, 0),
                wealth: 0,
            },
        };
        let mut cache = SerializationCache::new();
        let value: Value = serde_json::from_str(&cache.encode(&game).expect("encode")).expect("json");
        assert!(value["adventurers"][0].get("pirate_token").is_none());
        assert!(value["adventurers"][0].get("discovery_cards").is_none());
        assert!(value["agents"][0].get("is_dispossessed").is_none());
    }
}
