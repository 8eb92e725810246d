use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::layout::GridExtent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub longitude: i32,
    pub latitude: i32,
}

impl GridCoord {
    pub const fn new(longitude: i32, latitude: i32) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Orthogonal neighbours only; diagonal steps count as jumps.
    pub fn is_adjacent(self, other: Self) -> bool {
        let d_lon = (self.longitude - other.longitude).abs();
        let d_lat = (self.latitude - other.latitude).abs();
        d_lon + d_lat == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerIndex(pub usize);

/// Stable identity of one adventurer: owning player plus its slot in that player's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdventurerRef {
    pub player: PlayerIndex,
    pub index: usize,
}

impl AdventurerRef {
    pub const fn new(player: usize, index: usize) -> Self {
        Self {
            player: PlayerIndex(player),
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileBack {
    Water,
    Land,
}

impl TileBack {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Land => "land",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindDirection {
    pub north: bool,
    pub east: bool,
}

/// Which of the four tile edges carry water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileEdges {
    pub upwind_clock: bool,
    pub upwind_anti: bool,
    pub downwind_clock: bool,
    pub downwind_anti: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TileKind {
    Plain {
        #[serde(default)]
        is_wonder: bool,
    },
    City {
        #[serde(default)]
        is_capital: bool,
    },
    Disaster,
}

impl Default for TileKind {
    fn default() -> Self {
        Self::Plain { is_wonder: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub back: TileBack,
    #[serde(default)]
    pub wind: WindDirection,
    #[serde(default)]
    pub edges: TileEdges,
    #[serde(default)]
    pub kind: TileKind,
    #[serde(default)]
    pub dropped_wealth: i64,
}

impl Tile {
    pub fn plain(id: impl Into<String>, back: TileBack) -> Self {
        Self {
            id: TileId(id.into()),
            back,
            wind: WindDirection::default(),
            edges: TileEdges::default(),
            kind: TileKind::default(),
            dropped_wealth: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub card_type: String,
}

impl Card {
    pub fn new(id: impl Into<String>, card_type: impl Into<String>) -> Self {
        Self {
            id: CardId(id.into()),
            card_type: card_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub colour: String,
    #[serde(default)]
    pub vault_wealth: i64,
    #[serde(default)]
    pub cadre_card: Option<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdventurerCore {
    pub position: GridCoord,
    #[serde(default)]
    pub wealth: i64,
    #[serde(default)]
    pub route: Vec<GridCoord>,
}

impl AdventurerCore {
    pub fn at(position: GridCoord) -> Self {
        Self {
            position,
            wealth: 0,
            route: vec![position],
        }
    }
}

/// Adventurer rule variants. Each carries only the fields its rules use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Adventurer {
    Beginner {
        #[serde(flatten)]
        core: AdventurerCore,
    },
    Regular {
        #[serde(flatten)]
        core: AdventurerCore,
        #[serde(default)]
        pirate_token: bool,
    },
    Advanced {
        #[serde(flatten)]
        core: AdventurerCore,
        #[serde(default)]
        pirate_token: bool,
        #[serde(default)]
        character_card: Option<Card>,
        #[serde(default)]
        discovery_cards: Vec<Card>,
        #[serde(default)]
        chest_tiles: Vec<Tile>,
        chest_capacity: usize,
        #[serde(default)]
        preferred_tile: Option<usize>,
    },
}

impl Adventurer {
    pub fn core(&self) -> &AdventurerCore {
        match self {
            Self::Beginner { core } | Self::Regular { core, .. } | Self::Advanced { core, .. } => {
                core
            }
        }
    }

    pub fn core_mut(&mut self) -> &mut AdventurerCore {
        match self {
            Self::Beginner { core } | Self::Regular { core, .. } | Self::Advanced { core, .. } => {
                core
            }
        }
    }

    pub fn position(&self) -> GridCoord {
        self.core().position
    }

    pub fn route(&self) -> &[GridCoord] {
        &self.core().route
    }

    /// `None` for the variant that cannot carry pirates.
    pub fn pirate_token(&self) -> Option<bool> {
        match self {
            Self::Beginner { .. } => None,
            Self::Regular { pirate_token, .. } | Self::Advanced { pirate_token, .. } => {
                Some(*pirate_token)
            }
        }
    }

    pub fn discovery_cards(&self) -> &[Card] {
        match self {
            Self::Advanced {
                discovery_cards, ..
            } => discovery_cards,
            _ => &[],
        }
    }

    pub fn character_card(&self) -> Option<&Card> {
        match self {
            Self::Advanced { character_card, .. } => character_card.as_ref(),
            _ => None,
        }
    }

    /// Chest contents and capacity, for variants that have a chest.
    pub fn chest(&self) -> Option<(&[Tile], usize)> {
        match self {
            Self::Advanced {
                chest_tiles,
                chest_capacity,
                ..
            } => Some((chest_tiles, *chest_capacity)),
            _ => None,
        }
    }

    pub fn preferred_tile(&self) -> Option<usize> {
        match self {
            Self::Advanced { preferred_tile, .. } => *preferred_tile,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCore {
    pub position: GridCoord,
    #[serde(default)]
    pub wealth: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Agent {
    Beginner {
        #[serde(flatten)]
        core: AgentCore,
    },
    Regular {
        #[serde(flatten)]
        core: AgentCore,
        #[serde(default)]
        is_dispossessed: bool,
    },
}

impl Agent {
    pub fn core(&self) -> &AgentCore {
        match self {
            Self::Beginner { core } | Self::Regular { core, .. } => core,
        }
    }

    pub fn position(&self) -> GridCoord {
        self.core().position
    }

    pub fn is_dispossessed(&self) -> Option<bool> {
        match self {
            Self::Beginner { .. } => None,
            Self::Regular {
                is_dispossessed, ..
            } => Some(*is_dispossessed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePile {
    pub back: TileBack,
    pub remaining: usize,
    pub capacity: usize,
}

/// Authoritative game state as the rule engine exposes it to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    #[serde(default)]
    pub turn: u32,
    pub players: Vec<Player>,
    /// Indexed by player, then adventurer slot.
    #[serde(default)]
    pub adventurers: Vec<Vec<Adventurer>>,
    #[serde(default)]
    pub agents: Vec<Vec<Agent>>,
    #[serde(default, with = "play_area_entries")]
    pub play_area: BTreeMap<GridCoord, Tile>,
    #[serde(default)]
    pub tile_piles: Vec<TilePile>,
    #[serde(default)]
    pub discard_pile: Vec<Tile>,
}

impl GameState {
    pub fn new(game_id: impl Into<String>, players: Vec<Player>) -> Self {
        let seats = players.len();
        Self {
            game_id: game_id.into(),
            turn: 0,
            players,
            adventurers: vec![Vec::new(); seats],
            agents: vec![Vec::new(); seats],
            play_area: BTreeMap::new(),
            tile_piles: Vec::new(),
            discard_pile: Vec::new(),
        }
    }

    pub fn player(&self, index: PlayerIndex) -> Option<&Player> {
        self.players.get(index.0)
    }

    pub fn adventurer(&self, adventurer: AdventurerRef) -> Option<&Adventurer> {
        self.adventurers
            .get(adventurer.player.0)
            .and_then(|list| list.get(adventurer.index))
    }

    pub fn adventurer_mut(&mut self, adventurer: AdventurerRef) -> Option<&mut Adventurer> {
        self.adventurers
            .get_mut(adventurer.player.0)
            .and_then(|list| list.get_mut(adventurer.index))
    }

    pub fn adventurers_of(&self, player: PlayerIndex) -> &[Adventurer] {
        self.adventurers
            .get(player.0)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn agents_of(&self, player: PlayerIndex) -> &[Agent] {
        self.agents.get(player.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tile_at(&self, coord: GridCoord) -> Option<&Tile> {
        self.play_area.get(&coord)
    }

    /// Bounding box of every placed tile; `None` until the first tile lands.
    pub fn extent(&self) -> Option<GridExtent> {
        GridExtent::from_cells(self.play_area.keys().copied())
    }

    pub fn all_adventurer_refs(&self) -> impl Iterator<Item = AdventurerRef> + '_ {
        self.adventurers
            .iter()
            .enumerate()
            .flat_map(|(player, list)| {
                (0..list.len()).map(move |index| AdventurerRef::new(player, index))
            })
    }
}

/// JSON object keys must be strings, so the play area travels as a list of placed tiles.
mod play_area_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{GridCoord, Tile};

    #[derive(Serialize)]
    struct PlacedRef<'a> {
        at: GridCoord,
        tile: &'a Tile,
    }

    #[derive(Deserialize)]
    struct Placed {
        at: GridCoord,
        tile: Tile,
    }

    pub(super) fn serialize<S>(
        play_area: &BTreeMap<GridCoord, Tile>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(
            play_area
                .iter()
                .map(|(at, tile)| PlacedRef { at: *at, tile }),
        )
    }

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<GridCoord, Tile>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<Placed>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|placed| (placed.at, placed.tile))
            .collect())
    }
}
