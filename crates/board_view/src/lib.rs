pub mod game;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod peers;
pub mod regions;
pub mod rendering;
pub mod session;
pub mod snapshot;
pub mod transport;
pub mod wire;

pub use game::{
    Adventurer, AdventurerCore, AdventurerRef, Agent, AgentCore, Card, CardId, GameState,
    GridCoord, Player, PlayerIndex, Tile, TileBack, TileEdges, TileId, TileKind, TilePile,
    WindDirection,
};
pub use geometry::{PixelPoint, Rect};
pub use input::{followable_route, resolve, resolve_card_stack, Resolution};
pub use layout::{
    cell_rect, compute_layout, grid_to_pixel, pixel_to_grid, GridExtent, LayoutError,
    LayoutGeometry, ResizeAction, Viewport,
};
pub use peers::{
    ChoiceOutcome, Interrupt, PeerActivity, PeerGroup, TurnAction, ValueOutcome, Viewer,
    WaitConfig,
};
pub use regions::{InteractiveRegion, RegionKind, RegionRegistry, RegionShape};
pub use rendering::{encode_png_base64, FrameRenderer, RenderError};
pub use session::{
    FocusChange, FocusTarget, HighlightError, HighlightKind, HighlightSet, InputType,
    MoveDeadline, Offers, ViewerId, VisualSession,
};
pub use snapshot::{SerializationCache, SnapshotError, StateSnapshot};
pub use transport::{channel_pair, ChannelTransport, ChannelViewer, TransportError, ViewerTransport};
pub use wire::{encode_frame, FrameDecoder, OutboundMessage, RawFrame, ViewerMessage, WireError};
