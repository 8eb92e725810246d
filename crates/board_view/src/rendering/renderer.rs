use image::RgbaImage;
use tracing::debug;

use crate::game::{
    Adventurer, AdventurerRef, Card, GameState, PlayerIndex, Tile, TileBack, TileKind,
};
use crate::geometry::{PixelPoint, Rect};
use crate::input::followable_route;
use crate::layout::{
    cell_rect, compute_layout, grid_to_pixel_offset, LayoutGeometry, ResizeAction, Viewport,
    MENU_TILE_COLUMNS, SCORES_SPACING, TILE_BORDER_SHARE,
};
use crate::regions::{RegionKind, RegionRegistry, RegionShape};
use crate::session::{FocusTarget, HighlightKind, Offers, VisualSession};

use super::surface::{
    draw_line, fill_circle, fill_rect, outline_rect, Colour, LayeredFrame,
};

const MENU_COLOUR: Colour = [38, 32, 27, 255];
const SEA_COLOUR: Colour = [28, 74, 112, 255];
const WATER_TILE_COLOUR: Colour = [64, 132, 186, 255];
const LAND_TILE_COLOUR: Colour = [196, 172, 120, 255];
const CITY_COLOUR: Colour = [222, 184, 60, 255];
const CAPITAL_COLOUR: Colour = [240, 210, 90, 255];
const DISASTER_COLOUR: Colour = [96, 30, 30, 255];
const WONDER_COLOUR: Colour = [250, 250, 250, 255];
const WEALTH_COLOUR: Colour = [255, 215, 0, 255];
const OUTLINE_COLOUR: Colour = [12, 12, 12, 255];
const SELECTION_COLOUR: Colour = [255, 255, 255, 255];
const EMPTY_SLOT_COLOUR: Colour = [70, 62, 54, 255];
const TOGGLE_UNSET_COLOUR: Colour = [120, 120, 120, 255];
const TOGGLE_ON_COLOUR: Colour = [60, 170, 80, 255];
const TOGGLE_OFF_COLOUR: Colour = [180, 60, 60, 255];
const UNDO_IDLE_COLOUR: Colour = [110, 110, 110, 255];
const UNDO_VOTED_COLOUR: Colour = [200, 40, 40, 255];
const UNDO_REQUESTED_COLOUR: Colour = [230, 150, 30, 255];
const CARD_COMPANY_COLOUR: Colour = [150, 90, 160, 255];
const CARD_CHARACTER_COLOUR: Colour = [90, 140, 90, 255];
const CARD_DISCOVERY_COLOUR: Colour = [200, 180, 140, 255];
const MOVE_COUNT_COLOUR: Colour = [236, 228, 210, 255];

const PLAYER_OFFSETS: [(f32, f32); 4] = [(0.25, 0.25), (0.25, 0.75), (0.75, 0.25), (0.75, 0.75)];
const ADVENTURER_OFFSETS: [(f32, f32); 5] =
    [(0.0, 0.0), (0.1, -0.1), (-0.1, 0.1), (-0.1, -0.1), (0.1, 0.1)];
const AGENT_OFFSET: (f32, f32) = (0.5, 0.5);
const OFFER_GAP_SHARE: f32 = 0.1;

/// Draws one viewer's frame and registers every interactive region in the same pass.
#[derive(Debug, Clone)]
pub struct FrameRenderer {
    viewport: Viewport,
    prior_tile_size: Option<u32>,
    last_resize_action: Option<ResizeAction>,
}

impl FrameRenderer {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            prior_tile_size: None,
            last_resize_action: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn tile_size(&self) -> Option<u32> {
        self.prior_tile_size
    }

    pub fn last_resize_action(&self) -> Option<ResizeAction> {
        self.last_resize_action
    }

    /// Returns `None` while the layout is not ready; the registry is still reset
    /// so no stale region can be hit.
    pub fn render(
        &mut self,
        game: &GameState,
        session: &VisualSession,
        peer_undo_requested: bool,
        registry: &mut RegionRegistry,
    ) -> Option<RgbaImage> {
        let layout = match compute_layout(self.viewport, game.extent(), self.prior_tile_size) {
            Ok(layout) => layout,
            Err(err) => {
                debug!(
                    viewer = %session.viewer(),
                    error = %err,
                    "frame_layout_not_ready"
                );
                registry.begin_frame(None);
                return None;
            }
        };
        if layout.resize_action == ResizeAction::ReloadNeeded {
            debug!(
                viewer = %session.viewer(),
                tile_size = layout.tile_size,
                prior = ?self.prior_tile_size,
                "frame_tiles_need_reload"
            );
        }
        self.prior_tile_size = Some(layout.tile_size);
        self.last_resize_action = Some(layout.resize_action);
        registry.begin_frame(Some(layout));

        let mut frame = LayeredFrame::new(self.viewport);
        let painter = Painter {
            layout: &layout,
            game,
            session,
        };
        painter.draw_board(&mut frame.background);
        painter.draw_routes(&mut frame.turn, registry);
        painter.draw_tokens(&mut frame.turn, registry);
        let scores_bottom = painter.draw_scores(&mut frame.turn, registry);
        painter.draw_card_stack(&mut frame.turn, registry, scores_bottom);
        let toggles_bottom = painter.draw_toggle_menu(&mut frame.turn, registry);
        let chest_bottom = painter.draw_chest(&mut frame.turn, registry, toggles_bottom);
        painter.draw_piles(&mut frame.turn, chest_bottom);
        painter.draw_undo(&mut frame.turn, registry, peer_undo_requested);
        painter.draw_move_count(&mut frame.turn);
        painter.draw_highlights(&mut frame.moves, registry);
        if let Some(offers) = session.offers() {
            painter.draw_offers(&mut frame.moves, registry, offers);
        }
        painter.draw_winner(&mut frame.moves);
        Some(frame.composite())
    }
}

struct Painter<'a> {
    layout: &'a LayoutGeometry,
    game: &'a GameState,
    session: &'a VisualSession,
}

impl Painter<'_> {
    fn tile_border(&self) -> i32 {
        ((self.layout.tile_size as f32 * TILE_BORDER_SHARE).round() as i32).max(1)
    }

    fn viewed_adventurer(&self) -> Option<(AdventurerRef, &Adventurer)> {
        let viewed = self.session.viewed()?;
        self.game.adventurer(viewed).map(|adventurer| (viewed, adventurer))
    }

    fn draw_board(&self, image: &mut RgbaImage) {
        let layout = self.layout;
        fill_rect(image, Rect::new(0, 0, layout.viewport.width as i32, layout.viewport.height as i32), MENU_COLOUR);
        fill_rect(image, layout.play_area, SEA_COLOUR);
        let border = self.tile_border();
        for (cell, tile) in &self.game.play_area {
            let rect = cell_rect(layout, *cell).inset(border);
            draw_tile(image, rect, tile);
        }
    }

    fn draw_highlights(&self, image: &mut RgbaImage, registry: &mut RegionRegistry) {
        let border = self.tile_border();
        for (kind, cell) in self.session.highlights().iter() {
            let rect = cell_rect(self.layout, cell).inset(border);
            let colour = highlight_colour(kind);
            fill_rect(image, rect, [colour[0], colour[1], colour[2], 70]);
            outline_rect(image, rect, border * 2, colour);
            registry.push_rect(RegionKind::Highlight { kind, cell }, rect);
        }
    }

    fn routes_visible_for(&self, player: PlayerIndex) -> bool {
        self.session.draw_all_routes()
            || self.session.current_player() == Some(player)
            || self.session.viewed_player() == Some(player)
    }

    fn draw_routes(&self, image: &mut RgbaImage, registry: &mut RegionRegistry) {
        let thickness = self.layout.route_thickness as i32;
        for adventurer_ref in self.game.all_adventurer_refs() {
            if !self.routes_visible_for(adventurer_ref.player) {
                continue;
            }
            let Some(adventurer) = self.game.adventurer(adventurer_ref) else {
                continue;
            };
            let route = adventurer.route();
            if route.len() < 2 {
                continue;
            }
            let offset = token_offset(adventurer_ref);
            let colour = self.player_colour(adventurer_ref.player);
            let steps = route.len();
            for (index, pair) in route.windows(2).enumerate() {
                let from = grid_to_pixel_offset(self.layout, pair[0], offset);
                let to = grid_to_pixel_offset(self.layout, pair[1], offset);
                // later steps are drawn thicker so direction of travel is visible
                let width = (thickness * (index as i32 + 2) + steps as i32 - 1) / steps as i32;
                draw_line(image, from, to, width.max(1), colour);
            }

            let followable = followable_route(route);
            if followable.len() < 2 {
                continue;
            }
            let route_index = registry.add_route(followable.to_vec());
            for pair in followable.windows(2) {
                registry.push(
                    RegionKind::RouteSegment {
                        route: route_index,
                        from: pair[0],
                        to: pair[1],
                    },
                    RegionShape::Segment {
                        from: grid_to_pixel_offset(self.layout, pair[0], offset),
                        to: grid_to_pixel_offset(self.layout, pair[1], offset),
                        tolerance: thickness,
                    },
                );
            }
        }
    }

    fn draw_tokens(&self, image: &mut RgbaImage, registry: &mut RegionRegistry) {
        let layout = self.layout;
        let radius = layout.token_size as i32;
        let outline = layout.token_outline as i32;
        for adventurer_ref in self.game.all_adventurer_refs() {
            let Some(adventurer) = self.game.adventurer(adventurer_ref) else {
                continue;
            };
            let center = grid_to_pixel_offset(layout, adventurer.position(), token_offset(adventurer_ref));
            fill_circle(image, center, radius + outline, OUTLINE_COLOUR);
            fill_circle(image, center, radius, self.player_colour(adventurer_ref.player));
            if adventurer.pirate_token() == Some(true) {
                fill_circle(image, center, (radius / 3).max(1), OUTLINE_COLOUR);
            }
            if self.session.viewed() == Some(adventurer_ref) {
                outline_rect(
                    image,
                    Rect::new(center.x - radius - outline, center.y - radius - outline, 2 * (radius + outline), 2 * (radius + outline)),
                    1,
                    SELECTION_COLOUR,
                );
            }
            registry.push(
                RegionKind::AdventurerToken(adventurer_ref),
                RegionShape::Circle { center, radius },
            );
        }

        let size = layout.agent_size as i32;
        for (player, agents) in self.game.agents.iter().enumerate() {
            let player = PlayerIndex(player);
            for agent in agents {
                let anchor = grid_to_pixel_offset(layout, agent.position(), AGENT_OFFSET);
                let rect = Rect::new(anchor.x - size / 2, anchor.y - size / 2, size, size);
                if agent.is_dispossessed() == Some(true) {
                    outline_rect(image, rect, outline, self.player_colour(player));
                } else {
                    fill_rect(image, rect, self.player_colour(player));
                    outline_rect(image, rect, 1, OUTLINE_COLOUR);
                }
                registry.push_rect(RegionKind::AgentToken(player), rect);
            }
        }
    }

    /// Score table at the top of the left menu. Returns its bottom edge.
    fn draw_scores(&self, image: &mut RgbaImage, registry: &mut RegionRegistry) -> i32 {
        let menu = self.layout.left_menu;
        let row_height = (self.layout.fonts.scores_px as f32 * SCORES_SPACING).round() as i32;
        let name_width = menu.width / 2;
        let max_adventurers = self
            .game
            .adventurers
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(1);
        let cell_width = (menu.width - name_width) / max_adventurers as i32;

        let mut y = menu.y + row_height;
        for (index, player) in self.game.players.iter().enumerate() {
            let player_index = PlayerIndex(index);
            let colour = self.player_colour(player_index);
            let name_cell = Rect::new(menu.x, y, name_width, row_height);
            fill_rect(image, name_cell.inset(2), colour);
            let vault = Rect::new(
                name_cell.x + 2,
                name_cell.bottom() - 4,
                (player.vault_wealth.clamp(0, 20) as i32 * name_cell.width / 20).max(0),
                2,
            );
            fill_rect(image, vault, WEALTH_COLOUR);
            if self.session.current_player() == Some(player_index) {
                outline_rect(image, name_cell, 1, SELECTION_COLOUR);
            }
            registry.push_rect(
                RegionKind::ScoreCell(FocusTarget::Player(player_index)),
                name_cell,
            );

            for (slot, adventurer) in self.game.adventurers_of(player_index).iter().enumerate() {
                let adventurer_ref = AdventurerRef {
                    player: player_index,
                    index: slot,
                };
                let cell = Rect::new(
                    menu.x + name_width + slot as i32 * cell_width,
                    y,
                    cell_width,
                    row_height,
                );
                let wealth = adventurer.core().wealth.clamp(0, 20) as i32;
                fill_rect(image, cell.inset(2), EMPTY_SLOT_COLOUR);
                fill_rect(
                    image,
                    Rect::new(cell.x + 2, cell.bottom() - 4, wealth * (cell.width - 4) / 20, 2),
                    WEALTH_COLOUR,
                );
                if self.session.viewed() == Some(adventurer_ref) {
                    outline_rect(image, cell, 1, SELECTION_COLOUR);
                }
                registry.push_rect(
                    RegionKind::ScoreCell(FocusTarget::Adventurer(adventurer_ref)),
                    cell,
                );
            }
            y += row_height;
        }
        y
    }

    fn draw_card_stack(&self, image: &mut RgbaImage, registry: &mut RegionRegistry, top: i32) {
        let Some((_, adventurer)) = self.viewed_adventurer() else {
            return;
        };
        let cards: Vec<&Card> = adventurer
            .character_card()
            .into_iter()
            .chain(adventurer.discovery_cards())
            .collect();
        if cards.is_empty() {
            return;
        }
        let layout = self.layout;
        let width = layout.card_width as i32;
        let card_height = layout.card_height as i32;
        let header = layout.card_header as i32;
        let count = cards.len() as i32;
        let selected = self
            .session
            .selected_card_index()
            .filter(|index| *index < cards.len());
        let stack_height = match selected {
            Some(_) => card_height + count * header,
            None => card_height + (count - 1) * header,
        };
        let stack = Rect::new(layout.left_menu.x, top, width, stack_height);

        for (index, card) in cards.iter().enumerate() {
            let index = index as i32;
            let rect = match selected {
                Some(chosen) if index > chosen as i32 => Rect::new(
                    stack.x,
                    top + index * header + card_height - header,
                    width,
                    header,
                ),
                _ => Rect::new(stack.x, top + index * header, width, card_height),
            };
            fill_rect(image, rect, card_colour(card));
            outline_rect(image, rect, 1, OUTLINE_COLOUR);
        }
        if let Some(chosen) = selected {
            let chosen = chosen as i32;
            let rect = Rect::new(stack.x, top + chosen * header, width, card_height);
            fill_rect(image, rect, card_colour(cards[chosen as usize]));
            outline_rect(image, rect, 2, SELECTION_COLOUR);
            fill_rect(
                image,
                Rect::new(stack.x, stack.bottom() - header, width, header),
                MENU_COLOUR,
            );
        }

        registry.push_rect(
            RegionKind::CardStack {
                card_height: layout.card_height,
                header_height: layout.card_header,
                cards: cards.len(),
            },
            stack,
        );
    }

    /// Toggle strip at the top of the right menu. Returns its bottom edge.
    fn draw_toggle_menu(&self, image: &mut RgbaImage, registry: &mut RegionRegistry) -> i32 {
        let menu = self.layout.right_menu;
        let size = menu.width / HighlightKind::TOGGLEABLE.len() as i32;
        let strip = Rect::new(menu.x, menu.y, menu.width, size);
        let routes_marker = if self.session.draw_all_routes() {
            SELECTION_COLOUR
        } else {
            EMPTY_SLOT_COLOUR
        };
        outline_rect(image, strip, 1, routes_marker);
        registry.push_rect(RegionKind::ToggleMenu, strip);

        let own_turn_in_view = self.session.is_active()
            && self.session.viewed_player() == self.session.current_player();
        if own_turn_in_view {
            for (slot, kind) in HighlightKind::TOGGLEABLE.into_iter().enumerate() {
                let button = Rect::new(strip.x + slot as i32 * size, strip.y, size, size).inset(3);
                let colour = match self.session.toggle_state(kind) {
                    None => TOGGLE_UNSET_COLOUR,
                    Some(true) => TOGGLE_ON_COLOUR,
                    Some(false) => TOGGLE_OFF_COLOUR,
                };
                fill_rect(image, button, colour);
                outline_rect(image, button, 1, highlight_colour(kind));
                registry.push_rect(RegionKind::Toggle(kind), button);
            }
        }
        strip.bottom()
    }

    /// Chest slots of the viewed adventurer. Returns the bottom edge.
    fn draw_chest(&self, image: &mut RgbaImage, registry: &mut RegionRegistry, top: i32) -> i32 {
        let Some((adventurer_ref, adventurer)) = self.viewed_adventurer() else {
            return top;
        };
        let Some((tiles, capacity)) = adventurer.chest() else {
            return top;
        };
        if capacity == 0 {
            return top;
        }
        let layout = self.layout;
        let columns = MENU_TILE_COLUMNS;
        let size = layout.menu_tile_size as i32;
        let rows = capacity.div_ceil(columns as usize) as i32;
        let rect = Rect::new(layout.right_menu.x, top, columns as i32 * size, rows * size);
        for slot in 0..capacity {
            let slot_rect = Rect::new(
                rect.x + (slot % columns as usize) as i32 * size,
                rect.y + (slot / columns as usize) as i32 * size,
                size,
                size,
            )
            .inset(2);
            match tiles.get(slot) {
                Some(tile) => draw_tile(image, slot_rect, tile),
                None => fill_rect(image, slot_rect, EMPTY_SLOT_COLOUR),
            }
            if adventurer.preferred_tile() == Some(slot) {
                outline_rect(image, slot_rect, 2, SELECTION_COLOUR);
            }
        }
        if self.session.is_active() && self.session.current() == Some(adventurer_ref) {
            registry.push_rect(
                RegionKind::ChestMenu {
                    columns,
                    tile_size: layout.menu_tile_size,
                    capacity,
                },
                rect,
            );
        }
        rect.bottom()
    }

    fn draw_piles(&self, image: &mut RgbaImage, top: i32) {
        let menu = self.layout.right_menu;
        let size = self.layout.menu_tile_size as i32;
        let mut y = top + size / 4;
        for pile in &self.game.tile_piles {
            let full = Rect::new(menu.x + 2, y, menu.width - 4, size / 3);
            fill_rect(image, full, EMPTY_SLOT_COLOUR);
            let fill_width = if pile.capacity == 0 {
                0
            } else {
                (full.width as usize * pile.remaining.min(pile.capacity) / pile.capacity) as i32
            };
            fill_rect(
                image,
                Rect::new(full.x, full.y, fill_width, full.height),
                back_colour(pile.back),
            );
            y += size / 2;
        }
        let marker = (size / 4).max(2);
        for (index, tile) in self.game.discard_pile.iter().enumerate() {
            let x = menu.x + 2 + (index as i32 * (marker + 1)) % (menu.width - marker).max(1);
            fill_rect(image, Rect::new(x, y, marker, marker), back_colour(tile.back));
        }
    }

    fn draw_undo(&self, image: &mut RgbaImage, registry: &mut RegionRegistry, peer_undo_requested: bool) {
        let menu = self.layout.right_menu;
        let height = undo_button_height(self.layout);
        let button = Rect::new(menu.x, menu.bottom() - height, menu.width, height).inset(4);
        let colour = if self.session.undo_vote() {
            UNDO_VOTED_COLOUR
        } else if peer_undo_requested {
            UNDO_REQUESTED_COLOUR
        } else {
            UNDO_IDLE_COLOUR
        };
        fill_rect(image, button, colour);
        outline_rect(image, button, 1, OUTLINE_COLOUR);
        registry.push_rect(RegionKind::UndoButton, button);
    }

    /// One marker per move since the last rest, stacked upwards from the undo button.
    fn draw_move_count(&self, image: &mut RgbaImage) {
        let Some(moves) = self.session.moves_since_rest() else {
            return;
        };
        for marker in move_count_markers(self.layout, moves) {
            fill_rect(image, marker, MOVE_COUNT_COLOUR);
        }
    }

    /// Frames the board in the winner's colour once the game is over.
    fn draw_winner(&self, image: &mut RgbaImage) {
        let Some(winner) = self.session.winner() else {
            return;
        };
        let thickness = (3 * self.tile_border()).max(3);
        outline_rect(image, self.layout.play_area, thickness, self.player_colour(winner));
    }

    fn draw_offers(&self, image: &mut RgbaImage, registry: &mut RegionRegistry, offers: &Offers) {
        let layout = self.layout;
        let (width, height) = match offers {
            Offers::Cards(_) => (layout.card_width as i32, layout.card_height as i32),
            Offers::Tiles(_) => (layout.offer_size as i32, layout.offer_size as i32),
        };
        let count = offers.len() as i32;
        if count == 0 {
            return;
        }
        let gap = (width as f32 * OFFER_GAP_SHARE).round() as i32;
        let total = count * width + (count - 1) * gap;
        let center = layout.play_area.center();
        let origin = PixelPoint::new(center.x - total / 2, center.y - height / 2);
        for index in 0..offers.len() {
            let rect = Rect::new(origin.x + index as i32 * (width + gap), origin.y, width, height);
            match offers {
                Offers::Cards(cards) => {
                    fill_rect(image, rect, card_colour(&cards[index]));
                    registry.push_rect(RegionKind::CardOffer(index), rect);
                }
                Offers::Tiles(tiles) => {
                    draw_tile(image, rect, &tiles[index]);
                    registry.push_rect(RegionKind::TileOffer(index), rect);
                }
            }
            outline_rect(image, rect, 2, SELECTION_COLOUR);
        }
    }

    fn player_colour(&self, player: PlayerIndex) -> Colour {
        self.game
            .player(player)
            .map(|player| named_colour(&player.colour))
            .unwrap_or(TOGGLE_UNSET_COLOUR)
    }
}

fn undo_button_height(layout: &LayoutGeometry) -> i32 {
    2 * layout.fonts.scores_px as i32
}

fn move_count_markers(layout: &LayoutGeometry, moves: u32) -> Vec<Rect> {
    let menu = layout.right_menu;
    let size = (layout.menu_tile_size as i32 / 4).max(3);
    let step = size + 2;
    let per_row = ((menu.width - 8) / step).max(1);
    let base = menu.bottom() - undo_button_height(layout) - step;
    (0..moves as i32)
        .map(|index| {
            Rect::new(
                menu.x + 4 + (index % per_row) * step,
                base - (index / per_row) * step,
                size,
                size,
            )
        })
        .collect()
}

fn token_offset(adventurer: AdventurerRef) -> (f32, f32) {
    let player = PLAYER_OFFSETS[adventurer.player.0 % PLAYER_OFFSETS.len()];
    let nudge = ADVENTURER_OFFSETS[adventurer.index % ADVENTURER_OFFSETS.len()];
    (player.0 + nudge.0, player.1 + nudge.1)
}

fn draw_tile(image: &mut RgbaImage, rect: Rect, tile: &Tile) {
    let base = match tile.kind {
        TileKind::City { is_capital: true } => CAPITAL_COLOUR,
        TileKind::City { is_capital: false } => CITY_COLOUR,
        TileKind::Disaster => DISASTER_COLOUR,
        TileKind::Plain { .. } => back_colour(tile.back),
    };
    fill_rect(image, rect, base);
    let mark = (rect.width / 6).max(1);
    if matches!(tile.kind, TileKind::Plain { is_wonder: true }) {
        fill_rect(image, Rect::new(rect.center().x - mark / 2, rect.center().y - mark / 2, mark, mark), WONDER_COLOUR);
    }
    if tile.dropped_wealth > 0 {
        fill_rect(image, Rect::new(rect.x + 1, rect.y + 1, mark, mark), WEALTH_COLOUR);
    }
}

fn back_colour(back: TileBack) -> Colour {
    match back {
        TileBack::Water => WATER_TILE_COLOUR,
        TileBack::Land => LAND_TILE_COLOUR,
    }
}

fn card_colour(card: &Card) -> Colour {
    if card.card_type.starts_with("com") {
        CARD_COMPANY_COLOUR
    } else if card.card_type.starts_with("adv") {
        CARD_CHARACTER_COLOUR
    } else {
        CARD_DISCOVERY_COLOUR
    }
}

fn highlight_colour(kind: HighlightKind) -> Colour {
    match kind {
        HighlightKind::Move => [80, 220, 255, 255],
        HighlightKind::Abandon => [255, 140, 0, 255],
        HighlightKind::Invalid => [90, 90, 90, 255],
        HighlightKind::Buy => [255, 215, 0, 255],
        HighlightKind::Attack => [230, 40, 40, 255],
        HighlightKind::Rest => [60, 200, 90, 255],
        HighlightKind::BuyRest => [170, 220, 60, 255],
        HighlightKind::MoveAgent => [190, 120, 255, 255],
        HighlightKind::AgentTransfer => [240, 120, 200, 255],
    }
}

fn named_colour(name: &str) -> Colour {
    match name.to_ascii_lowercase().as_str() {
        "red" => [200, 40, 40, 255],
        "yellow" => [230, 200, 40, 255],
        "green" => [40, 160, 70, 255],
        "blue" => [40, 80, 200, 255],
        "orange" => [235, 130, 30, 255],
        "purple" => [130, 60, 170, 255],
        "black" => [20, 20, 20, 255],
        "white" => [240, 240, 240, 255],
        _ => [150, 150, 150, 255],
    }
}
