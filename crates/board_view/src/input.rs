use crate::game::GridCoord;
use crate::geometry::{PixelPoint, Rect};
use crate::layout::{grid_to_pixel, pixel_to_grid};
use crate::regions::{InteractiveRegion, RegionKind, RegionRegistry};
use crate::session::{FocusChange, FocusTarget, HighlightKind, VisualSession};

/// The single meaning of one pointer click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    PreferredTile(usize),
    Focus(FocusChange),
    Toggle(HighlightKind),
    UndoVote,
    Highlight {
        kind: HighlightKind,
        cell: GridCoord,
    },
    RouteFollow {
        route: Vec<GridCoord>,
        destination: GridCoord,
    },
    Offer(usize),
    /// Inside the play area but on nothing interactive; the caller decides validity.
    Cell(GridCoord),
    NoMatch,
}

/// Resolves a click against the regions of the latest frame.
///
/// Regions overlap, so the first match in this fixed order wins: chest menu,
/// card stack, toggle menu, score cells, undo button, tokens, highlighted
/// cells, route segments. While a choice is pending only offers are live.
pub fn resolve(point: PixelPoint, registry: &RegionRegistry, session: &VisualSession) -> Resolution {
    if registry.has_offers() {
        return resolve_offer(point, registry);
    }

    let steps: [fn(PixelPoint, &RegionRegistry, &VisualSession) -> Option<Resolution>; 8] = [
        resolve_chest,
        resolve_card_stack_click,
        resolve_toggle_menu,
        resolve_score_cell,
        resolve_undo,
        resolve_token,
        resolve_highlight,
        resolve_route,
    ];
    for step in steps {
        if let Some(resolution) = step(point, registry, session) {
            return resolution;
        }
    }

    match registry.layout() {
        Some(layout) if layout.play_area.contains(point) => {
            Resolution::Cell(pixel_to_grid(layout, point))
        }
        _ => Resolution::NoMatch,
    }
}

fn resolve_offer(point: PixelPoint, registry: &RegionRegistry) -> Resolution {
    registry
        .hits(point, RegionKind::is_offer)
        .find_map(|region| match region.kind {
            RegionKind::CardOffer(index) | RegionKind::TileOffer(index) => {
                Some(Resolution::Offer(index))
            }
            _ => None,
        })
        .unwrap_or(Resolution::NoMatch)
}

fn resolve_chest(
    point: PixelPoint,
    registry: &RegionRegistry,
    _session: &VisualSession,
) -> Option<Resolution> {
    registry
        .hits(point, |kind| matches!(kind, RegionKind::ChestMenu { .. }))
        .find_map(|region| {
            let RegionKind::ChestMenu {
                columns,
                tile_size,
                capacity,
            } = region.kind
            else {
                return None;
            };
            let rect = region.shape.rect()?;
            let tile = tile_size.max(1) as i32;
            let column = ((point.x - rect.x) / tile) as usize;
            let row = ((point.y - rect.y) / tile) as usize;
            if column >= columns as usize {
                return None;
            }
            let index = row * columns as usize + column;
            (index < capacity).then_some(Resolution::PreferredTile(index))
        })
}

fn resolve_card_stack_click(
    point: PixelPoint,
    registry: &RegionRegistry,
    session: &VisualSession,
) -> Option<Resolution> {
    registry
        .hits(point, |kind| matches!(kind, RegionKind::CardStack { .. }))
        .find_map(|region| {
            let RegionKind::CardStack {
                card_height,
                header_height,
                cards,
            } = region.kind
            else {
                return None;
            };
            let stack = region.shape.rect()?;
            let selection = resolve_card_stack(
                point.y,
                stack,
                card_height as i32,
                header_height as i32,
                cards,
                session.selected_card_index(),
            );
            Some(Resolution::Focus(FocusChange::SelectCard(selection)))
        })
}

/// New card selection for a click at height `y` on a card stack.
///
/// Unselected, the stack shows every header and the last card in full. With a
/// card selected, that card is shown in full, the cards below it slide down and
/// a closing strip one header tall sits at the bottom.
pub fn resolve_card_stack(
    y: i32,
    stack: Rect,
    card_height: i32,
    header: i32,
    cards: usize,
    selected: Option<usize>,
) -> Option<usize> {
    if cards == 0 || header <= 0 {
        return None;
    }
    let last = cards - 1;
    let top = stack.y;
    let bottom = stack.bottom();

    let Some(selected) = selected.filter(|index| *index < cards) else {
        if y < bottom - card_height {
            return Some((((y - top) / header) as usize).min(last));
        }
        return Some(last);
    };

    if y >= bottom - header {
        return None;
    }
    let selected_top = top + selected as i32 * header;
    let selected_bottom = selected_top + card_height;
    if (selected_top..selected_bottom).contains(&y) {
        None
    } else if y < selected_top {
        Some(((y - top) / header) as usize)
    } else {
        let below = ((y - selected_bottom) / header) as usize;
        Some((selected + 1 + below).min(last))
    }
}

fn resolve_toggle_menu(
    point: PixelPoint,
    registry: &RegionRegistry,
    _session: &VisualSession,
) -> Option<Resolution> {
    registry
        .hits(point, |kind| matches!(kind, RegionKind::ToggleMenu))
        .next()?;
    let toggle = registry
        .hits(point, |kind| matches!(kind, RegionKind::Toggle(_)))
        .find_map(|region| match region.kind {
            RegionKind::Toggle(kind) => Some(kind),
            _ => None,
        });
    Some(match toggle {
        Some(kind) => Resolution::Toggle(kind),
        None => Resolution::Focus(FocusChange::ToggleRouteDisplay),
    })
}

fn resolve_score_cell(
    point: PixelPoint,
    registry: &RegionRegistry,
    session: &VisualSession,
) -> Option<Resolution> {
    registry
        .hits(point, |kind| matches!(kind, RegionKind::ScoreCell(_)))
        .find_map(|region| match region.kind {
            RegionKind::ScoreCell(target) if !is_already_viewed(session, target) => {
                Some(Resolution::Focus(FocusChange::View(target)))
            }
            _ => None,
        })
}

fn resolve_undo(
    point: PixelPoint,
    registry: &RegionRegistry,
    _session: &VisualSession,
) -> Option<Resolution> {
    registry
        .hits(point, |kind| matches!(kind, RegionKind::UndoButton))
        .next()
        .map(|_| Resolution::UndoVote)
}

fn resolve_token(
    point: PixelPoint,
    registry: &RegionRegistry,
    session: &VisualSession,
) -> Option<Resolution> {
    registry
        .hits(point, |kind| {
            matches!(
                kind,
                RegionKind::AdventurerToken(_) | RegionKind::AgentToken(_)
            )
        })
        .find_map(|region| {
            let target = match region.kind {
                RegionKind::AdventurerToken(adventurer) => FocusTarget::Adventurer(adventurer),
                RegionKind::AgentToken(player) => FocusTarget::Player(player),
                _ => return None,
            };
            (!is_already_viewed(session, target))
                .then_some(Resolution::Focus(FocusChange::View(target)))
        })
}

fn resolve_highlight(
    point: PixelPoint,
    registry: &RegionRegistry,
    _session: &VisualSession,
) -> Option<Resolution> {
    registry
        .hits(point, |kind| matches!(kind, RegionKind::Highlight { .. }))
        .find_map(|region| match region.kind {
            RegionKind::Highlight { kind, cell } => Some(Resolution::Highlight { kind, cell }),
            _ => None,
        })
}

fn resolve_route(
    point: PixelPoint,
    registry: &RegionRegistry,
    _session: &VisualSession,
) -> Option<Resolution> {
    let layout = registry.layout()?;
    registry
        .hits(point, |kind| matches!(kind, RegionKind::RouteSegment { .. }))
        .find_map(|region: &InteractiveRegion| {
            let RegionKind::RouteSegment { route, from, to } = region.kind else {
                return None;
            };
            let path = registry.route(route)?;
            let clicked = pixel_to_grid(layout, point);
            let destination = if path.contains(&clicked) {
                clicked
            } else if point.distance_squared(grid_to_pixel(layout, from))
                <= point.distance_squared(grid_to_pixel(layout, to))
            {
                from
            } else {
                to
            };
            Some(Resolution::RouteFollow {
                route: path.to_vec(),
                destination,
            })
        })
}

/// The part of a route that can be fast-travelled: a trailing jump back to a
/// city (an abandon step) is dropped.
pub fn followable_route(route: &[GridCoord]) -> &[GridCoord] {
    match route {
        [.., before, last] if !before.is_adjacent(*last) => &route[..route.len() - 1],
        _ => route,
    }
}

fn is_already_viewed(session: &VisualSession, target: FocusTarget) -> bool {
    match target {
        FocusTarget::Player(player) => session.viewed_player() == Some(player),
        FocusTarget::Adventurer(adventurer) => session.viewed() == Some(adventurer),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::game::{AdventurerRef, PlayerIndex};
    use crate::layout::{cell_rect, compute_layout, GridExtent, Viewport};
    use crate::regions::RegionShape;
    use crate::session::{HighlightSet, ViewerId};

    fn session() -> VisualSession {
        let mut session = VisualSession::new(ViewerId(1), vec![PlayerIndex(0)], Duration::from_secs(5));
        session.start_turn(AdventurerRef::new(0, 0));
        session
    }

    fn reference_registry() -> RegionRegistry {
        let extent = GridExtent {
            min_longitude: -2,
            max_longitude: 3,
            min_latitude: -1,
            max_latitude: 1,
        };
        let layout = compute_layout(Viewport::new(1000, 800), Some(extent), None).expect("layout");
        let mut registry = RegionRegistry::new();
        registry.begin_frame(Some(layout));
        registry
    }

    fn register_highlights(registry: &mut RegionRegistry, highlights: &HighlightSet) {
        let layout = *registry.layout().expect("layout");
        for (kind, cell) in highlights.iter() {
            registry.push_rect(RegionKind::Highlight { kind, cell }, cell_rect(&layout, cell));
        }
    }

    #[test]
    fn unhighlighted_cell_center_resolves_to_raw_cell() {
        let registry = reference_registry();
        let layout = *registry.layout().expect("layout");
        let center = grid_to_pixel(&layout, GridCoord::new(0, 0));
        assert_eq!(
            resolve(center, &registry, &session()),
            Resolution::Cell(GridCoord::new(0, 0))
        );
    }

    #[test]
    fn highlighted_cell_resolves_to_tagged_move() {
        let mut registry = reference_registry();
        let highlights = HighlightSet::from_named([("move", vec![GridCoord::new(1, 0)])]).expect("parse");
        register_highlights(&mut registry, &highlights);
        let layout = *registry.layout().expect("layout");

        let inside = cell_rect(&layout, GridCoord::new(1, 0));
        let click = PixelPoint::new(inside.x + 3, inside.bottom() - 2);
        assert_eq!(
            resolve(click, &registry, &session()),
            Resolution::Highlight {
                kind: HighlightKind::Move,
                cell: GridCoord::new(1, 0),
            }
        );

        let plain = grid_to_pixel(&layout, GridCoord::new(2, 0));
        assert_eq!(
            resolve(plain, &registry, &session()),
            Resolution::Cell(GridCoord::new(2, 0))
        );
    }

    #[test]
    fn toggle_menu_outranks_score_cell_inside_it() {
        let mut registry = reference_registry();
        let menu = Rect::new(850, 100, 150, 60);
        registry.push_rect(
            RegionKind::ScoreCell(FocusTarget::Player(PlayerIndex(1))),
            Rect::new(860, 110, 20, 20),
        );
        registry.push_rect(RegionKind::ToggleMenu, menu);
        registry.push_rect(RegionKind::Toggle(HighlightKind::Buy), Rect::new(855, 105, 30, 30));

        let on_toggle = PixelPoint::new(865, 115);
        assert_eq!(
            resolve(on_toggle, &registry, &session()),
            Resolution::Toggle(HighlightKind::Buy)
        );
        let elsewhere_in_menu = PixelPoint::new(950, 150);
        assert_eq!(
            resolve(elsewhere_in_menu, &registry, &session()),
            Resolution::Focus(FocusChange::ToggleRouteDisplay)
        );
    }

    #[test]
    fn score_cell_outranks_undo_and_highlight() {
        let mut registry = reference_registry();
        let rect = Rect::new(300, 300, 50, 50);
        registry.push_rect(
            RegionKind::Highlight {
                kind: HighlightKind::Attack,
                cell: GridCoord::new(0, 0),
            },
            rect,
        );
        registry.push_rect(RegionKind::UndoButton, rect);
        registry.push_rect(
            RegionKind::ScoreCell(FocusTarget::Adventurer(AdventurerRef::new(1, 0))),
            rect,
        );
        assert_eq!(
            resolve(PixelPoint::new(310, 310), &registry, &session()),
            Resolution::Focus(FocusChange::View(FocusTarget::Adventurer(AdventurerRef::new(1, 0))))
        );
    }

    #[test]
    fn undo_outranks_tokens_and_tokens_outrank_highlights() {
        let mut registry = reference_registry();
        let center = PixelPoint::new(400, 400);
        registry.push_rect(
            RegionKind::Highlight {
                kind: HighlightKind::Move,
                cell: GridCoord::new(0, 0),
            },
            Rect::new(380, 380, 40, 40),
        );
        registry.push(
            RegionKind::AdventurerToken(AdventurerRef::new(1, 0)),
            RegionShape::Circle { center, radius: 10 },
        );
        assert_eq!(
            resolve(center, &registry, &session()),
            Resolution::Focus(FocusChange::View(FocusTarget::Adventurer(AdventurerRef::new(1, 0))))
        );

        registry.push_rect(RegionKind::UndoButton, Rect::new(390, 390, 20, 20));
        assert_eq!(resolve(center, &registry, &session()), Resolution::UndoVote);
    }

    #[test]
    fn viewed_adventurer_token_falls_through_to_highlight() {
        let mut registry = reference_registry();
        let center = PixelPoint::new(400, 400);
        registry.push(
            RegionKind::AdventurerToken(AdventurerRef::new(0, 0)),
            RegionShape::Circle { center, radius: 10 },
        );
        registry.push_rect(
            RegionKind::Highlight {
                kind: HighlightKind::Rest,
                cell: GridCoord::new(0, 0),
            },
            Rect::new(380, 380, 40, 40),
        );
        assert_eq!(
            resolve(center, &registry, &session()),
            Resolution::Highlight {
                kind: HighlightKind::Rest,
                cell: GridCoord::new(0, 0),
            }
        );
    }

    #[test]
    fn chest_menu_outranks_card_stack() {
        let mut registry = reference_registry();
        registry.push_rect(
            RegionKind::CardStack {
                card_height: 100,
                header_height: 15,
                cards: 3,
            },
            Rect::new(850, 0, 150, 130),
        );
        registry.push_rect(
            RegionKind::ChestMenu {
                columns: 2,
                tile_size: 75,
                capacity: 3,
            },
            Rect::new(850, 0, 150, 150),
        );
        assert_eq!(
            resolve(PixelPoint::new(930, 30), &registry, &session()),
            Resolution::PreferredTile(1)
        );
        assert_eq!(
            resolve(PixelPoint::new(870, 100), &registry, &session()),
            Resolution::PreferredTile(2)
        );
        // fourth slot is past capacity, so the card stack gets the click
        assert_eq!(
            resolve(PixelPoint::new(940, 100), &registry, &session()),
            Resolution::Focus(FocusChange::SelectCard(Some(2)))
        );
    }

    #[test]
    fn offers_take_exclusive_priority() {
        let mut registry = reference_registry();
        registry.push_rect(RegionKind::UndoButton, Rect::new(0, 0, 100, 100));
        registry.push_rect(RegionKind::CardOffer(1), Rect::new(50, 50, 100, 100));
        assert_eq!(
            resolve(PixelPoint::new(60, 60), &registry, &session()),
            Resolution::Offer(1)
        );
        assert_eq!(
            resolve(PixelPoint::new(10, 10), &registry, &session()),
            Resolution::NoMatch
        );
    }

    #[test]
    fn clicks_outside_play_area_without_regions_do_not_match() {
        let registry = reference_registry();
        assert_eq!(
            resolve(PixelPoint::new(20, 20), &registry, &session()),
            Resolution::NoMatch
        );
        assert_eq!(
            resolve(PixelPoint::new(20, 20), &RegionRegistry::new(), &session()),
            Resolution::NoMatch
        );
    }

    #[test]
    fn card_stack_without_selection_selects_by_header() {
        // three cards: headers at 0..15, 15..30, last card body 30..130
        let stack = Rect::new(0, 0, 100, 130);
        assert_eq!(resolve_card_stack(5, stack, 100, 15, 3, None), Some(0));
        assert_eq!(resolve_card_stack(20, stack, 100, 15, 3, None), Some(1));
        assert_eq!(resolve_card_stack(90, stack, 100, 15, 3, None), Some(2));
        assert_eq!(resolve_card_stack(5, stack, 100, 15, 0, None), None);
    }

    #[test]
    fn card_stack_with_selection_handles_band_above_below_and_tail() {
        // selected card 1 of 4: header 0..15, card 1 body 15..115, card 2 header
        // 115..130, card 3 header 130..145, closing strip 145..160
        let stack = Rect::new(0, 0, 100, 160);
        let selected = Some(1);
        assert_eq!(resolve_card_stack(50, stack, 100, 15, 4, selected), None);
        assert_eq!(resolve_card_stack(5, stack, 100, 15, 4, selected), Some(0));
        assert_eq!(resolve_card_stack(120, stack, 100, 15, 4, selected), Some(2));
        assert_eq!(resolve_card_stack(135, stack, 100, 15, 4, selected), Some(3));
        assert_eq!(resolve_card_stack(150, stack, 100, 15, 4, selected), None);
    }

    #[test]
    fn route_follow_drops_trailing_abandon_and_snaps_destination() {
        let mut registry = reference_registry();
        let layout = *registry.layout().expect("layout");
        let full = vec![
            GridCoord::new(0, 0),
            GridCoord::new(1, 0),
            GridCoord::new(2, 0),
            GridCoord::new(-2, -1),
        ];
        let path = followable_route(&full).to_vec();
        assert_eq!(path.len(), 3);
        let route = registry.add_route(path.clone());
        let from = GridCoord::new(1, 0);
        let to = GridCoord::new(2, 0);
        registry.push(
            RegionKind::RouteSegment { route, from, to },
            RegionShape::Segment {
                from: grid_to_pixel(&layout, from),
                to: grid_to_pixel(&layout, to),
                tolerance: 4,
            },
        );

        let on_segment = grid_to_pixel(&layout, to);
        assert_eq!(
            resolve(on_segment, &registry, &session()),
            Resolution::RouteFollow {
                route: path,
                destination: to,
            }
        );
    }

    #[test]
    fn followable_route_keeps_adjacent_steps() {
        let route = [GridCoord::new(0, 0), GridCoord::new(0, 1)];
        assert_eq!(followable_route(&route), &route);
        assert!(followable_route(&[]).is_empty());
    }
}
