use std::thread;
use std::time::{Duration, Instant};

use board_view::{PlayerIndex, TransportError, ViewerMessage, ViewerTransport, Viewport};
use tracing::{debug, info, warn};

use super::bootstrap::HostConfig;
use super::tcp_transport::{TcpViewerListener, TcpViewerTransport};

/// Where a not-yet-seated connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeStep {
    Ready(Viewport),
    Waiting,
    Closed,
}

/// Drains what the viewer has sent so far looking for `START`. Anything else
/// before it is ignored.
pub(crate) fn poll_handshake<T: ViewerTransport>(
    transport: &mut T,
    fallback: Viewport,
) -> HandshakeStep {
    loop {
        match transport.poll() {
            Ok(Some(ViewerMessage::Start { width, height })) => {
                let viewport = if width == 0 || height == 0 {
                    fallback
                } else {
                    Viewport::new(width, height)
                };
                return HandshakeStep::Ready(viewport);
            }
            Ok(Some(ViewerMessage::Quit)) => return HandshakeStep::Closed,
            Ok(Some(other)) => debug!(message = ?other, "handshake_message_ignored"),
            Ok(None) => return HandshakeStep::Waiting,
            Err(TransportError::Wire(err)) => {
                warn!(error = %err, "handshake_frame_malformed");
            }
            Err(_) => return HandshakeStep::Closed,
        }
    }
}

struct PendingViewer {
    transport: TcpViewerTransport,
    accepted_at: Instant,
}

/// Accepts connections until `config.viewers` have sent `START` or the lobby
/// times out. Seats come back in handshake order.
pub(crate) fn gather_viewers(
    listener: &mut TcpViewerListener,
    config: &HostConfig,
) -> Vec<(TcpViewerTransport, Viewport)> {
    let lobby_deadline = Instant::now() + config.lobby_timeout();
    let handshake_timeout = config.handshake_timeout();
    let poll_interval = config.wait_config().poll_interval;
    let fallback = config.default_viewport();
    let wanted = config.viewers.max(1);

    let mut pending: Vec<PendingViewer> = Vec::new();
    let mut seated: Vec<(TcpViewerTransport, Viewport)> = Vec::new();

    while seated.len() < wanted {
        let now = Instant::now();
        if now >= lobby_deadline {
            warn!(
                seated = seated.len(),
                wanted,
                pending = pending.len(),
                "lobby_timed_out"
            );
            break;
        }

        for transport in listener.accept_pending() {
            pending.push(PendingViewer {
                transport,
                accepted_at: now,
            });
        }

        let mut still_pending = Vec::with_capacity(pending.len());
        for mut candidate in pending.drain(..) {
            let peer = candidate.transport.peer();
            match poll_handshake(&mut candidate.transport, fallback) {
                HandshakeStep::Ready(viewport) if seated.len() < wanted => {
                    info!(
                        peer = %peer,
                        seat = seated.len(),
                        width = viewport.width,
                        height = viewport.height,
                        "viewer_seated"
                    );
                    seated.push((candidate.transport, viewport));
                }
                HandshakeStep::Ready(_) => {
                    warn!(peer = %peer, "viewer_rejected_lobby_full");
                }
                HandshakeStep::Closed => {
                    warn!(peer = %peer, "viewer_closed_before_start");
                }
                HandshakeStep::Waiting
                    if handshake_expired(candidate.accepted_at, now, handshake_timeout) =>
                {
                    warn!(peer = %peer, "viewer_handshake_timed_out");
                }
                HandshakeStep::Waiting => still_pending.push(candidate),
            }
        }
        pending = still_pending;

        if seated.len() < wanted {
            thread::sleep(poll_interval);
        }
    }

    seated
}

fn handshake_expired(accepted_at: Instant, now: Instant, timeout: Duration) -> bool {
    now.saturating_duration_since(accepted_at) >= timeout
}

/// Deals players to seats round-robin. Seats beyond the player count watch only.
pub(crate) fn assign_players(seats: usize, players: usize) -> Vec<Vec<PlayerIndex>> {
    let mut assignments = vec![Vec::new(); seats];
    if seats == 0 {
        return assignments;
    }
    for player in 0..players {
        assignments[player % seats].push(PlayerIndex(player));
    }
    assignments
}

#[cfg(test)]
mod tests {
    use board_view::{channel_pair, PixelPoint};

    use super::*;

    const FALLBACK: Viewport = Viewport::new(1000, 800);

    #[test]
    fn start_message_completes_the_handshake() {
        let (mut transport, viewer) = channel_pair();
        assert_eq!(poll_handshake(&mut transport, FALLBACK), HandshakeStep::Waiting);

        viewer
            .send(&ViewerMessage::Coords(PixelPoint::new(1, 1)))
            .expect("send");
        viewer
            .send(&ViewerMessage::Start {
                width: 640,
                height: 480,
            })
            .expect("send");
        assert_eq!(
            poll_handshake(&mut transport, FALLBACK),
            HandshakeStep::Ready(Viewport::new(640, 480))
        );
    }

    #[test]
    fn zero_sized_start_uses_the_default_viewport() {
        let (mut transport, viewer) = channel_pair();
        viewer
            .send(&ViewerMessage::Start {
                width: 0,
                height: 0,
            })
            .expect("send");
        assert_eq!(
            poll_handshake(&mut transport, FALLBACK),
            HandshakeStep::Ready(FALLBACK)
        );
    }

    #[test]
    fn quit_or_dropped_viewer_closes_the_handshake() {
        let (mut transport, viewer) = channel_pair();
        viewer.send(&ViewerMessage::Quit).expect("send");
        assert_eq!(poll_handshake(&mut transport, FALLBACK), HandshakeStep::Closed);

        let (mut transport, viewer) = channel_pair();
        drop(viewer);
        assert_eq!(poll_handshake(&mut transport, FALLBACK), HandshakeStep::Closed);
    }

    #[test]
    fn players_are_dealt_round_robin() {
        assert_eq!(
            assign_players(2, 3),
            vec![
                vec![PlayerIndex(0), PlayerIndex(2)],
                vec![PlayerIndex(1)],
            ]
        );
        assert_eq!(
            assign_players(3, 2),
            vec![vec![PlayerIndex(0)], vec![PlayerIndex(1)], vec![]]
        );
        assert!(assign_players(0, 2).is_empty());
    }

    #[test]
    fn handshake_expiry_is_measured_from_accept() {
        let accepted = Instant::now();
        let timeout = Duration::from_millis(50);
        assert!(!handshake_expired(accepted, accepted, timeout));
        assert!(handshake_expired(accepted, accepted + timeout, timeout));
    }
}
