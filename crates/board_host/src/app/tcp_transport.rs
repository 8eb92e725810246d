use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use board_view::{
    FrameDecoder, OutboundMessage, TransportError, ViewerMessage, ViewerTransport,
};
use tracing::{debug, info, warn};

const MAX_PENDING_IMAGE_BYTES_PER_VIEWER: usize = 8 * 1024 * 1024;
const MAX_PENDING_TEXT_BYTES_PER_VIEWER: usize = 4 * 1024 * 1024;
const READ_CHUNK_BYTES: usize = 4096;

/// Non-blocking listener handing out one transport per accepted viewer.
#[derive(Debug)]
pub(crate) struct TcpViewerListener {
    listener: TcpListener,
    bound_port: u16,
}

impl TcpViewerListener {
    pub(crate) fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let bound_port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            bound_port,
        })
    }

    pub(crate) fn bound_port(&self) -> u16 {
        self.bound_port
    }

    /// Every connection waiting in the backlog right now.
    pub(crate) fn accept_pending(&mut self) -> Vec<TcpViewerTransport> {
        let mut accepted = Vec::new();
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        warn!(error = %err, peer = %peer, "viewer_nonblocking_failed");
                        continue;
                    }
                    if let Err(err) = stream.set_nodelay(true) {
                        warn!(error = %err, peer = %peer, "viewer_nodelay_failed");
                    }
                    info!(peer = %peer, "viewer_connected");
                    accepted.push(TcpViewerTransport::new(stream, peer));
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(error = %err, "viewer_accept_failed");
                    break;
                }
            }
        }
        accepted
    }
}

/// IMAGE frames replace one another, so queued ones may be dropped; STATE and
/// PROMPT frames never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutboundClass {
    Image,
    Text,
}

#[derive(Debug)]
struct OutboundChunk {
    class: OutboundClass,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct OutboundChunkState {
    chunk: OutboundChunk,
    written: usize,
}

#[derive(Debug, Default)]
struct OutboundQueue {
    active_chunk: Option<OutboundChunkState>,
    queued_chunks: VecDeque<OutboundChunk>,
    queued_image_bytes: usize,
    queued_text_bytes: usize,
}

impl OutboundQueue {
    fn push_image(&mut self, bytes: Vec<u8>, image_cap: usize) {
        let evicted = self.evict_queued_images();
        if evicted > 0 {
            debug!(evicted, "viewer_stale_frames_dropped");
        }
        if bytes.len() > image_cap {
            warn!(bytes = bytes.len(), image_cap, "viewer_frame_over_cap_dropped");
            return;
        }
        self.queued_image_bytes = self.queued_image_bytes.saturating_add(bytes.len());
        self.queued_chunks.push_back(OutboundChunk {
            class: OutboundClass::Image,
            bytes,
        });
    }

    fn push_text(&mut self, bytes: Vec<u8>, text_cap: usize) -> io::Result<()> {
        if self.queued_text_bytes.saturating_add(bytes.len()) > text_cap {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "viewer outbound queue full",
            ));
        }
        self.queued_text_bytes = self.queued_text_bytes.saturating_add(bytes.len());
        self.queued_chunks.push_back(OutboundChunk {
            class: OutboundClass::Text,
            bytes,
        });
        Ok(())
    }

    /// Drops every image not yet started. Returns how many went.
    fn evict_queued_images(&mut self) -> usize {
        let before = self.queued_chunks.len();
        self.queued_chunks
            .retain(|chunk| chunk.class != OutboundClass::Image);
        self.queued_image_bytes = 0;
        before - self.queued_chunks.len()
    }

    fn is_empty(&self) -> bool {
        self.active_chunk.is_none() && self.queued_chunks.is_empty()
    }

    /// Writes until everything is out or the socket would block.
    fn flush<F>(&mut self, mut write_payload: F) -> io::Result<()>
    where
        F: FnMut(&[u8]) -> io::Result<usize>,
    {
        loop {
            if self.active_chunk.is_none() {
                let Some(chunk) = self.queued_chunks.pop_front() else {
                    return Ok(());
                };
                match chunk.class {
                    OutboundClass::Image => {
                        self.queued_image_bytes =
                            self.queued_image_bytes.saturating_sub(chunk.bytes.len());
                    }
                    OutboundClass::Text => {
                        self.queued_text_bytes =
                            self.queued_text_bytes.saturating_sub(chunk.bytes.len());
                    }
                }
                self.active_chunk = Some(OutboundChunkState { chunk, written: 0 });
            }

            let Some(state) = self.active_chunk.as_mut() else {
                return Ok(());
            };
            let remaining = &state.chunk.bytes[state.written..];
            match write_payload(remaining) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "viewer_write_zero",
                    ));
                }
                Ok(bytes_written) => {
                    state.written = state.written.saturating_add(bytes_written);
                    if state.written >= state.chunk.bytes.len() {
                        self.active_chunk = None;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }
}

/// One viewer's socket, speaking framed messages.
#[derive(Debug)]
pub(crate) struct TcpViewerTransport {
    stream: TcpStream,
    peer: SocketAddr,
    decoder: FrameDecoder,
    outbound: OutboundQueue,
    closed: bool,
}

impl TcpViewerTransport {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            decoder: FrameDecoder::new(),
            outbound: OutboundQueue::default(),
            closed: false,
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn flush_outbound(&mut self) -> io::Result<()> {
        let stream = &mut self.stream;
        self.outbound.flush(|payload| stream.write(payload))
    }

    fn read_available(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.closed = true;
                    return Ok(());
                }
                Ok(bytes_read) => self.decoder.push_bytes(&chunk[..bytes_read]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl ViewerTransport for TcpViewerTransport {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        let bytes = message.to_frame().into_bytes();
        match message {
            OutboundMessage::Image(_) => {
                self.outbound
                    .push_image(bytes, MAX_PENDING_IMAGE_BYTES_PER_VIEWER);
            }
            OutboundMessage::Prompt(_) | OutboundMessage::State(_) => {
                self.outbound
                    .push_text(bytes, MAX_PENDING_TEXT_BYTES_PER_VIEWER)?;
            }
        }
        self.flush_outbound()?;
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<ViewerMessage>, TransportError> {
        if !self.outbound.is_empty() {
            self.flush_outbound()?;
        }
        if !self.closed {
            self.read_available()?;
        }
        match self.decoder.next_frame()? {
            Some(frame) => Ok(Some(ViewerMessage::from_frame(frame)?)),
            None if self.closed => Err(TransportError::Disconnected),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;
    use std::thread;
    use std::time::Duration;

    use board_view::PixelPoint;

    use super::*;

    fn bound_listener() -> TcpViewerListener {
        TcpViewerListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).expect("bind")
    }

    fn accept_one(listener: &mut TcpViewerListener) -> TcpViewerTransport {
        for _ in 0..100 {
            if let Some(transport) = listener.accept_pending().pop() {
                return transport;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("no connection accepted");
    }

    fn poll_until_message(transport: &mut TcpViewerTransport) -> ViewerMessage {
        for _ in 0..200 {
            if let Some(message) = transport.poll().expect("poll") {
                return message;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("no message received");
    }

    #[test]
    fn listener_reports_the_ephemeral_port() {
        let listener = bound_listener();
        assert_ne!(listener.bound_port(), 0);
    }

    #[test]
    fn inbound_frames_split_across_writes_are_decoded() {
        let mut listener = bound_listener();
        let mut client =
            TcpStream::connect(("127.0.0.1", listener.bound_port())).expect("connect");
        let mut transport = accept_one(&mut listener);

        client.write_all(b"COORDS[7]12").expect("write");
        client.flush().expect("flush");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(transport.poll().expect("poll"), None);
        client.write_all(b"0,340QUIT[0]").expect("write");

        assert_eq!(
            poll_until_message(&mut transport),
            ViewerMessage::Coords(PixelPoint::new(120, 340))
        );
        assert_eq!(poll_until_message(&mut transport), ViewerMessage::Quit);
    }

    #[test]
    fn outbound_messages_arrive_as_frames_in_order() {
        let mut listener = bound_listener();
        let mut client =
            TcpStream::connect(("127.0.0.1", listener.bound_port())).expect("connect");
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("timeout");
        let mut transport = accept_one(&mut listener);

        transport
            .send(&OutboundMessage::State("{}".to_string()))
            .expect("send");
        transport
            .send(&OutboundMessage::Prompt("Your move".to_string()))
            .expect("send");

        let expected = b"STATE[2]{}PROMPT[9]Your move";
        let mut received = Vec::new();
        let mut chunk = [0u8; 64];
        while received.len() < expected.len() {
            let read = client.read(&mut chunk).expect("read");
            assert_ne!(read, 0, "host closed early");
            received.extend_from_slice(&chunk[..read]);
        }
        assert_eq!(&received[..], &expected[..]);
    }

    #[test]
    fn closed_client_reports_disconnect_after_buffered_frames() {
        let mut listener = bound_listener();
        let mut client =
            TcpStream::connect(("127.0.0.1", listener.bound_port())).expect("connect");
        let mut transport = accept_one(&mut listener);
        client.write_all(b"TEXT[2]42").expect("write");
        drop(client);

        assert_eq!(
            poll_until_message(&mut transport),
            ViewerMessage::Text("42".to_string())
        );
        let mut outcome = transport.poll();
        for _ in 0..100 {
            if outcome.is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
            outcome = transport.poll();
        }
        assert!(matches!(outcome, Err(TransportError::Disconnected)));
    }

    #[test]
    fn blocked_socket_keeps_active_chunk_and_order() {
        let mut queue = OutboundQueue::default();
        queue
            .push_text(b"STATE[2]{}".to_vec(), MAX_PENDING_TEXT_BYTES_PER_VIEWER)
            .expect("push");
        queue
            .push_text(b"PROMPT[0]".to_vec(), MAX_PENDING_TEXT_BYTES_PER_VIEWER)
            .expect("push");

        let mut first = true;
        queue
            .flush(|payload| {
                if first {
                    first = false;
                    Ok(payload.len().min(3))
                } else {
                    Err(io::Error::new(io::ErrorKind::WouldBlock, "blocked"))
                }
            })
            .expect("flush");

        let active = queue.active_chunk.as_ref().expect("active chunk retained");
        assert_eq!(active.written, 3);
        assert_eq!(queue.queued_chunks.len(), 1);
        assert_eq!(queue.queued_chunks[0].bytes, b"PROMPT[0]".to_vec());
    }

    #[test]
    fn newer_image_replaces_queued_stale_frames() {
        let mut queue = OutboundQueue::default();
        queue.push_image(b"IMAGE[1]a".to_vec(), MAX_PENDING_IMAGE_BYTES_PER_VIEWER);
        queue
            .push_text(b"PROMPT[0]".to_vec(), MAX_PENDING_TEXT_BYTES_PER_VIEWER)
            .expect("push");
        queue.push_image(b"IMAGE[1]b".to_vec(), MAX_PENDING_IMAGE_BYTES_PER_VIEWER);

        let classes: Vec<OutboundClass> =
            queue.queued_chunks.iter().map(|chunk| chunk.class).collect();
        assert_eq!(classes, vec![OutboundClass::Text, OutboundClass::Image]);
        assert_eq!(queue.queued_chunks[1].bytes, b"IMAGE[1]b".to_vec());
        assert_eq!(queue.queued_image_bytes, 9);
    }

    #[test]
    fn text_over_cap_is_an_error_not_a_drop() {
        let mut queue = OutboundQueue::default();
        queue.push_text(vec![b'x'; 8], 10).expect("push");
        assert!(queue.push_text(vec![b'y'; 8], 10).is_err());
        assert_eq!(queue.queued_chunks.len(), 1);
    }

    #[test]
    fn large_partial_writes_drain_the_queue() {
        let mut queue = OutboundQueue::default();
        queue.push_image(vec![b'i'; 10_000], MAX_PENDING_IMAGE_BYTES_PER_VIEWER);
        queue
            .push_text(vec![b't'; 5_000], MAX_PENDING_TEXT_BYTES_PER_VIEWER)
            .expect("push");
        let mut sink = Vec::new();
        queue
            .flush(|payload| {
                let take = payload.len().min(777);
                sink.extend_from_slice(&payload[..take]);
                Ok(take)
            })
            .expect("flush");
        assert!(queue.is_empty());
        assert_eq!(sink.len(), 15_000);
        assert_eq!(queue.queued_image_bytes, 0);
        assert_eq!(queue.queued_text_bytes, 0);
    }
}
