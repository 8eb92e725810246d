use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use thiserror::Error;

use crate::wire::{FrameDecoder, OutboundMessage, RawFrame, ViewerMessage, WireError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("viewer disconnected")]
    Disconnected,
    #[error("viewer i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// The only things a session needs from the link to its viewer.
pub trait ViewerTransport {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Next inbound message, or `None` when nothing has arrived yet. Never blocks.
    fn poll(&mut self) -> Result<Option<ViewerMessage>, TransportError>;
}

/// In-process transport carrying encoded frames over channels.
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: Sender<String>,
    inbound: Receiver<String>,
    decoder: FrameDecoder,
}

/// The viewer's end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelViewer {
    outbound: Sender<String>,
    inbound: Receiver<String>,
    decoder: FrameDecoder,
}

pub fn channel_pair() -> (ChannelTransport, ChannelViewer) {
    let (to_viewer, from_host) = mpsc::channel();
    let (to_host, from_viewer) = mpsc::channel();
    (
        ChannelTransport {
            outbound: to_viewer,
            inbound: from_viewer,
            decoder: FrameDecoder::new(),
        },
        ChannelViewer {
            outbound: to_host,
            inbound: from_host,
            decoder: FrameDecoder::new(),
        },
    )
}

fn next_decoded(
    decoder: &mut FrameDecoder,
    inbound: &Receiver<String>,
) -> Result<Option<RawFrame>, TransportError> {
    loop {
        if let Some(frame) = decoder.next_frame()? {
            return Ok(Some(frame));
        }
        match inbound.try_recv() {
            Ok(chunk) => decoder.push_bytes(chunk.as_bytes()),
            Err(TryRecvError::Empty) => return Ok(None),
            Err(TryRecvError::Disconnected) => return Err(TransportError::Disconnected),
        }
    }
}

impl ViewerTransport for ChannelTransport {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.outbound
            .send(message.to_frame())
            .map_err(|_| TransportError::Disconnected)
    }

    fn poll(&mut self) -> Result<Option<ViewerMessage>, TransportError> {
        match next_decoded(&mut self.decoder, &self.inbound)? {
            Some(frame) => Ok(Some(ViewerMessage::from_frame(frame)?)),
            None => Ok(None),
        }
    }
}

impl ChannelViewer {
    pub fn send(&self, message: &ViewerMessage) -> Result<(), TransportError> {
        self.outbound
            .send(message.to_frame())
            .map_err(|_| TransportError::Disconnected)
    }

    pub fn receive(&mut self) -> Result<Option<OutboundMessage>, TransportError> {
        match next_decoded(&mut self.decoder, &self.inbound)? {
            Some(frame) => Ok(Some(OutboundMessage::from_frame(frame)?)),
            None => Ok(None),
        }
    }

    /// Everything the host has sent so far.
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        while let Ok(Some(message)) = self.receive() {
            messages.push(message);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelPoint;

    #[test]
    fn messages_cross_the_channel_as_frames() {
        let (mut host, mut viewer) = channel_pair();
        host.send(&OutboundMessage::Prompt("Your move".to_string()))
            .expect("send");
        assert_eq!(
            viewer.receive().expect("receive"),
            Some(OutboundMessage::Prompt("Your move".to_string()))
        );

        viewer
            .send(&ViewerMessage::Coords(PixelPoint::new(4, 5)))
            .expect("send");
        assert_eq!(
            host.poll().expect("poll"),
            Some(ViewerMessage::Coords(PixelPoint::new(4, 5)))
        );
        assert_eq!(host.poll().expect("poll"), None);
    }

    #[test]
    fn dropped_viewer_reports_disconnect() {
        let (mut host, viewer) = channel_pair();
        drop(viewer);
        assert!(matches!(host.poll(), Err(TransportError::Disconnected)));
        assert!(matches!(
            host.send(&OutboundMessage::Prompt(String::new())),
            Err(TransportError::Disconnected)
        ));
    }
}
