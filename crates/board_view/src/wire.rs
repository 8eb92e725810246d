//! Framed messages exchanged with a remote viewer: `TAG[len]payload`, where
//! `len` is the payload length in bytes.

use thiserror::Error;

use crate::geometry::PixelPoint;
use crate::layout::MAX_VIEWPORT_PX;

pub const IMAGE_TAG: &str = "IMAGE";
pub const PROMPT_TAG: &str = "PROMPT";
pub const STATE_TAG: &str = "STATE";
pub const START_TAG: &str = "START";
pub const COORDS_TAG: &str = "COORDS";
pub const TEXT_TAG: &str = "TEXT";
pub const RESIZE_TAG: &str = "RESIZE";
pub const QUIT_TAG: &str = "QUIT";

const MAX_TAG_LEN: usize = 16;
const MAX_LENGTH_DIGITS: usize = 12;
/// Largest payload a frame may declare. Covers a full-size base64 IMAGE.
pub const MAX_PAYLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("frame tag '{0}' is not an uppercase ASCII word")]
    BadTag(String),
    #[error("frame length field '{0}' is not a decimal number within the payload limit")]
    BadLength(String),
    #[error("frame payload for {tag} is not valid UTF-8")]
    InvalidUtf8 { tag: String },
    #[error("unknown {direction} frame tag '{tag}'")]
    UnknownTag {
        direction: &'static str,
        tag: String,
    },
    #[error("malformed {tag} payload '{payload}'")]
    BadPayload { tag: &'static str, payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub tag: String,
    pub payload: String,
}

/// Host to viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Base64 PNG of the whole frame; replaces whatever was shown before.
    Image(String),
    Prompt(String),
    /// JSON state snapshot.
    State(String),
}

/// Viewer to host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerMessage {
    Start { width: u32, height: u32 },
    Coords(PixelPoint),
    Text(String),
    Resize { width: u32, height: u32 },
    Quit,
}

pub fn encode_frame(tag: &str, payload: &str) -> String {
    format!("{tag}[{}]{payload}", payload.len())
}

impl OutboundMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Image(_) => IMAGE_TAG,
            Self::Prompt(_) => PROMPT_TAG,
            Self::State(_) => STATE_TAG,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Self::Image(payload) | Self::Prompt(payload) | Self::State(payload) => payload,
        }
    }

    pub fn to_frame(&self) -> String {
        encode_frame(self.tag(), self.payload())
    }

    pub fn from_frame(frame: RawFrame) -> Result<Self, WireError> {
        match frame.tag.as_str() {
            IMAGE_TAG => Ok(Self::Image(frame.payload)),
            PROMPT_TAG => Ok(Self::Prompt(frame.payload)),
            STATE_TAG => Ok(Self::State(frame.payload)),
            _ => Err(WireError::UnknownTag {
                direction: "outbound",
                tag: frame.tag,
            }),
        }
    }
}

impl ViewerMessage {
    pub fn to_frame(&self) -> String {
        match self {
            Self::Start { width, height } => encode_frame(START_TAG, &format!("{width},{height}")),
            Self::Coords(point) => encode_frame(COORDS_TAG, &format!("{},{}", point.x, point.y)),
            Self::Text(text) => encode_frame(TEXT_TAG, text),
            Self::Resize { width, height } => {
                encode_frame(RESIZE_TAG, &format!("{width},{height}"))
            }
            Self::Quit => encode_frame(QUIT_TAG, ""),
        }
    }

    pub fn from_frame(frame: RawFrame) -> Result<Self, WireError> {
        match frame.tag.as_str() {
            START_TAG => {
                let (width, height) = parse_size(START_TAG, &frame.payload)?;
                Ok(Self::Start { width, height })
            }
            COORDS_TAG => {
                let (x, y) = parse_pair::<i32>(COORDS_TAG, &frame.payload)?;
                Ok(Self::Coords(PixelPoint::new(x, y)))
            }
            TEXT_TAG => Ok(Self::Text(frame.payload)),
            RESIZE_TAG => {
                let (width, height) = parse_size(RESIZE_TAG, &frame.payload)?;
                Ok(Self::Resize { width, height })
            }
            QUIT_TAG => Ok(Self::Quit),
            _ => Err(WireError::UnknownTag {
                direction: "inbound",
                tag: frame.tag,
            }),
        }
    }
}

fn parse_pair<T: std::str::FromStr>(tag: &'static str, payload: &str) -> Result<(T, T), WireError> {
    let bad = || WireError::BadPayload {
        tag,
        payload: payload.to_string(),
    };
    let (first, second) = payload.split_once(',').ok_or_else(bad)?;
    let first = first.trim().parse::<T>().map_err(|_| bad())?;
    let second = second.trim().parse::<T>().map_err(|_| bad())?;
    Ok((first, second))
}

fn parse_size(tag: &'static str, payload: &str) -> Result<(u32, u32), WireError> {
    let (width, height) = parse_pair::<u32>(tag, payload)?;
    if width > MAX_VIEWPORT_PX || height > MAX_VIEWPORT_PX {
        return Err(WireError::BadPayload {
            tag,
            payload: payload.to_string(),
        });
    }
    Ok((width, height))
}

/// Incremental frame parser over a byte stream. Partial frames stay buffered
/// until the rest arrives; after a malformed header the buffer is discarded,
/// since there is no way to find the next frame boundary.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, WireError> {
        match self.parse_head() {
            Ok(Some((tag, header_len, payload_len))) => {
                let total = header_len + payload_len;
                if self.buffer.len() < total {
                    return Ok(None);
                }
                let frame_bytes = self.buffer.drain(..total).collect::<Vec<u8>>();
                let payload = String::from_utf8(frame_bytes[header_len..].to_vec())
                    .map_err(|_| WireError::InvalidUtf8 { tag: tag.clone() })?;
                Ok(Some(RawFrame { tag, payload }))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.buffer.clear();
                Err(err)
            }
        }
    }

    /// Tag, header length in bytes, and declared payload length.
    fn parse_head(&self) -> Result<Option<(String, usize, usize)>, WireError> {
        let Some(open) = self.buffer.iter().position(|byte| *byte == b'[') else {
            if self.buffer.len() > MAX_TAG_LEN {
                return Err(WireError::BadTag(lossy_prefix(&self.buffer, MAX_TAG_LEN)));
            }
            return Ok(None);
        };
        let tag_bytes = &self.buffer[..open];
        if tag_bytes.is_empty()
            || tag_bytes.len() > MAX_TAG_LEN
            || !tag_bytes.iter().all(u8::is_ascii_uppercase)
        {
            return Err(WireError::BadTag(lossy_prefix(tag_bytes, MAX_TAG_LEN)));
        }
        let tag = String::from_utf8_lossy(tag_bytes).into_owned();

        let rest = &self.buffer[open + 1..];
        let Some(close) = rest.iter().position(|byte| *byte == b']') else {
            if rest.len() > MAX_LENGTH_DIGITS || !rest.iter().all(u8::is_ascii_digit) {
                return Err(WireError::BadLength(lossy_prefix(rest, MAX_LENGTH_DIGITS)));
            }
            return Ok(None);
        };
        let digits = &rest[..close];
        let length_text = String::from_utf8_lossy(digits).into_owned();
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(WireError::BadLength(length_text));
        }
        let payload_len = length_text
            .parse::<usize>()
            .ok()
            .filter(|len| *len <= MAX_PAYLOAD_BYTES)
            .ok_or_else(|| WireError::BadLength(length_text.clone()))?;
        Ok(Some((tag, open + 1 + close + 1, payload_len)))
    }
}

fn lossy_prefix(bytes: &[u8], max: usize) -> String {
    String::from_utf8_lossy(&bytes[..bytes.len().min(max)]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_length_counts_bytes_not_chars() {
        assert_eq!(encode_frame("PROMPT", "héllo"), "PROMPT[6]héllo");
        assert_eq!(OutboundMessage::Image(String::new()).to_frame(), "IMAGE[0]");
    }

    #[test]
    fn decoder_waits_for_partial_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"COORDS[7]12");
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.push_bytes(b"3,456TEXT[1]");
        let frame = decoder.next_frame().expect("decode").expect("frame");
        assert_eq!(
            ViewerMessage::from_frame(frame),
            Ok(ViewerMessage::Coords(PixelPoint::new(123, 456)))
        );
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.push_bytes(b"7");
        let frame = decoder.next_frame().expect("decode").expect("frame");
        assert_eq!(
            ViewerMessage::from_frame(frame),
            Ok(ViewerMessage::Text("7".to_string()))
        );
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn decoder_splits_multibyte_payload_across_pushes() {
        let mut decoder = FrameDecoder::new();
        let bytes = encode_frame("PROMPT", "naïve").into_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 3);
        decoder.push_bytes(head);
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.push_bytes(tail);
        let frame = decoder.next_frame().expect("decode").expect("frame");
        assert_eq!(frame.payload, "naïve");
    }

    #[test]
    fn malformed_header_is_reported_and_buffer_dropped() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"coords[3]1,2");
        assert!(matches!(decoder.next_frame(), Err(WireError::BadTag(_))));
        assert_eq!(decoder.buffered_len(), 0);

        decoder.push_bytes(b"TEXT[x1]a");
        assert!(matches!(decoder.next_frame(), Err(WireError::BadLength(_))));
    }

    #[test]
    fn oversized_declared_length_is_rejected_before_buffering() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"TEXT[999999999999]");
        assert_eq!(
            decoder.next_frame(),
            Err(WireError::BadLength("999999999999".to_string()))
        );
        assert_eq!(decoder.buffered_len(), 0);

        decoder.push_bytes(format!("TEXT[{}]", MAX_PAYLOAD_BYTES + 1).as_bytes());
        assert!(matches!(decoder.next_frame(), Err(WireError::BadLength(_))));
        decoder.push_bytes(b"TEXT[2]ok");
        let frame = decoder.next_frame().expect("decode").expect("frame");
        assert_eq!(frame.payload, "ok");
    }

    #[test]
    fn oversized_viewport_sizes_are_bad_payloads() {
        let frame = RawFrame {
            tag: RESIZE_TAG.to_string(),
            payload: format!("{},{}", u32::MAX, u32::MAX),
        };
        assert!(matches!(
            ViewerMessage::from_frame(frame),
            Err(WireError::BadPayload { tag: "RESIZE", .. })
        ));
        let frame = RawFrame {
            tag: START_TAG.to_string(),
            payload: format!("{MAX_VIEWPORT_PX},{MAX_VIEWPORT_PX}"),
        };
        assert!(ViewerMessage::from_frame(frame).is_ok());
    }

    #[test]
    fn inbound_messages_parse_from_frames() {
        for message in [
            ViewerMessage::Start {
                width: 1000,
                height: 800,
            },
            ViewerMessage::Resize {
                width: 640,
                height: 480,
            },
            ViewerMessage::Quit,
        ] {
            let mut decoder = FrameDecoder::new();
            decoder.push_bytes(message.to_frame().as_bytes());
            let frame = decoder.next_frame().expect("decode").expect("frame");
            assert_eq!(ViewerMessage::from_frame(frame), Ok(message));
        }
    }

    #[test]
    fn bad_coordinates_and_unknown_tags_are_errors() {
        let frame = RawFrame {
            tag: COORDS_TAG.to_string(),
            payload: "12;40".to_string(),
        };
        assert!(matches!(
            ViewerMessage::from_frame(frame),
            Err(WireError::BadPayload { tag: "COORDS", .. })
        ));
        let frame = RawFrame {
            tag: "PING".to_string(),
            payload: String::new(),
        };
        assert!(matches!(
            ViewerMessage::from_frame(frame),
            Err(WireError::UnknownTag { .. })
        ));
    }
}
