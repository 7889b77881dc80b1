//! SOFA frame layout, link addressing and the link header boundary.
//!
//! Every SOFA frame is a link header followed by a SOFA payload:
//!
//! | Payload   | Layout                                           |
//! |-----------|--------------------------------------------------|
//! | Strobe    | `[TYPE_STROBE]`                                  |
//! | StrobeAck | `[TYPE_STROBE_ACK]`                              |
//! | DataAck   | `[TYPE_DATA_ACK]`                                |
//! | DataM/S   | `[type, value_lo, value_hi, dst_0, dst_1]`       |
//!
//! The link header itself belongs to the host stack and is produced and
//! consumed through the [`Framer`] trait. [`AddressFramer`] is a minimal
//! implementation carrying only the receiver and sender addresses.
//!
//! Frames are assembled in a fixed [`FrameBuf`] of [`SOFA_MAX_FRAME_LEN`]
//! bytes; a header and payload that do not fit are rejected whole.

use heapless::Vec;

use crate::consts::{
    SOFA_ADDR_LEN, SOFA_CONTROL_LEN, SOFA_DATA_LEN, SOFA_LINK_HEADER_LEN, SOFA_MAX_FRAME_LEN,
    TYPE_DATA_ACK, TYPE_DATA_M, TYPE_DATA_S, TYPE_STROBE, TYPE_STROBE_ACK,
};
use crate::error::MacError;

/// A fully assembled outgoing frame.
pub type FrameBuf = Vec<u8, SOFA_MAX_FRAME_LEN>;

/// Link-layer address of a node.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Address(pub [u8; SOFA_ADDR_LEN]);

impl Address {
    /// The null address, used as the receiver of broadcast frames.
    pub const NULL: Address = Address([0; SOFA_ADDR_LEN]);

    /// Builds an address from its two bytes.
    pub const fn new(hi: u8, lo: u8) -> Self {
        Address([hi, lo])
    }
}

impl From<[u8; SOFA_ADDR_LEN]> for Address {
    fn from(bytes: [u8; SOFA_ADDR_LEN]) -> Self {
        Address(bytes)
    }
}

/// Addressing fields of the link header.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct LinkHeader {
    /// Node that transmitted the frame.
    pub sender: Address,
    /// Intended receiver, or [`Address::NULL`] for broadcast.
    pub receiver: Address,
}

/// Link header encoder/decoder supplied by the host stack.
pub trait Framer {
    /// Writes the link header for `header` at the start of `buf`.
    ///
    /// Returns the header length, or `None` if the header cannot be created
    /// (e.g. it does not fit in `buf`).
    fn create(&mut self, header: &LinkHeader, buf: &mut [u8]) -> Option<usize>;

    /// Parses the link header at the start of `frame`.
    ///
    /// Returns the addressing fields and the header length, or `None` if the
    /// frame is not decodable.
    fn parse(&mut self, frame: &[u8]) -> Option<(LinkHeader, usize)>;
}

/// Minimal link header: `[receiver_0, receiver_1, sender_0, sender_1]`.
#[derive(Clone, Copy, Default, Debug)]
pub struct AddressFramer;

impl Framer for AddressFramer {
    fn create(&mut self, header: &LinkHeader, buf: &mut [u8]) -> Option<usize> {
        let out = buf.get_mut(..SOFA_LINK_HEADER_LEN)?;
        out[..SOFA_ADDR_LEN].copy_from_slice(&header.receiver.0);
        out[SOFA_ADDR_LEN..].copy_from_slice(&header.sender.0);
        Some(SOFA_LINK_HEADER_LEN)
    }

    fn parse(&mut self, frame: &[u8]) -> Option<(LinkHeader, usize)> {
        let raw = frame.get(..SOFA_LINK_HEADER_LEN)?;
        let receiver = Address([raw[0], raw[1]]);
        let sender = Address([raw[2], raw[3]]);
        Some((LinkHeader { sender, receiver }, SOFA_LINK_HEADER_LEN))
    }
}

/// A decoded SOFA payload.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Body {
    /// Rendezvous beacon from an initiator.
    Strobe,
    /// A responder answering a strobe.
    StrobeAck,
    /// The initiator closing a successful exchange.
    DataAck,
    /// The initiator's value, addressed to the responder that acked.
    DataM {
        /// Gossip value.
        value: u16,
        /// Responder the value is meant for.
        dst: Address,
    },
    /// The responder's value, addressed back to the initiator.
    DataS {
        /// Gossip value.
        value: u16,
        /// Initiator the value is meant for.
        dst: Address,
    },
    /// A payload with a type byte this protocol does not know.
    Unknown(u8),
}

impl Body {
    /// The type byte that leads this payload.
    pub const fn frame_type(&self) -> u8 {
        match self {
            Body::Strobe => TYPE_STROBE,
            Body::StrobeAck => TYPE_STROBE_ACK,
            Body::DataAck => TYPE_DATA_ACK,
            Body::DataM { .. } => TYPE_DATA_M,
            Body::DataS { .. } => TYPE_DATA_S,
            Body::Unknown(kind) => *kind,
        }
    }

    /// Decodes a payload. Returns `None` if it is empty or a data payload is truncated.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let (&kind, rest) = payload.split_first()?;
        let body = match kind {
            TYPE_STROBE => Body::Strobe,
            TYPE_STROBE_ACK => Body::StrobeAck,
            TYPE_DATA_ACK => Body::DataAck,
            TYPE_DATA_M | TYPE_DATA_S => {
                let data = rest.get(..SOFA_DATA_LEN - 1)?;
                let value = u16::from_le_bytes([data[0], data[1]]);
                let dst = Address([data[2], data[3]]);
                if kind == TYPE_DATA_M {
                    Body::DataM { value, dst }
                } else {
                    Body::DataS { value, dst }
                }
            }
            other => Body::Unknown(other),
        };
        Some(body)
    }

    /// Encodes the payload; returns the scratch bytes and how many are used.
    pub fn encode(&self) -> ([u8; SOFA_DATA_LEN], usize) {
        let mut out = [0u8; SOFA_DATA_LEN];
        out[0] = self.frame_type();
        match self {
            Body::DataM { value, dst } | Body::DataS { value, dst } => {
                out[1..3].copy_from_slice(&value.to_le_bytes());
                out[3..].copy_from_slice(&dst.0);
                (out, SOFA_DATA_LEN)
            }
            _ => (out, SOFA_CONTROL_LEN),
        }
    }
}

/// A decodable inbound frame.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Inbound {
    /// Link header addressing.
    pub header: LinkHeader,
    /// SOFA payload.
    pub body: Body,
}

impl Inbound {
    /// Parses a raw frame. `None` means the frame failed to decode.
    pub fn parse<F: Framer>(framer: &mut F, frame: &[u8]) -> Option<Self> {
        let (header, header_len) = framer.parse(frame)?;
        let body = Body::decode(frame.get(header_len..)?)?;
        Some(Inbound { header, body })
    }
}

/// Assembles a complete frame: the link header for `header`, then `body`.
///
/// # Errors
/// - [`MacError::HeaderEncode`] if the framer cannot produce a header
/// - [`MacError::FrameTooLarge`] if header and payload exceed [`SOFA_MAX_FRAME_LEN`]
pub fn build<F: Framer>(
    framer: &mut F,
    header: &LinkHeader,
    body: &Body,
) -> Result<FrameBuf, MacError> {
    let mut scratch = [0u8; SOFA_MAX_FRAME_LEN];
    let header_len = match framer.create(header, &mut scratch) {
        Some(len) if len > 0 && len <= SOFA_MAX_FRAME_LEN => len,
        _ => return Err(MacError::HeaderEncode),
    };
    let (payload, payload_len) = body.encode();
    let len = header_len + payload_len;
    let too_large = MacError::FrameTooLarge {
        len,
        max: SOFA_MAX_FRAME_LEN,
    };
    if len > SOFA_MAX_FRAME_LEN {
        return Err(too_large);
    }

    let mut frame = FrameBuf::new();
    frame
        .extend_from_slice(&scratch[..header_len])
        .map_err(|_| too_large)?;
    frame
        .extend_from_slice(&payload[..payload_len])
        .map_err(|_| too_large)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PaddedFramer(usize);

    impl Framer for PaddedFramer {
        fn create(&mut self, _header: &LinkHeader, buf: &mut [u8]) -> Option<usize> {
            buf.get_mut(..self.0)?.fill(0xaa);
            Some(self.0)
        }

        fn parse(&mut self, _frame: &[u8]) -> Option<(LinkHeader, usize)> {
            None
        }
    }

    fn header(sender: u8, receiver: u8) -> LinkHeader {
        LinkHeader {
            sender: Address::new(0, sender),
            receiver: Address::new(0, receiver),
        }
    }

    #[test]
    fn test_address_framer_layout() {
        let mut framer = AddressFramer;
        let frame = build(&mut framer, &header(1, 2), &Body::StrobeAck).unwrap();
        assert_eq!(frame.as_slice(), &[0, 2, 0, 1, TYPE_STROBE_ACK]);

        let inbound = Inbound::parse(&mut framer, &frame).unwrap();
        assert_eq!(inbound.header, header(1, 2));
        assert_eq!(inbound.body, Body::StrobeAck);
    }

    #[test]
    fn test_data_payload_is_little_endian() {
        let mut framer = AddressFramer;
        let body = Body::DataM {
            value: 0x1234,
            dst: Address::new(7, 9),
        };
        let frame = build(&mut framer, &header(1, 0), &body).unwrap();
        assert_eq!(&frame[SOFA_LINK_HEADER_LEN..], &[TYPE_DATA_M, 0x34, 0x12, 7, 9]);
        assert_eq!(Inbound::parse(&mut framer, &frame).unwrap().body, body);
    }

    #[test]
    fn test_decode_rejects_empty_and_truncated() {
        assert_eq!(Body::decode(&[]), None);
        assert_eq!(Body::decode(&[TYPE_DATA_S, 1, 2, 3]), None);
        assert_eq!(Body::decode(&[TYPE_STROBE, 0xff]), Some(Body::Strobe));
        assert_eq!(Body::decode(&[0x42]), Some(Body::Unknown(0x42)));
    }

    #[test]
    fn test_parse_rejects_short_header() {
        let mut framer = AddressFramer;
        assert!(Inbound::parse(&mut framer, &[0, 1, 0]).is_none());
        assert!(Inbound::parse(&mut framer, &[0, 1, 0, 2]).is_none());
    }

    #[test]
    fn test_build_rejects_oversized_frames() {
        let data = Body::DataS {
            value: 1,
            dst: Address::new(0, 1),
        };

        let mut framer = PaddedFramer(SOFA_MAX_FRAME_LEN - 2);
        assert!(build(&mut framer, &header(1, 0), &Body::Strobe).is_ok());
        assert_eq!(
            build(&mut framer, &header(1, 0), &data),
            Err(MacError::FrameTooLarge {
                len: SOFA_MAX_FRAME_LEN + 3,
                max: SOFA_MAX_FRAME_LEN
            })
        );

        let mut framer = PaddedFramer(SOFA_MAX_FRAME_LEN + 1);
        assert_eq!(
            build(&mut framer, &header(1, 0), &Body::Strobe),
            Err(MacError::HeaderEncode)
        );
    }
}
