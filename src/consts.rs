//! Constants used across the SOFA MAC implementation.
//!
//! This module defines the protocol-wide constants used for frame type
//! tagging, buffer sizing, address layout and default timing.
//!
//! ## Key Concepts
//!
//! - **Frame types**: The first payload byte after the link header tags every
//!   SOFA frame. Strobes and acknowledgments carry nothing else.
//! - **Frame Limits**: Every frame built by the MAC must fit in
//!   [`SOFA_MAX_FRAME_LEN`] bytes, header included. Larger frames are never sent.
//! - **Timing**: Durations are expressed in microseconds and derived from a
//!   channel check rate (see [`TimingConfig`](crate::config::TimingConfig)).
//!
//! These values should be used wherever framing or timer logic is implemented to
//! keep both ends of an exchange in agreement.

/// Frame type of a strobe, broadcast repeatedly by an initiator.
pub const TYPE_STROBE: u8 = 1;

/// Frame type of the value pushed by the initiator (master) to the responder.
pub const TYPE_DATA_M: u8 = 2;

/// Frame type of the value returned by the responder (slave) to the initiator.
pub const TYPE_DATA_S: u8 = 3;

/// Frame type of the responder's acknowledgment of a strobe.
pub const TYPE_STROBE_ACK: u8 = 4;

/// Frame type of the initiator's final acknowledgment closing an exchange.
pub const TYPE_DATA_ACK: u8 = 5;

/// Length (in bytes) of a link-layer address.
pub const SOFA_ADDR_LEN: usize = 2;

/// Length (in bytes) of the header written by
/// [`AddressFramer`](crate::frame::AddressFramer): receiver then sender.
pub const SOFA_LINK_HEADER_LEN: usize = 2 * SOFA_ADDR_LEN;

/// Length (in bytes) of a strobe, strobe acknowledgment or data acknowledgment payload.
pub const SOFA_CONTROL_LEN: usize = 1;

/// Length (in bytes) of a data payload: type, 16-bit value, destination address.
pub const SOFA_DATA_LEN: usize = 1 + 2 + SOFA_ADDR_LEN;

/// Maximum total length (in bytes) of a frame, link header included.
///
/// Building a frame that would exceed this length is a fatal encode error.
pub const SOFA_MAX_FRAME_LEN: usize = 50;

/// Size (in bytes) of the scratch buffer inbound frames are read into.
pub const SOFA_RX_BUF_LEN: usize = 128;

/// Microseconds per second.
pub const MICROS_PER_SECOND: u32 = 1_000_000;

/// Default number of channel checks (radio wake-ups) per second.
pub const DEFAULT_CHANNEL_CHECK_RATE: u32 = 1;

/// The radio is kept on for `period / ON_TIME_DIVISOR` of every period.
pub const ON_TIME_DIVISOR: u32 = 200;

/// Peer-waiting windows last this many on-times.
pub const WAIT_ON_TIMES: u32 = 5;

/// Carrier-sense backoff lasts this many on-times.
pub const BACKOFF_ON_TIMES: u32 = 2;

/// Default chance, in percent, that a responder repeats its strobe
/// acknowledgment when it keeps hearing strobes.
pub const DEFAULT_STROBE_ACK_RETX_PERCENT: u8 = 50;
