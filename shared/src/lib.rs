//! Shared protocol and game-rule code used by both the authoritative
//! server and the headless client.
//!
//! The wire format is a custom escaped binary framing (see [`protocol`]
//! and [`codec`]); the remaining modules hold the game rules both sides
//! must agree on: player stats, the level progression table and the
//! combat geometry used for hit detection.

pub mod codec;
pub mod combat;
pub mod levels;
pub mod packet;
pub mod protocol;
pub mod stats;

pub use codec::{DecodeResult, Decoder, EncodeError, Encoder};
pub use combat::{attack_zone, entity_bounds, knockback, Rect};
pub use packet::{ItemKind, Packet, PlayerSnapshot};
pub use protocol::{Direction, PacketFlags, PacketType};
pub use stats::PlayerStats;
