//! Byte-level protocol definition: frame markers, escape substitutions,
//! packet type codes, optional-field flags and world coordinate bounds.
//!
//! Every frame on the wire is `START, type, flags, payload…, END` with
//! the interior bytes escaped so the marker values never appear inside
//! a frame. The constants here are the compatibility-critical surface;
//! the actual framing lives in [`crate::codec`].

use bitflags::bitflags;

pub const PACKET_START: u8 = 0xFF;
pub const PACKET_END: u8 = 0x00;
pub const ESCAPE_CHAR: u8 = 0x7D;
pub const ESCAPED_START: u8 = 0xFE;
pub const ESCAPED_END: u8 = 0x01;
pub const ESCAPED_ESCAPE: u8 = 0x02;

pub const WORLD_WIDTH: u16 = 4800;
pub const WORLD_HEIGHT: u16 = 3600;
pub const ENTITY_SIZE: u16 = 48;

pub const MIN_X: u16 = 0;
pub const MAX_X: u16 = WORLD_WIDTH - ENTITY_SIZE;
pub const MIN_Y: u16 = 0;
pub const MAX_Y: u16 = WORLD_HEIGHT - ENTITY_SIZE;

pub const MAX_PLAYERS: usize = 100;
pub const MAX_LEVEL: u8 = 100;
pub const ATTACK_RANGE: i32 = 58;
pub const MAX_ITEM_NAME_LEN: usize = 20;

/// Packet type codes, one per frame kind. The codes form a contiguous
/// range; anything outside it is an invalid frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Handshake = 0x01,
    PlayerUpdate = 0x02,
    Attack = 0x03,
    PlayerHit = 0x04,
    WorldState = 0x05,
    PlayerJoin = 0x06,
    PlayerLeave = 0x07,
    PlayerDamage = 0x08,
    PlayerDeath = 0x09,
    ItemPickup = 0x0A,
    ItemRemove = 0x0B,
    PlayerExperience = 0x0C,
}

impl PacketType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Handshake),
            0x02 => Some(Self::PlayerUpdate),
            0x03 => Some(Self::Attack),
            0x04 => Some(Self::PlayerHit),
            0x05 => Some(Self::WorldState),
            0x06 => Some(Self::PlayerJoin),
            0x07 => Some(Self::PlayerLeave),
            0x08 => Some(Self::PlayerDamage),
            0x09 => Some(Self::PlayerDeath),
            0x0A => Some(Self::ItemPickup),
            0x0B => Some(Self::ItemRemove),
            0x0C => Some(Self::PlayerExperience),
            _ => None,
        }
    }

    /// Minimum unescaped frame length for this type, markers included.
    /// Used as a cheap structural pre-check before field parsing.
    pub fn min_frame_len(self) -> usize {
        match self {
            Self::Handshake => 12,
            Self::PlayerUpdate => 6,
            Self::Attack => 11,
            Self::PlayerHit => 12,
            Self::WorldState => 5,
            Self::PlayerJoin => 17,
            Self::PlayerLeave => 6,
            Self::PlayerDamage => 14,
            Self::PlayerDeath => 6,
            Self::ItemPickup => 15,
            Self::ItemRemove => 6,
            Self::PlayerExperience => 11,
        }
    }
}

bitflags! {
    /// Per-packet bitmask selecting which optional fields were
    /// serialized. A field is on the wire iff its bit is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PacketFlags: u8 {
        const POSITION = 0x01;
        const DIRECTION = 0x02;
        const HEALTH_EXTENDED = 0x08;
        const LEVEL = 0x10;
        const MAX_HEALTH = 0x20;
        const SPRITE_FRAME = 0x40;
    }
}

/// Four-way facing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    #[default]
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Direction {
    /// Unknown bytes decode as `Down`, matching the historical wire
    /// behavior of lenient clients.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Up,
            2 => Self::Left,
            3 => Self::Right,
            _ => Self::Down,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Cheap structural pre-filter: marker bytes in place and a known type
/// code. Field-level validation happens during parsing.
pub fn is_valid_frame(frame: &[u8]) -> bool {
    frame.len() >= 4
        && frame[0] == PACKET_START
        && frame[frame.len() - 1] == PACKET_END
        && PacketType::from_byte(frame[1]).is_some()
}

/// True iff an entity at (x, y) lies fully inside the world rectangle.
pub fn validate_coordinates(x: u16, y: u16) -> bool {
    x <= MAX_X && y <= MAX_Y
}
