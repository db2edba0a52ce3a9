//! The structured packet model: one tagged variant per frame type,
//! carrying only the fields relevant to that type. Optional fields are
//! `Option`s whose presence on the wire is mirrored by a flag bit.

use crate::protocol::{Direction, PacketType};
use crate::stats::PlayerStats;

/// Collectible kinds, resolved from the wire name at decode time so the
/// rest of the code can match exhaustively instead of comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Sword,
    Key,
    Door,
    Shield,
}

impl ItemKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sword => "Sword",
            Self::Key => "Key",
            Self::Door => "Door",
            Self::Shield => "Shield",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Sword" => Some(Self::Sword),
            "Key" => Some(Self::Key),
            "Door" => Some(Self::Door),
            "Shield" => Some(Self::Shield),
            _ => None,
        }
    }
}

/// One player's tuple inside a WorldState snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub id: u16,
    pub x: u16,
    pub y: u16,
    pub direction: Direction,
    pub health: u16,
    pub max_health: u16,
    pub level: u8,
    pub damage: u16,
    pub experience: u16,
    pub experience_to_next_level: u16,
    pub sprite_frame: u8,
    pub dead: bool,
}

/// A decoded wire packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Server -> new client: assigned id plus initial stats.
    Handshake { player_id: u16, stats: PlayerStats },
    /// Position/direction/sprite update; each field flag-gated.
    PlayerUpdate {
        player_id: u16,
        position: Option<(u16, u16)>,
        direction: Option<Direction>,
        sprite_frame: Option<u8>,
    },
    /// Client swing, relayed to everyone for animation.
    Attack {
        player_id: u16,
        direction: Direction,
        x: u16,
        y: u16,
    },
    /// Targeted knockback reconciliation for one hit player.
    PlayerHit {
        attacker_id: u16,
        target_id: u16,
        push_x: u16,
        push_y: u16,
    },
    /// Periodic snapshot of every tracked player.
    WorldState { players: Vec<PlayerSnapshot> },
    PlayerJoin {
        player_id: u16,
        x: u16,
        y: u16,
        direction: Direction,
        stats: PlayerStats,
    },
    PlayerLeave { player_id: u16 },
    PlayerDamage {
        attacker_id: u16,
        target_id: u16,
        damage: u16,
        health: u16,
        max_health: u16,
        level: u8,
    },
    PlayerDeath { player_id: u16, killer_id: u16 },
    /// Server -> clients: item announcement (player id 0) or pickup
    /// confirmation; client -> server: pickup request.
    ItemPickup {
        player_id: u16,
        item_id: u16,
        kind: ItemKind,
        x: u16,
        y: u16,
        experience_reward: u16,
    },
    ItemRemove { item_id: u16 },
    PlayerExperience {
        player_id: u16,
        experience: u16,
        experience_to_next_level: u16,
        level: u8,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Handshake { .. } => PacketType::Handshake,
            Self::PlayerUpdate { .. } => PacketType::PlayerUpdate,
            Self::Attack { .. } => PacketType::Attack,
            Self::PlayerHit { .. } => PacketType::PlayerHit,
            Self::WorldState { .. } => PacketType::WorldState,
            Self::PlayerJoin { .. } => PacketType::PlayerJoin,
            Self::PlayerLeave { .. } => PacketType::PlayerLeave,
            Self::PlayerDamage { .. } => PacketType::PlayerDamage,
            Self::PlayerDeath { .. } => PacketType::PlayerDeath,
            Self::ItemPickup { .. } => PacketType::ItemPickup,
            Self::ItemRemove { .. } => PacketType::ItemRemove,
            Self::PlayerExperience { .. } => PacketType::PlayerExperience,
        }
    }
}
