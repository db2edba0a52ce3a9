//! Symmetric frame codec: [`Encoder`] turns structured packets into
//! escaped `START … END` frames, [`Decoder`] reassembles packets from an
//! unstructured byte stream that may deliver partial frames, several
//! frames at once, or frames split mid-escape-sequence.
//!
//! All multi-byte numeric fields are big-endian unsigned: coordinates,
//! health, damage and experience are 16-bit; level, direction, sprite
//! frame and small counts are 8-bit.

use thiserror::Error;

use crate::packet::{ItemKind, Packet, PlayerSnapshot};
use crate::protocol::{
    is_valid_frame, validate_coordinates, Direction, PacketFlags, PacketType, ESCAPED_END,
    ESCAPED_ESCAPE, ESCAPED_START, ESCAPE_CHAR, MAX_ITEM_NAME_LEN, MAX_PLAYERS, PACKET_END,
    PACKET_START,
};
use crate::stats::PlayerStats;

/// Validation failure detected before any bytes are produced.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("coordinates out of world bounds: ({x}, {y})")]
    InvalidCoordinates { x: u16, y: u16 },
    #[error("item name is {len} bytes, limit is {limit}")]
    ItemNameTooLong { len: usize, limit: usize },
}

fn check_coordinates(x: u16, y: u16) -> Result<(), EncodeError> {
    if validate_coordinates(x, y) {
        Ok(())
    } else {
        Err(EncodeError::InvalidCoordinates { x, y })
    }
}

/// Builds escaped frames. Keeps a reusable scratch buffer so the hot
/// per-tick update path does not reallocate the unescaped frame.
#[derive(Debug, Default)]
pub struct Encoder {
    scratch: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&mut self, ty: PacketType, flags: PacketFlags) {
        self.scratch.clear();
        self.scratch.push(PACKET_START);
        self.scratch.push(ty as u8);
        self.scratch.push(flags.bits());
    }

    fn put_u8(&mut self, value: u8) {
        self.scratch.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.scratch.extend_from_slice(&value.to_be_bytes());
    }

    fn put_stats(&mut self, stats: &PlayerStats) {
        self.put_u16(stats.health);
        self.put_u16(stats.max_health);
        self.put_u16(stats.damage);
        self.put_u8(stats.level);
        self.put_u16(stats.experience);
        self.put_u16(stats.experience_to_next_level);
    }

    /// Terminates the frame and escapes the interior: every literal
    /// START/END/ESCAPE byte strictly between the markers becomes a
    /// two-byte escape sequence.
    fn finish(&mut self) -> Vec<u8> {
        self.scratch.push(PACKET_END);
        let raw = &self.scratch;
        let mut out = Vec::with_capacity(raw.len() + 8);
        out.push(raw[0]);
        for &b in &raw[1..raw.len() - 1] {
            match b {
                PACKET_START => out.extend_from_slice(&[ESCAPE_CHAR, ESCAPED_START]),
                PACKET_END => out.extend_from_slice(&[ESCAPE_CHAR, ESCAPED_END]),
                ESCAPE_CHAR => out.extend_from_slice(&[ESCAPE_CHAR, ESCAPED_ESCAPE]),
                _ => out.push(b),
            }
        }
        out.push(raw[raw.len() - 1]);
        out
    }

    pub fn encode_handshake(&mut self, player_id: u16, stats: &PlayerStats) -> Result<Vec<u8>, EncodeError> {
        self.begin(
            PacketType::Handshake,
            PacketFlags::HEALTH_EXTENDED | PacketFlags::LEVEL | PacketFlags::MAX_HEALTH,
        );
        self.put_u16(player_id);
        self.put_stats(stats);
        Ok(self.finish())
    }

    pub fn encode_player_update(
        &mut self,
        player_id: u16,
        position: Option<(u16, u16)>,
        direction: Option<Direction>,
        sprite_frame: Option<u8>,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut flags = PacketFlags::empty();
        if let Some((x, y)) = position {
            check_coordinates(x, y)?;
            flags |= PacketFlags::POSITION;
        }
        if direction.is_some() {
            flags |= PacketFlags::DIRECTION;
        }
        // A zero sprite frame is not serialized.
        if matches!(sprite_frame, Some(frame) if frame > 0) {
            flags |= PacketFlags::SPRITE_FRAME;
        }

        self.begin(PacketType::PlayerUpdate, flags);
        self.put_u16(player_id);
        if let Some((x, y)) = position {
            self.put_u16(x);
            self.put_u16(y);
        }
        if let Some(direction) = direction {
            self.put_u8(direction.as_byte());
        }
        if flags.contains(PacketFlags::SPRITE_FRAME) {
            self.put_u8(sprite_frame.unwrap_or(1));
        }
        Ok(self.finish())
    }

    /// Hot-path update encoder: all three optional fields present, no
    /// branching on flag combinations.
    pub fn fast_player_update(
        &mut self,
        player_id: u16,
        x: u16,
        y: u16,
        direction: Direction,
        sprite_frame: u8,
    ) -> Option<Vec<u8>> {
        if !validate_coordinates(x, y) {
            return None;
        }
        self.begin(
            PacketType::PlayerUpdate,
            PacketFlags::POSITION | PacketFlags::DIRECTION | PacketFlags::SPRITE_FRAME,
        );
        self.put_u16(player_id);
        self.put_u16(x);
        self.put_u16(y);
        self.put_u8(direction.as_byte());
        self.put_u8(sprite_frame);
        Some(self.finish())
    }

    pub fn encode_attack(
        &mut self,
        player_id: u16,
        direction: Direction,
        x: u16,
        y: u16,
    ) -> Result<Vec<u8>, EncodeError> {
        check_coordinates(x, y)?;
        self.begin(PacketType::Attack, PacketFlags::empty());
        self.put_u16(player_id);
        self.put_u8(direction.as_byte());
        self.put_u16(x);
        self.put_u16(y);
        Ok(self.finish())
    }

    pub fn encode_player_hit(
        &mut self,
        attacker_id: u16,
        target_id: u16,
        push_x: u16,
        push_y: u16,
    ) -> Result<Vec<u8>, EncodeError> {
        check_coordinates(push_x, push_y)?;
        self.begin(PacketType::PlayerHit, PacketFlags::empty());
        self.put_u16(attacker_id);
        self.put_u16(target_id);
        self.put_u16(push_x);
        self.put_u16(push_y);
        Ok(self.finish())
    }

    pub fn encode_player_damage(
        &mut self,
        attacker_id: u16,
        target_id: u16,
        damage: u16,
        health: u16,
        max_health: u16,
        level: u8,
    ) -> Result<Vec<u8>, EncodeError> {
        self.begin(
            PacketType::PlayerDamage,
            PacketFlags::HEALTH_EXTENDED | PacketFlags::MAX_HEALTH | PacketFlags::LEVEL,
        );
        self.put_u16(attacker_id);
        self.put_u16(target_id);
        self.put_u16(damage);
        self.put_u16(health);
        self.put_u16(max_health);
        self.put_u8(level);
        Ok(self.finish())
    }

    pub fn encode_player_death(&mut self, player_id: u16, killer_id: u16) -> Result<Vec<u8>, EncodeError> {
        self.begin(PacketType::PlayerDeath, PacketFlags::empty());
        self.put_u16(player_id);
        self.put_u16(killer_id);
        Ok(self.finish())
    }

    pub fn encode_world_state(&mut self, players: &[PlayerSnapshot]) -> Result<Vec<u8>, EncodeError> {
        let count = players.len().min(MAX_PLAYERS);
        for player in &players[..count] {
            check_coordinates(player.x, player.y)?;
        }
        self.begin(
            PacketType::WorldState,
            PacketFlags::HEALTH_EXTENDED
                | PacketFlags::LEVEL
                | PacketFlags::MAX_HEALTH
                | PacketFlags::SPRITE_FRAME,
        );
        self.put_u8(count as u8);
        for player in &players[..count] {
            self.put_u16(player.id);
            self.put_u16(player.x);
            self.put_u16(player.y);
            self.put_u8(player.direction.as_byte());
            self.put_u16(player.health);
            self.put_u16(player.max_health);
            self.put_u8(player.level);
            self.put_u16(player.damage);
            self.put_u16(player.experience);
            self.put_u16(player.experience_to_next_level);
            self.put_u8(player.sprite_frame);
            self.put_u8(u8::from(player.dead));
        }
        Ok(self.finish())
    }

    pub fn encode_player_join(
        &mut self,
        player_id: u16,
        x: u16,
        y: u16,
        direction: Direction,
        stats: &PlayerStats,
    ) -> Result<Vec<u8>, EncodeError> {
        check_coordinates(x, y)?;
        self.begin(
            PacketType::PlayerJoin,
            PacketFlags::HEALTH_EXTENDED | PacketFlags::LEVEL | PacketFlags::MAX_HEALTH,
        );
        self.put_u16(player_id);
        self.put_u16(x);
        self.put_u16(y);
        self.put_u8(direction.as_byte());
        self.put_stats(stats);
        Ok(self.finish())
    }

    pub fn encode_player_leave(&mut self, player_id: u16) -> Result<Vec<u8>, EncodeError> {
        self.begin(PacketType::PlayerLeave, PacketFlags::empty());
        self.put_u16(player_id);
        Ok(self.finish())
    }

    pub fn encode_item_pickup(
        &mut self,
        player_id: u16,
        item_id: u16,
        kind: ItemKind,
        x: u16,
        y: u16,
        experience_reward: u16,
    ) -> Result<Vec<u8>, EncodeError> {
        check_coordinates(x, y)?;
        let name = kind.name().as_bytes();
        if name.len() > MAX_ITEM_NAME_LEN {
            return Err(EncodeError::ItemNameTooLong {
                len: name.len(),
                limit: MAX_ITEM_NAME_LEN,
            });
        }
        self.begin(PacketType::ItemPickup, PacketFlags::empty());
        self.put_u16(player_id);
        self.put_u16(item_id);
        self.put_u8(name.len() as u8);
        self.scratch.extend_from_slice(name);
        self.put_u16(x);
        self.put_u16(y);
        self.put_u16(experience_reward);
        Ok(self.finish())
    }

    pub fn encode_item_remove(&mut self, item_id: u16) -> Result<Vec<u8>, EncodeError> {
        self.begin(PacketType::ItemRemove, PacketFlags::empty());
        self.put_u16(item_id);
        Ok(self.finish())
    }

    pub fn encode_player_experience(
        &mut self,
        player_id: u16,
        experience: u16,
        experience_to_next_level: u16,
        level: u8,
    ) -> Result<Vec<u8>, EncodeError> {
        self.begin(PacketType::PlayerExperience, PacketFlags::empty());
        self.put_u16(player_id);
        self.put_u16(experience);
        self.put_u16(experience_to_next_level);
        self.put_u8(level);
        Ok(self.finish())
    }

    pub fn encode(&mut self, packet: &Packet) -> Result<Vec<u8>, EncodeError> {
        match packet {
            Packet::Handshake { player_id, stats } => self.encode_handshake(*player_id, stats),
            Packet::PlayerUpdate {
                player_id,
                position,
                direction,
                sprite_frame,
            } => self.encode_player_update(*player_id, *position, *direction, *sprite_frame),
            Packet::Attack {
                player_id,
                direction,
                x,
                y,
            } => self.encode_attack(*player_id, *direction, *x, *y),
            Packet::PlayerHit {
                attacker_id,
                target_id,
                push_x,
                push_y,
            } => self.encode_player_hit(*attacker_id, *target_id, *push_x, *push_y),
            Packet::WorldState { players } => self.encode_world_state(players),
            Packet::PlayerJoin {
                player_id,
                x,
                y,
                direction,
                stats,
            } => self.encode_player_join(*player_id, *x, *y, *direction, stats),
            Packet::PlayerLeave { player_id } => self.encode_player_leave(*player_id),
            Packet::PlayerDamage {
                attacker_id,
                target_id,
                damage,
                health,
                max_health,
                level,
            } => self.encode_player_damage(*attacker_id, *target_id, *damage, *health, *max_health, *level),
            Packet::PlayerDeath { player_id, killer_id } => {
                self.encode_player_death(*player_id, *killer_id)
            }
            Packet::ItemPickup {
                player_id,
                item_id,
                kind,
                x,
                y,
                experience_reward,
            } => self.encode_item_pickup(*player_id, *item_id, *kind, *x, *y, *experience_reward),
            Packet::ItemRemove { item_id } => self.encode_item_remove(*item_id),
            Packet::PlayerExperience {
                player_id,
                experience,
                experience_to_next_level,
                level,
            } => self.encode_player_experience(*player_id, *experience, *experience_to_next_level, *level),
        }
    }
}

/// Result of one [`Decoder::decode`] call. `bytes_consumed` counts the
/// bytes of the reassembled buffer (buffered partial frame plus this
/// call's input) that produced the returned packets, so it can exceed
/// the length of the input slice when a buffered frame completes;
/// `has_more_data` reports an incomplete frame waiting for more input.
#[derive(Debug)]
pub struct DecodeResult {
    pub packets: Vec<Packet>,
    pub bytes_consumed: usize,
    pub has_more_data: bool,
}

/// Incremental decoder. Owns the partial-frame buffer carried between
/// calls, so feeding the same logical byte stream through any chunking
/// yields the same ordered packet list.
#[derive(Debug, Default)]
pub struct Decoder {
    pending: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops any buffered partial frame.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn decode(&mut self, input: &[u8]) -> DecodeResult {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(input);

        let mut packets = Vec::new();
        let mut pos = 0;
        let mut bytes_consumed = 0;
        let mut has_more_data = false;

        while pos < data.len() {
            let Some(start) = find_start(&data, pos) else {
                self.pending = data.split_off(pos);
                has_more_data = true;
                break;
            };
            let Some(end) = find_frame_end(&data, start + 1) else {
                self.pending = data.split_off(start);
                has_more_data = true;
                break;
            };

            let frame = unescape(&data[start..=end]);
            if is_valid_frame(&frame) {
                if let Some(packet) = parse_frame(&frame) {
                    packets.push(packet);
                }
            }
            // A bad frame is dropped alone; scanning resumes after its
            // terminator.
            pos = end + 1;
            bytes_consumed = pos;
        }

        DecodeResult {
            packets,
            bytes_consumed,
            has_more_data,
        }
    }
}

fn find_start(data: &[u8], from: usize) -> Option<usize> {
    data[from..].iter().position(|&b| b == PACKET_START).map(|i| from + i)
}

/// Finds the frame terminator: an END byte preceded by an even run of
/// ESCAPE bytes. An END after an odd run is itself escaped data, so the
/// scan tracks escape parity instead of looking a single byte back.
fn find_frame_end(data: &[u8], from: usize) -> Option<usize> {
    let mut escape_run = 0usize;
    for (i, &b) in data.iter().enumerate().skip(from) {
        if b == PACKET_END && escape_run % 2 == 0 {
            return Some(i);
        }
        if b == ESCAPE_CHAR {
            escape_run += 1;
        } else {
            escape_run = 0;
        }
    }
    None
}

/// Reverses the interior escaping. An unknown escape pair is kept as a
/// literal ESCAPE plus the byte; a trailing unresolved ESCAPE is kept
/// as a literal escape byte rather than dropped.
fn unescape(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut escaping = false;
    for &b in escaped {
        if escaping {
            match b {
                ESCAPED_START => out.push(PACKET_START),
                ESCAPED_END => out.push(PACKET_END),
                ESCAPED_ESCAPE => out.push(ESCAPE_CHAR),
                _ => {
                    out.push(ESCAPE_CHAR);
                    out.push(b);
                }
            }
            escaping = false;
        } else if b == ESCAPE_CHAR {
            escaping = true;
        } else {
            out.push(b);
        }
    }
    if escaping {
        out.push(ESCAPE_CHAR);
    }
    out
}

/// Bounds-checked cursor over a frame payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn u8(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes = self.buf.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.buf.get(self.pos..self.pos + len)?;
        self.pos += len;
        Some(bytes)
    }
}

fn read_stats(r: &mut Reader, flags: PacketFlags) -> Option<PlayerStats> {
    let (health, max_health, damage) = if flags.contains(PacketFlags::HEALTH_EXTENDED) {
        (r.u16()?, r.u16()?, r.u16()?)
    } else {
        (100, 100, 25)
    };
    let level = if flags.contains(PacketFlags::LEVEL) { r.u8()? } else { 1 };
    let (experience, experience_to_next_level) = if flags.contains(PacketFlags::HEALTH_EXTENDED) {
        (r.u16()?, r.u16()?)
    } else {
        (0, 100)
    };
    Some(PlayerStats {
        health,
        max_health,
        damage,
        level,
        experience,
        experience_to_next_level,
    })
}

fn parse_world_state(r: &mut Reader, flags: PacketFlags) -> Option<Packet> {
    let count = (r.u8()? as usize).min(MAX_PLAYERS);
    let extended = flags.contains(PacketFlags::HEALTH_EXTENDED);
    let has_sprite = flags.contains(PacketFlags::SPRITE_FRAME);
    // Tuple width is uniform for the whole packet, derived from the
    // global flags: id/x/y/direction plus the stat block, sprite frame
    // and dead flag.
    let tuple_len = if extended { 18 } else { 8 } + usize::from(has_sprite) + 1;

    let mut players = Vec::with_capacity(count);
    for _ in 0..count {
        if r.remaining() < tuple_len {
            // Truncated list: keep what decoded cleanly.
            break;
        }
        let id = r.u16()?;
        let x = r.u16()?;
        let y = r.u16()?;
        let direction = Direction::from_byte(r.u8()?);
        let (health, max_health, level, damage, experience, experience_to_next_level) = if extended {
            (r.u16()?, r.u16()?, r.u8()?, r.u16()?, r.u16()?, r.u16()?)
        } else {
            (u16::from(r.u8()?), 100, 1, 25, 0, 100)
        };
        let sprite_frame = if has_sprite { r.u8()? } else { 1 };
        let dead = r.u8()? != 0;
        players.push(PlayerSnapshot {
            id,
            x,
            y,
            direction,
            health,
            max_health,
            level,
            damage,
            experience,
            experience_to_next_level,
            sprite_frame,
            dead,
        });
    }
    Some(Packet::WorldState { players })
}

/// Parses one unescaped, structurally pre-validated frame. Returns
/// `None` on any bounds violation, which drops this packet alone.
fn parse_frame(frame: &[u8]) -> Option<Packet> {
    let ty = PacketType::from_byte(frame[1])?;
    if frame.len() < ty.min_frame_len() {
        return None;
    }
    let flags = PacketFlags::from_bits_truncate(frame[2]);
    let mut r = Reader::new(&frame[3..frame.len() - 1]);

    match ty {
        PacketType::Handshake => {
            let player_id = r.u16()?;
            let stats = read_stats(&mut r, flags)?;
            Some(Packet::Handshake { player_id, stats })
        }
        PacketType::PlayerUpdate => {
            let player_id = r.u16()?;
            let position = if flags.contains(PacketFlags::POSITION) {
                Some((r.u16()?, r.u16()?))
            } else {
                None
            };
            let direction = if flags.contains(PacketFlags::DIRECTION) {
                Some(Direction::from_byte(r.u8()?))
            } else {
                None
            };
            let sprite_frame = if flags.contains(PacketFlags::SPRITE_FRAME) {
                Some(r.u8()?)
            } else {
                None
            };
            Some(Packet::PlayerUpdate {
                player_id,
                position,
                direction,
                sprite_frame,
            })
        }
        PacketType::Attack => Some(Packet::Attack {
            player_id: r.u16()?,
            direction: Direction::from_byte(r.u8()?),
            x: r.u16()?,
            y: r.u16()?,
        }),
        PacketType::PlayerHit => Some(Packet::PlayerHit {
            attacker_id: r.u16()?,
            target_id: r.u16()?,
            push_x: r.u16()?,
            push_y: r.u16()?,
        }),
        PacketType::WorldState => parse_world_state(&mut r, flags),
        PacketType::PlayerJoin => {
            let player_id = r.u16()?;
            let x = r.u16()?;
            let y = r.u16()?;
            let direction = Direction::from_byte(r.u8()?);
            let stats = read_stats(&mut r, flags)?;
            Some(Packet::PlayerJoin {
                player_id,
                x,
                y,
                direction,
                stats,
            })
        }
        PacketType::PlayerLeave => Some(Packet::PlayerLeave { player_id: r.u16()? }),
        PacketType::PlayerDamage => {
            let attacker_id = r.u16()?;
            let target_id = r.u16()?;
            let (damage, health, max_health, level) = if flags.contains(PacketFlags::HEALTH_EXTENDED) {
                (r.u16()?, r.u16()?, r.u16()?, r.u8()?)
            } else {
                (u16::from(r.u8()?), r.u16()?, 100, 1)
            };
            Some(Packet::PlayerDamage {
                attacker_id,
                target_id,
                damage,
                health,
                max_health,
                level,
            })
        }
        PacketType::PlayerDeath => Some(Packet::PlayerDeath {
            player_id: r.u16()?,
            killer_id: r.u16()?,
        }),
        PacketType::ItemPickup => {
            let player_id = r.u16()?;
            let item_id = r.u16()?;
            let name_len = r.u8()? as usize;
            if name_len > MAX_ITEM_NAME_LEN {
                return None;
            }
            let name = std::str::from_utf8(r.bytes(name_len)?).ok()?;
            let kind = ItemKind::from_name(name)?;
            Some(Packet::ItemPickup {
                player_id,
                item_id,
                kind,
                x: r.u16()?,
                y: r.u16()?,
                experience_reward: r.u16()?,
            })
        }
        PacketType::ItemRemove => Some(Packet::ItemRemove { item_id: r.u16()? }),
        PacketType::PlayerExperience => Some(Packet::PlayerExperience {
            player_id: r.u16()?,
            experience: r.u16()?,
            experience_to_next_level: r.u16()?,
            level: r.u8()?,
        }),
    }
}
