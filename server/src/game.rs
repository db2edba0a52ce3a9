//! Authoritative world state: players, collectible items, combat
//! resolution and the respawn cycle. Pure state transitions live here;
//! the network layer decides which packets each outcome turns into.

use std::collections::HashMap;

use log::{debug, info};
use shared::combat::{attack_zone, entity_bounds, knockback};
use shared::levels;
use shared::packet::{ItemKind, PlayerSnapshot};
use shared::protocol::{validate_coordinates, Direction, ENTITY_SIZE};
use shared::stats::PlayerStats;

/// Ticks a dead player stays down before the world revives them.
pub const DEATH_RESPAWN_TICKS: u32 = 180;

const SPAWN_X: u16 = 100;
const SPAWN_Y: u16 = 100;

/// One connected player's authoritative state.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: u16,
    pub x: u16,
    pub y: u16,
    pub direction: Direction,
    pub sprite_frame: u8,
    pub stats: PlayerStats,
    pub dead: bool,
    respawn_ticks: u32,
    inventory: HashMap<ItemKind, u16>,
}

impl PlayerState {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            x: SPAWN_X,
            y: SPAWN_Y,
            direction: Direction::Down,
            sprite_frame: 1,
            stats: PlayerStats::roll(),
            dead: false,
            respawn_ticks: 0,
            inventory: HashMap::new(),
        }
    }

    /// Center of the player's bounding box, the anchor for attack zones.
    pub fn center(&self) -> (i32, i32) {
        (
            i32::from(self.x) + i32::from(ENTITY_SIZE) / 2,
            i32::from(self.y) + i32::from(ENTITY_SIZE) / 2,
        )
    }

    fn die(&mut self) {
        self.dead = true;
        self.respawn_ticks = DEATH_RESPAWN_TICKS;
    }

    /// Counts down the death timer; on expiry the player comes back at
    /// a deterministic per-id spawn point with full health and a 10%
    /// experience penalty.
    fn tick_respawn(&mut self) -> bool {
        if !self.dead {
            return false;
        }
        self.respawn_ticks = self.respawn_ticks.saturating_sub(1);
        if self.respawn_ticks > 0 {
            return false;
        }
        self.dead = false;
        self.stats.health = self.stats.max_health;
        self.stats.experience = self.stats.experience.saturating_sub(self.stats.experience / 10);
        self.x = SPAWN_X + (self.id * 50) % 400;
        self.y = SPAWN_Y + (self.id * 30) % 300;
        true
    }

    fn item_count(&self, kind: ItemKind) -> u16 {
        self.inventory.get(&kind).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.x,
            y: self.y,
            direction: self.direction,
            health: self.stats.health,
            max_health: self.stats.max_health,
            level: self.stats.level,
            damage: self.stats.damage,
            experience: self.stats.experience,
            experience_to_next_level: self.stats.experience_to_next_level,
            sprite_frame: self.sprite_frame,
            dead: self.dead,
        }
    }
}

/// A collectible placed in the world. Collected items stay in the map
/// so late joiners are only told about the ones still on the ground.
#[derive(Debug, Clone)]
pub struct ItemState {
    pub id: u16,
    pub kind: ItemKind,
    pub x: u16,
    pub y: u16,
    pub experience_reward: u16,
    pub collected: bool,
}

/// One landed hit inside an attack resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackHit {
    pub target_id: u16,
    pub damage: u16,
    pub health: u16,
    pub max_health: u16,
    pub level: u8,
    pub push_x: u16,
    pub push_y: u16,
    pub killed: bool,
}

/// Attacker stat changes earned from the kills in one swing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperienceGain {
    pub experience: u16,
    pub experience_to_next_level: u16,
    pub level: u8,
}

#[derive(Debug, Default)]
pub struct AttackOutcome {
    pub hits: Vec<AttackHit>,
    pub experience: Option<ExperienceGain>,
}

/// Everything the network layer needs to announce a completed pickup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupOutcome {
    pub item_id: u16,
    pub kind: ItemKind,
    pub x: u16,
    pub y: u16,
    pub experience_reward: u16,
    pub experience: u16,
    pub experience_to_next_level: u16,
    pub level: u8,
}

pub struct World {
    players: HashMap<u16, PlayerState>,
    items: HashMap<u16, ItemState>,
    next_player_id: u16,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        let mut items = HashMap::new();
        for (id, kind, x, y, experience_reward) in [
            (1, ItemKind::Sword, 1152, 384, 100),
            (2, ItemKind::Sword, 1152, 480, 100),
            (3, ItemKind::Key, 960, 720, 25),
            (4, ItemKind::Door, 1200, 720, 50),
            (5, ItemKind::Shield, 1440, 480, 100),
        ] {
            items.insert(
                id,
                ItemState {
                    id,
                    kind,
                    x,
                    y,
                    experience_reward,
                    collected: false,
                },
            );
        }
        Self {
            players: HashMap::new(),
            items,
            next_player_id: 1,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, id: u16) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// Admits a new player at the spawn point and returns their id.
    pub fn allocate_player(&mut self) -> u16 {
        let id = self.next_player_id;
        self.next_player_id += 1;
        self.players.insert(id, PlayerState::new(id));
        info!("Player {} joined", id);
        id
    }

    pub fn remove_player(&mut self, id: u16) {
        if self.players.remove(&id).is_some() {
            info!("Player {} removed", id);
        }
    }

    /// Items still on the ground, ordered by id.
    pub fn uncollected_items(&self) -> Vec<ItemState> {
        let mut items: Vec<ItemState> = self.items.values().filter(|i| !i.collected).cloned().collect();
        items.sort_by_key(|i| i.id);
        items
    }

    /// Advances the respawn timers one tick and returns the ids of the
    /// players that came back this tick.
    pub fn tick(&mut self) -> Vec<u16> {
        let mut respawned = Vec::new();
        for player in self.players.values_mut() {
            if player.tick_respawn() {
                respawned.push(player.id);
            }
        }
        respawned.sort_unstable();
        respawned
    }

    /// Snapshot of every player, ordered by id so broadcasts are stable.
    pub fn snapshot(&self) -> Vec<PlayerSnapshot> {
        let mut players: Vec<PlayerSnapshot> = self.players.values().map(PlayerState::snapshot).collect();
        players.sort_by_key(|p| p.id);
        players
    }

    /// Applies a movement update. Updates from dead or unknown players
    /// and out-of-bounds positions are rejected.
    pub fn update_player(
        &mut self,
        id: u16,
        position: Option<(u16, u16)>,
        direction: Option<Direction>,
        sprite_frame: Option<u8>,
    ) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if player.dead {
            debug!("Ignoring update from dead player {}", id);
            return false;
        }
        if let Some((x, y)) = position {
            if !validate_coordinates(x, y) {
                debug!("Rejecting out-of-bounds position ({}, {}) from player {}", x, y, id);
                return false;
            }
            player.x = x;
            player.y = y;
        }
        if let Some(direction) = direction {
            player.direction = direction;
        }
        if let Some(frame) = sprite_frame {
            player.sprite_frame = frame;
        }
        true
    }

    /// Resolves one swing against every living player whose bounding
    /// box intersects the attack zone. Damage, knockback and kill
    /// credit all use the authoritative positions, not whatever the
    /// attacking client claimed.
    pub fn resolve_attack(&mut self, attacker_id: u16, direction: Direction) -> AttackOutcome {
        let Some(attacker) = self.players.get(&attacker_id) else {
            return AttackOutcome::default();
        };
        if attacker.dead {
            return AttackOutcome::default();
        }
        let damage = attacker.stats.damage;
        let (cx, cy) = attacker.center();
        let zone = attack_zone(cx, cy, direction);

        let mut hits = Vec::new();
        let mut killed_levels = Vec::new();
        let mut target_ids: Vec<u16> = self.players.keys().copied().collect();
        target_ids.sort_unstable();

        for target_id in target_ids {
            if target_id == attacker_id {
                continue;
            }
            let Some(target) = self.players.get_mut(&target_id) else {
                continue;
            };
            if target.dead || !zone.intersects(&entity_bounds(target.x, target.y)) {
                continue;
            }

            target.stats.take_damage(damage);
            let killed = !target.stats.is_alive();
            if killed {
                target.die();
                killed_levels.push(target.stats.level);
                info!("Player {} killed player {}", attacker_id, target_id);
            }
            let (push_x, push_y) = knockback(target.x, target.y, direction);
            target.x = push_x;
            target.y = push_y;

            hits.push(AttackHit {
                target_id,
                damage,
                health: target.stats.health,
                max_health: target.stats.max_health,
                level: target.stats.level,
                push_x,
                push_y,
                killed,
            });
        }

        let mut experience = None;
        if !killed_levels.is_empty() {
            if let Some(attacker) = self.players.get_mut(&attacker_id) {
                for victim_level in killed_levels {
                    let reward = levels::experience_for_kill(attacker.stats.level, victim_level);
                    attacker.stats.add_experience(reward);
                }
                experience = Some(ExperienceGain {
                    experience: attacker.stats.experience,
                    experience_to_next_level: attacker.stats.experience_to_next_level,
                    level: attacker.stats.level,
                });
            }
        }

        AttackOutcome { hits, experience }
    }

    /// Attempts a pickup. Returns `None` when nothing changed: unknown
    /// item, already collected, dead player, or a door approached
    /// without a key.
    pub fn apply_pickup(&mut self, player_id: u16, item_id: u16) -> Option<PickupOutcome> {
        let item = self.items.get(&item_id)?;
        if item.collected {
            return None;
        }
        let item = item.clone();
        let player = self.players.get_mut(&player_id)?;
        if player.dead {
            return None;
        }

        match item.kind {
            ItemKind::Door => {
                let keys = player.item_count(ItemKind::Key);
                if keys == 0 {
                    debug!("Player {} tried door {} without a key", player_id, item_id);
                    return None;
                }
                player.inventory.insert(ItemKind::Key, keys - 1);
            }
            ItemKind::Sword => {
                *player.inventory.entry(ItemKind::Sword).or_insert(0) += 1;
                player.stats.damage = player.stats.damage.saturating_add(15);
            }
            ItemKind::Key => {
                *player.inventory.entry(ItemKind::Key).or_insert(0) += 1;
            }
            ItemKind::Shield => {
                *player.inventory.entry(ItemKind::Shield).or_insert(0) += 1;
                player.stats.max_health = player.stats.max_health.saturating_add(25);
                player.stats.health = player.stats.health.saturating_add(25);
            }
        }

        player.stats.add_experience(item.experience_reward);
        let outcome = PickupOutcome {
            item_id,
            kind: item.kind,
            x: item.x,
            y: item.y,
            experience_reward: item.experience_reward,
            experience: player.stats.experience,
            experience_to_next_level: player.stats.experience_to_next_level,
            level: player.stats.level,
        };

        if let Some(item) = self.items.get_mut(&item_id) {
            item.collected = true;
        }
        info!("Player {} picked up {} (item {})", player_id, item.kind.name(), item_id);
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pins a player to known deterministic stats.
    fn set_stats(world: &mut World, id: u16, stats: PlayerStats) {
        world.players.get_mut(&id).unwrap().stats = stats;
    }

    fn place(world: &mut World, id: u16, x: u16, y: u16) {
        let player = world.players.get_mut(&id).unwrap();
        player.x = x;
        player.y = y;
    }

    #[test]
    fn player_ids_are_sequential() {
        let mut world = World::new();
        assert_eq!(world.allocate_player(), 1);
        assert_eq!(world.allocate_player(), 2);
        world.remove_player(1);
        // Ids are never reused within a server lifetime.
        assert_eq!(world.allocate_player(), 3);
        assert_eq!(world.player_count(), 2);
    }

    #[test]
    fn attack_hits_target_in_zone() {
        let mut world = World::new();
        let attacker = world.allocate_player();
        let target = world.allocate_player();
        set_stats(&mut world, attacker, PlayerStats::with_values(1, 100, 100, 25, 0));
        set_stats(&mut world, target, PlayerStats::with_values(1, 100, 100, 25, 0));
        place(&mut world, attacker, 100, 100);
        place(&mut world, target, 148, 88);

        let outcome = world.resolve_attack(attacker, Direction::Right);
        assert_eq!(outcome.hits.len(), 1);
        let hit = &outcome.hits[0];
        assert_eq!(hit.target_id, target);
        assert_eq!(hit.damage, 25);
        assert_eq!(hit.health, 75);
        assert!(!hit.killed);
        // Knockback lands 80 units to the right of the old position.
        assert_eq!((hit.push_x, hit.push_y), (228, 88));
        let target_state = world.player(target).unwrap();
        assert_eq!((target_state.x, target_state.y), (228, 88));
        assert!(outcome.experience.is_none());
    }

    #[test]
    fn attack_misses_outside_zone() {
        let mut world = World::new();
        let attacker = world.allocate_player();
        let target = world.allocate_player();
        place(&mut world, attacker, 100, 100);
        place(&mut world, target, 148, 88);

        // Facing away from the target.
        let outcome = world.resolve_attack(attacker, Direction::Left);
        assert!(outcome.hits.is_empty());
    }

    #[test]
    fn lethal_hit_kills_and_credits_experience() {
        let mut world = World::new();
        let attacker = world.allocate_player();
        let target = world.allocate_player();
        set_stats(&mut world, attacker, PlayerStats::with_values(1, 100, 100, 25, 0));
        set_stats(&mut world, target, PlayerStats::with_values(1, 20, 100, 25, 0));
        place(&mut world, attacker, 100, 100);
        place(&mut world, target, 148, 88);

        let outcome = world.resolve_attack(attacker, Direction::Right);
        assert_eq!(outcome.hits.len(), 1);
        assert!(outcome.hits[0].killed);
        assert_eq!(outcome.hits[0].health, 0);
        assert!(world.player(target).unwrap().dead);

        // 50 XP for an equal-level kill, below the level-2 threshold.
        let gain = outcome.experience.unwrap();
        assert_eq!(gain.experience, 50);
        assert_eq!(gain.level, 1);
    }

    #[test]
    fn dead_players_neither_attack_nor_get_hit() {
        let mut world = World::new();
        let attacker = world.allocate_player();
        let target = world.allocate_player();
        set_stats(&mut world, attacker, PlayerStats::with_values(1, 100, 100, 200, 0));
        set_stats(&mut world, target, PlayerStats::with_values(1, 50, 100, 25, 0));
        place(&mut world, attacker, 100, 100);
        place(&mut world, target, 148, 88);

        let outcome = world.resolve_attack(attacker, Direction::Right);
        assert!(outcome.hits[0].killed);

        // Swinging again at the corpse lands nothing.
        let outcome = world.resolve_attack(attacker, Direction::Right);
        assert!(outcome.hits.is_empty());

        // The corpse cannot swing back either.
        let outcome = world.resolve_attack(target, Direction::Left);
        assert!(outcome.hits.is_empty());
    }

    #[test]
    fn dead_player_updates_are_ignored() {
        let mut world = World::new();
        let id = world.allocate_player();
        world.players.get_mut(&id).unwrap().die();
        assert!(!world.update_player(id, Some((200, 200)), None, None));
        assert_eq!(world.player(id).unwrap().x, SPAWN_X);
    }

    #[test]
    fn out_of_bounds_update_is_rejected() {
        let mut world = World::new();
        let id = world.allocate_player();
        assert!(!world.update_player(id, Some((u16::MAX, 100)), None, None));
        assert!(world.update_player(id, Some((200, 300)), Some(Direction::Left), Some(2)));
        let player = world.player(id).unwrap();
        assert_eq!((player.x, player.y), (200, 300));
        assert_eq!(player.direction, Direction::Left);
        assert_eq!(player.sprite_frame, 2);
    }

    #[test]
    fn respawn_restores_health_and_taxes_experience() {
        let mut world = World::new();
        let id = world.allocate_player();
        {
            let player = world.players.get_mut(&id).unwrap();
            player.stats = PlayerStats::with_values(3, 10, 150, 30, 200);
            player.stats.health = 0;
            player.die();
        }

        for _ in 0..DEATH_RESPAWN_TICKS - 1 {
            assert!(world.tick().is_empty());
        }
        assert_eq!(world.tick(), vec![id]);

        let player = world.player(id).unwrap();
        assert!(!player.dead);
        assert_eq!(player.stats.health, player.stats.max_health);
        // 10% penalty on 200 banked experience.
        assert_eq!(player.stats.experience, 180);
        // Per-id spawn point: 100 + (1 * 50) % 400, 100 + (1 * 30) % 300.
        assert_eq!((player.x, player.y), (150, 130));
    }

    #[test]
    fn door_without_key_is_a_silent_no_op() {
        let mut world = World::new();
        let id = world.allocate_player();
        assert!(world.apply_pickup(id, 4).is_none());
        // The door is still there for later.
        assert!(world.uncollected_items().iter().any(|i| i.id == 4));
    }

    #[test]
    fn key_then_door_sequence() {
        let mut world = World::new();
        let id = world.allocate_player();
        set_stats(&mut world, id, PlayerStats::with_values(1, 100, 100, 25, 0));

        let key = world.apply_pickup(id, 3).unwrap();
        assert_eq!(key.kind, ItemKind::Key);
        assert_eq!(key.experience, 25);

        let door = world.apply_pickup(id, 4).unwrap();
        assert_eq!(door.kind, ItemKind::Door);
        assert_eq!(door.experience, 75);
        // The key was consumed; a second door would not open.
        assert_eq!(world.player(id).unwrap().item_count(ItemKind::Key), 0);
    }

    #[test]
    fn sword_and_shield_boost_stats() {
        let mut world = World::new();
        let id = world.allocate_player();
        set_stats(&mut world, id, PlayerStats::with_values(1, 80, 100, 25, 0));

        world.apply_pickup(id, 1).unwrap();
        assert_eq!(world.player(id).unwrap().stats.damage, 40);

        world.apply_pickup(id, 5).unwrap();
        let stats = &world.player(id).unwrap().stats;
        assert_eq!(stats.max_health, 125);
        assert_eq!(stats.health, 105);
    }

    #[test]
    fn collected_items_disappear_for_everyone() {
        let mut world = World::new();
        let a = world.allocate_player();
        let b = world.allocate_player();
        assert!(world.apply_pickup(a, 1).is_some());
        // Second pickup of the same item fails.
        assert!(world.apply_pickup(b, 1).is_none());
        let remaining: Vec<u16> = world.uncollected_items().iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![2, 3, 4, 5]);
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let mut world = World::new();
        for _ in 0..5 {
            world.allocate_player();
        }
        let ids: Vec<u16> = world.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
