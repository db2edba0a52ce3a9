//! Player stat block carried in Handshake/PlayerJoin packets and owned
//! authoritatively by the server.

use rand::Rng;

use crate::levels;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStats {
    pub health: u16,
    pub max_health: u16,
    pub damage: u16,
    pub level: u8,
    pub experience: u16,
    pub experience_to_next_level: u16,
}

impl PlayerStats {
    /// Rolls fresh level-1 stats: 80-120 max health, 20-30 damage.
    pub fn roll() -> Self {
        let mut rng = rand::thread_rng();
        let max_health = rng.gen_range(80..=120);
        Self {
            health: max_health,
            max_health,
            damage: rng.gen_range(20..=30),
            level: 1,
            experience: 0,
            experience_to_next_level: levels::experience_for_next_level(1),
        }
    }

    pub fn with_values(level: u8, health: u16, max_health: u16, damage: u16, experience: u16) -> Self {
        Self {
            health,
            max_health,
            damage,
            level,
            experience,
            experience_to_next_level: levels::experience_for_next_level(level),
        }
    }

    pub fn take_damage(&mut self, damage: u16) {
        self.health = self.health.saturating_sub(damage);
    }

    pub fn heal(&mut self, amount: u16) {
        self.health = (self.health.saturating_add(amount)).min(self.max_health);
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Credits experience and runs any level-ups it pays for.
    pub fn add_experience(&mut self, amount: u16) {
        levels::add_experience(self, amount);
    }
}
