//! Level progression: experience thresholds, randomized stat gains per
//! level-up, and the kill-reward formula.
//!
//! Levels 1-10 use a hand-tuned table; higher bands follow closed
//! formulas. Thresholds above the 16-bit wire range saturate, which in
//! practice only affects levels no player reaches.

use rand::Rng;

use crate::protocol::MAX_LEVEL;
use crate::stats::PlayerStats;

/// Experience thresholds for levels 2-10; level N requires
/// `EARLY_THRESHOLDS[N - 2]` total experience to enter.
const EARLY_THRESHOLDS: [u32; 9] = [100, 200, 350, 550, 800, 1100, 1450, 1850, 2300];

/// Health/damage gain bands for levels 1-10: (min_hp, max_hp, min_dmg, max_dmg).
const EARLY_GAINS: [(u16, u16, u16, u16); 10] = [
    (20, 30, 5, 8),
    (25, 35, 6, 9),
    (30, 40, 7, 10),
    (35, 45, 8, 12),
    (40, 50, 9, 14),
    (45, 55, 10, 16),
    (50, 60, 11, 18),
    (55, 65, 12, 20),
    (60, 70, 13, 22),
    (65, 75, 14, 24),
];

/// Total experience required to *reach* the given level.
fn experience_required(level: u8) -> u32 {
    let level = u32::from(level);
    match level {
        0 | 1 => 0,
        2..=10 => EARLY_THRESHOLDS[level as usize - 2],
        11..=20 => 2300 + (level - 10) * 500,
        21..=50 => 4800 + (level - 20) * 800,
        _ => 28_000 + (level - 50) * 1500,
    }
}

/// Experience needed to advance past `current_level`, saturated to the
/// 16-bit wire range.
pub fn experience_for_next_level(current_level: u8) -> u16 {
    experience_required(current_level.saturating_add(1)).min(u32::from(u16::MAX)) as u16
}

fn health_gain_range(level: u8) -> (u16, u16) {
    let l = u16::from(level);
    match level {
        1..=10 => {
            let (min, max, _, _) = EARLY_GAINS[level as usize - 1];
            (min, max)
        }
        11..=20 => (70 + (l - 10) * 5, 80 + (l - 10) * 5),
        21..=50 => {
            let tier = (l - 21) / 10 + 1;
            (120 + tier * 20, 140 + tier * 25)
        }
        51..=100 => {
            let tier = (l - 51) / 10 + 1;
            (300 + tier * 50, 350 + tier * 70)
        }
        _ => (10, 20),
    }
}

fn damage_gain_range(level: u8) -> (u16, u16) {
    let l = u16::from(level);
    match level {
        1..=10 => {
            let (_, _, min, max) = EARLY_GAINS[level as usize - 1];
            (min, max)
        }
        11..=20 => (15 + (l - 10), 25 + (l - 10)),
        21..=50 => {
            let tier = (l - 21) / 10 + 1;
            (30 + tier * 5, 45 + tier * 8)
        }
        51..=100 => {
            let tier = (l - 51) / 10 + 1;
            (70 + tier * 15, 100 + tier * 25)
        }
        _ => (2, 5),
    }
}

/// Advances the stats one level: rolls the new level's gain band,
/// restores health to the new maximum and updates the next threshold.
pub fn apply_level_up(stats: &mut PlayerStats) {
    if stats.level >= MAX_LEVEL {
        return;
    }
    let new_level = stats.level + 1;
    let mut rng = rand::thread_rng();
    let (min_hp, max_hp) = health_gain_range(new_level);
    let (min_dmg, max_dmg) = damage_gain_range(new_level);

    stats.level = new_level;
    stats.max_health = stats.max_health.saturating_add(rng.gen_range(min_hp..=max_hp));
    stats.health = stats.max_health;
    stats.damage = stats.damage.saturating_add(rng.gen_range(min_dmg..=max_dmg));
    stats.experience_to_next_level = experience_for_next_level(new_level);
}

/// Credits experience, carrying the remainder across however many
/// level-ups it pays for.
pub fn add_experience(stats: &mut PlayerStats, amount: u16) {
    let mut experience = u32::from(stats.experience) + u32::from(amount);
    while stats.level < MAX_LEVEL && experience >= u32::from(stats.experience_to_next_level) {
        experience -= u32::from(stats.experience_to_next_level);
        apply_level_up(stats);
    }
    stats.experience = experience.min(u32::from(u16::MAX)) as u16;
}

/// Kill reward: base 50 XP scaled by victim level, with a
/// level-difference multiplier that rewards punching up and discounts
/// punching down. Never less than 10.
pub fn experience_for_kill(killer_level: u8, victim_level: u8) -> u16 {
    let diff = i32::from(victim_level) - i32::from(killer_level);
    let multiplier = if diff > 0 {
        1.0 + diff as f64 * 0.2
    } else if diff < 0 {
        (1.0 + diff as f64 * 0.1).max(0.1)
    } else {
        1.0
    };
    let experience = (50.0 * f64::from(victim_level) * multiplier) as u32;
    experience.clamp(10, u32::from(u16::MAX)) as u16
}
