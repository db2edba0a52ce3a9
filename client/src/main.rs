use clap::Parser;
use client::network::{Client, ClientEvent};
use log::{debug, info, warn};
use rand::Rng;
use shared::packet::Packet;
use shared::protocol::{Direction, MAX_X, MAX_Y};
use tokio::time::{interval, Duration};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short, long, default_value = "127.0.0.1:1234")]
    server: String,
    /// Movement updates per second
    #[clap(short, long, default_value = "10")]
    update_rate: u32,
}

const STEP: u16 = 8;

struct Bot {
    x: u16,
    y: u16,
    direction: Direction,
    sprite_frame: u8,
    steps: u32,
}

impl Bot {
    fn new() -> Self {
        Self {
            x: 100,
            y: 100,
            direction: Direction::Down,
            sprite_frame: 1,
            steps: 0,
        }
    }

    /// Random walk: occasionally turn, then take one step clamped to
    /// the world rectangle.
    fn wander(&mut self) {
        let mut rng = rand::thread_rng();
        if rng.gen_ratio(1, 5) {
            self.direction = match rng.gen_range(0..4) {
                0 => Direction::Up,
                1 => Direction::Down,
                2 => Direction::Left,
                _ => Direction::Right,
            };
        }
        match self.direction {
            Direction::Up => self.y = self.y.saturating_sub(STEP),
            Direction::Down => self.y = (self.y + STEP).min(MAX_Y),
            Direction::Left => self.x = self.x.saturating_sub(STEP),
            Direction::Right => self.x = (self.x + STEP).min(MAX_X),
        }
        self.sprite_frame = self.sprite_frame % 3 + 1;
        self.steps += 1;
    }
}

fn handle_packet(packet: Packet, own_id: u16) {
    match packet {
        Packet::Handshake { player_id, stats } => {
            info!(
                "Welcomed as player {} (hp {}/{}, dmg {})",
                player_id, stats.health, stats.max_health, stats.damage
            );
        }
        Packet::PlayerJoin { player_id, x, y, .. } => {
            info!("Player {} joined at ({}, {})", player_id, x, y);
        }
        Packet::PlayerLeave { player_id } => {
            info!("Player {} left", player_id);
        }
        Packet::PlayerDamage {
            attacker_id,
            target_id,
            damage,
            health,
            ..
        } => {
            info!(
                "Player {} hit player {} for {} ({} hp left)",
                attacker_id, target_id, damage, health
            );
        }
        Packet::PlayerDeath { player_id, killer_id } => {
            if player_id == own_id {
                warn!("Killed by player {}", killer_id);
            } else {
                info!("Player {} was killed by player {}", player_id, killer_id);
            }
        }
        Packet::PlayerHit { push_x, push_y, .. } => {
            info!("Knocked back to ({}, {})", push_x, push_y);
        }
        Packet::ItemPickup {
            player_id,
            item_id,
            kind,
            x,
            y,
            ..
        } => {
            if player_id == 0 {
                info!("{} (item {}) lies at ({}, {})", kind.name(), item_id, x, y);
            } else {
                info!("Player {} picked up {}", player_id, kind.name());
            }
        }
        Packet::PlayerExperience {
            player_id,
            experience,
            level,
            ..
        } => {
            if player_id == own_id {
                info!("Now level {} with {} xp banked", level, experience);
            }
        }
        Packet::WorldState { players } => {
            debug!("World snapshot: {} players", players.len());
        }
        other => {
            debug!("Ignoring {:?}", other.packet_type());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let (mut client, mut events) = Client::connect(&args.server).await?;
    let mut bot = Bot::new();
    let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(args.update_rate.max(1))));

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(ClientEvent::Packet(packet)) => handle_packet(packet, client.player_id()),
                    Some(ClientEvent::Disconnected) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                // Nothing to do until the handshake assigns us an id.
                if client.player_id() == 0 {
                    continue;
                }
                bot.wander();
                client.send_fast_update(bot.x, bot.y, bot.direction, bot.sprite_frame).await?;
                if bot.steps % 20 == 0 {
                    client.send_attack(bot.direction, bot.x, bot.y).await?;
                }
            }
        }
    }

    Ok(())
}
