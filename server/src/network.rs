//! TCP front end: accept loop, per-connection receive tasks and the
//! fixed-rate tick loop that broadcasts world snapshots.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use shared::codec::{Decoder, EncodeError, Encoder};
use shared::packet::Packet;
use shared::protocol::Direction;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};

use crate::game::{AttackOutcome, World};
use crate::session::Session;

pub const DEFAULT_TICK: Duration = Duration::from_millis(33);

/// Grace period before a killed player's connection is torn down if the
/// client never reacts to its own death.
const DEATH_CLEANUP_DELAY: Duration = Duration::from_secs(5);

const READ_BUFFER_SIZE: usize = 4096;

type SharedWorld = Arc<RwLock<World>>;
type Sessions = Arc<RwLock<HashMap<u16, Session>>>;

/// Logs and swallows encode failures; with authoritative state already
/// validated these only fire on programming errors, and one bad frame
/// should never take the server down.
fn encode_frame(result: Result<Vec<u8>, EncodeError>) -> Option<Vec<u8>> {
    match result {
        Ok(frame) => Some(frame),
        Err(e) => {
            error!("Frame encoding failed: {}", e);
            None
        }
    }
}

async fn broadcast(sessions: &Sessions, frame: Vec<u8>, exclude: Option<u16>) {
    let sessions = sessions.read().await;
    for session in sessions.values() {
        if Some(session.player_id) == exclude {
            continue;
        }
        session.queue(frame.clone());
    }
}

async fn send_to(sessions: &Sessions, player_id: u16, frame: Vec<u8>) {
    if let Some(session) = sessions.read().await.get(&player_id) {
        session.queue(frame);
    }
}

/// Authoritative TCP game server.
pub struct Server {
    listener: TcpListener,
    world: SharedWorld,
    sessions: Sessions,
    tick_duration: Duration,
}

impl Server {
    pub async fn new(addr: &str, tick_duration: Duration) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            world: Arc::new(RwLock::new(World::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            tick_duration,
        })
    }

    /// The actually bound address, for callers that bound port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the tick loop and the accept loop until the listener fails.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        {
            let world = Arc::clone(&self.world);
            let sessions = Arc::clone(&self.sessions);
            let tick_duration = self.tick_duration;
            tokio::spawn(async move {
                tick_loop(world, sessions, tick_duration).await;
            });
        }

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let world = Arc::clone(&self.world);
            let sessions = Arc::clone(&self.sessions);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, world, sessions).await {
                    warn!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    }
}

/// Per-tick simulation step and snapshot broadcast. Nothing is sent
/// while the server is empty.
async fn tick_loop(world: SharedWorld, sessions: Sessions, tick_duration: Duration) {
    let mut encoder = Encoder::new();
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let (respawned, snapshot) = {
            let mut world = world.write().await;
            let respawned = world.tick();
            if world.player_count() == 0 {
                continue;
            }
            (respawned, world.snapshot())
        };

        for id in respawned {
            info!("Player {} respawned", id);
        }
        if let Some(frame) = encode_frame(encoder.encode_world_state(&snapshot)) {
            broadcast(&sessions, frame, None).await;
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    world: SharedWorld,
    sessions: Sessions,
) -> Result<(), Box<dyn std::error::Error>> {
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let mut encoder = Encoder::new();

    // Admit the player and capture the welcome frames under one lock.
    let (player_id, welcome) = {
        let mut world = world.write().await;
        let player_id = world.allocate_player();
        let mut welcome = Vec::new();

        if let Some(player) = world.player(player_id) {
            if let Some(frame) = encode_frame(encoder.encode_handshake(player_id, &player.stats)) {
                welcome.push(frame);
            }
        }
        if let Some(frame) = encode_frame(encoder.encode_world_state(&world.snapshot())) {
            welcome.push(frame);
        }
        // Announce every item still on the ground with the reserved
        // player id 0.
        for item in world.uncollected_items() {
            if let Some(frame) = encode_frame(encoder.encode_item_pickup(
                0,
                item.id,
                item.kind,
                item.x,
                item.y,
                item.experience_reward,
            )) {
                welcome.push(frame);
            }
        }
        (player_id, welcome)
    };
    info!("Player {} connected from {}", player_id, addr);

    let session = Session::spawn(player_id, write_half);
    for frame in welcome {
        session.queue(frame);
    }
    sessions.write().await.insert(player_id, session.clone());

    // Tell everyone else about the newcomer.
    let join_frame = {
        let world = world.read().await;
        world.player(player_id).and_then(|player| {
            encode_frame(encoder.encode_player_join(
                player_id,
                player.x,
                player.y,
                player.direction,
                &player.stats,
            ))
        })
    };
    if let Some(frame) = join_frame {
        broadcast(&sessions, frame, Some(player_id)).await;
    }

    receive_loop(read_half, &session, &world, &sessions).await;

    // Teardown: forget the session, drop the player, tell the others.
    session.disconnect();
    sessions.write().await.remove(&player_id);
    world.write().await.remove_player(player_id);
    if let Some(frame) = encode_frame(encoder.encode_player_leave(player_id)) {
        broadcast(&sessions, frame, None).await;
    }
    info!("Player {} disconnected", player_id);
    Ok(())
}

async fn receive_loop(mut read_half: OwnedReadHalf, session: &Session, world: &SharedWorld, sessions: &Sessions) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let mut decoder = Decoder::new();

    loop {
        tokio::select! {
            read = read_half.read(&mut buffer) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        let result = decoder.decode(&buffer[..n]);
                        for packet in result.packets {
                            process_packet(packet, session, world, sessions).await;
                        }
                    }
                    Err(e) => {
                        debug!("Read from player {} failed: {}", session.player_id, e);
                        break;
                    }
                }
            }
            _ = session.closed() => break,
        }
        if !session.is_connected() {
            break;
        }
    }
}

async fn process_packet(packet: Packet, session: &Session, world: &SharedWorld, sessions: &Sessions) {
    let player_id = session.player_id;
    let mut encoder = Encoder::new();

    match packet {
        Packet::PlayerUpdate {
            position,
            direction,
            sprite_frame,
            ..
        } => {
            // The session id is authoritative; whatever id the client
            // wrote is ignored.
            let applied = world
                .write()
                .await
                .update_player(player_id, position, direction, sprite_frame);
            if applied {
                if let Some(frame) = encode_frame(encoder.encode_player_update(
                    player_id, position, direction, sprite_frame,
                )) {
                    broadcast(sessions, frame, Some(player_id)).await;
                }
            }
        }

        Packet::Attack { direction, .. } => {
            handle_attack(player_id, direction, &mut encoder, world, sessions).await;
        }

        Packet::ItemPickup { item_id, .. } => {
            let outcome = world.write().await.apply_pickup(player_id, item_id);
            let Some(outcome) = outcome else {
                return;
            };
            if let Some(frame) = encode_frame(encoder.encode_item_remove(outcome.item_id)) {
                broadcast(sessions, frame, None).await;
            }
            if let Some(frame) = encode_frame(encoder.encode_item_pickup(
                player_id,
                outcome.item_id,
                outcome.kind,
                outcome.x,
                outcome.y,
                outcome.experience_reward,
            )) {
                send_to(sessions, player_id, frame).await;
            }
            if let Some(frame) = encode_frame(encoder.encode_player_experience(
                player_id,
                outcome.experience,
                outcome.experience_to_next_level,
                outcome.level,
            )) {
                send_to(sessions, player_id, frame).await;
            }
        }

        other => {
            warn!(
                "Unexpected {:?} packet from player {}",
                other.packet_type(),
                player_id
            );
        }
    }
}

async fn handle_attack(
    attacker_id: u16,
    direction: Direction,
    encoder: &mut Encoder,
    world: &SharedWorld,
    sessions: &Sessions,
) {
    let (outcome, attacker_pos, snapshot): (AttackOutcome, Option<(u16, u16)>, _) = {
        let mut world = world.write().await;
        let attacker_pos = world.player(attacker_id).map(|p| (p.x, p.y));
        let outcome = world.resolve_attack(attacker_id, direction);
        let snapshot = if outcome.hits.iter().any(|h| h.killed) {
            Some(world.snapshot())
        } else {
            None
        };
        (outcome, attacker_pos, snapshot)
    };
    let Some((x, y)) = attacker_pos else {
        return;
    };

    // Relay the swing itself so clients can animate it, using the
    // authoritative attacker position.
    if let Some(frame) = encode_frame(encoder.encode_attack(attacker_id, direction, x, y)) {
        broadcast(sessions, frame, None).await;
    }

    for hit in &outcome.hits {
        if let Some(frame) = encode_frame(encoder.encode_player_damage(
            attacker_id,
            hit.target_id,
            hit.damage,
            hit.health,
            hit.max_health,
            hit.level,
        )) {
            broadcast(sessions, frame, None).await;
        }

        // Knockback reconciliation goes to the hit player only.
        if let Some(frame) =
            encode_frame(encoder.encode_player_hit(attacker_id, hit.target_id, hit.push_x, hit.push_y))
        {
            send_to(sessions, hit.target_id, frame).await;
        }

        if hit.killed {
            if let Some(frame) = encode_frame(encoder.encode_player_death(hit.target_id, attacker_id)) {
                broadcast(sessions, frame, None).await;
            }
            spawn_death_cleanup(hit.target_id, Arc::clone(sessions));
        }
    }

    if let Some(snapshot) = snapshot {
        if let Some(frame) = encode_frame(encoder.encode_world_state(&snapshot)) {
            broadcast(sessions, frame, None).await;
        }
    }

    if let Some(gain) = outcome.experience {
        if let Some(frame) = encode_frame(encoder.encode_player_experience(
            attacker_id,
            gain.experience,
            gain.experience_to_next_level,
            gain.level,
        )) {
            broadcast(sessions, frame, None).await;
        }
    }
}

/// Gives a killed player's client a grace period, then forces the
/// session closed if it is still around.
fn spawn_death_cleanup(target_id: u16, sessions: Sessions) {
    tokio::spawn(async move {
        tokio::time::sleep(DEATH_CLEANUP_DELAY).await;
        if let Some(session) = sessions.read().await.get(&target_id) {
            info!("Cleaning up session for killed player {}", target_id);
            session.disconnect();
        }
    });
}
