//! Client-side connection handling: connect, decode inbound frames into
//! an event stream, and encode outbound requests.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use log::{debug, info};
use shared::codec::{Decoder, Encoder};
use shared::packet::{ItemKind, Packet};
use shared::protocol::Direction;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 256;
const READ_BUFFER_SIZE: usize = 4096;

/// What the connection tasks report back to the consumer.
#[derive(Debug)]
pub enum ClientEvent {
    Packet(Packet),
    Disconnected,
}

/// Handle to a live server connection. Dropping it closes the outbound
/// side; the event receiver then yields [`ClientEvent::Disconnected`].
pub struct Client {
    outbound: mpsc::Sender<Vec<u8>>,
    encoder: Encoder,
    player_id: Arc<AtomicU16>,
}

impl Client {
    /// Connects and spawns the reader and writer tasks. The returned
    /// receiver carries every decoded packet in arrival order.
    pub async fn connect(
        addr: &str,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);
        let (mut read_half, mut write_half) = stream.into_split();

        let (event_tx, event_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (outbound, mut send_queue) = mpsc::channel::<Vec<u8>>(QUEUE_CAPACITY);
        let player_id = Arc::new(AtomicU16::new(0));

        tokio::spawn(async move {
            while let Some(frame) = send_queue.recv().await {
                if let Err(e) = write_half.write_all(&frame).await {
                    debug!("Write failed: {}", e);
                    break;
                }
            }
        });

        let id_slot = Arc::clone(&player_id);
        tokio::spawn(async move {
            let mut decoder = Decoder::new();
            let mut buffer = [0u8; READ_BUFFER_SIZE];
            loop {
                match read_half.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(n) => {
                        for packet in decoder.decode(&buffer[..n]).packets {
                            if let Packet::Handshake { player_id, .. } = &packet {
                                id_slot.store(*player_id, Ordering::SeqCst);
                                info!("Assigned player id {}", player_id);
                            }
                            if event_tx.send(ClientEvent::Packet(packet)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Read failed: {}", e);
                        break;
                    }
                }
            }
            let _ = event_tx.send(ClientEvent::Disconnected).await;
        });

        Ok((
            Self {
                outbound,
                encoder: Encoder::new(),
                player_id,
            },
            event_rx,
        ))
    }

    /// The server-assigned id, or 0 before the handshake arrives.
    pub fn player_id(&self) -> u16 {
        self.player_id.load(Ordering::SeqCst)
    }

    async fn send(&self, frame: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
        self.outbound.send(frame).await?;
        Ok(())
    }

    pub async fn send_player_update(
        &mut self,
        position: Option<(u16, u16)>,
        direction: Option<Direction>,
        sprite_frame: Option<u8>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let id = self.player_id();
        let frame = self
            .encoder
            .encode_player_update(id, position, direction, sprite_frame)?;
        self.send(frame).await
    }

    /// Full movement update on the hot path; silently skipped when the
    /// position is out of bounds.
    pub async fn send_fast_update(
        &mut self,
        x: u16,
        y: u16,
        direction: Direction,
        sprite_frame: u8,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let id = self.player_id();
        if let Some(frame) = self.encoder.fast_player_update(id, x, y, direction, sprite_frame) {
            self.send(frame).await?;
        }
        Ok(())
    }

    pub async fn send_attack(
        &mut self,
        direction: Direction,
        x: u16,
        y: u16,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let id = self.player_id();
        let frame = self.encoder.encode_attack(id, direction, x, y)?;
        self.send(frame).await
    }

    /// Requests a pickup of an item previously announced by the server.
    pub async fn send_item_pickup(
        &mut self,
        item_id: u16,
        kind: ItemKind,
        x: u16,
        y: u16,
        experience_reward: u16,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let id = self.player_id();
        let frame = self
            .encoder
            .encode_item_pickup(id, item_id, kind, x, y, experience_reward)?;
        self.send(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::stats::PlayerStats;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn handshake_sets_player_id_and_surfaces_packet() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut encoder = Encoder::new();
            let stats = PlayerStats::with_values(1, 100, 100, 25, 0);
            let frame = encoder.encode_handshake(42, &stats).unwrap();
            stream.write_all(&frame).await.unwrap();
            stream
        });

        let (client, mut events) = Client::connect(&addr.to_string()).await.unwrap();
        assert_eq!(client.player_id(), 0);

        let event = events.recv().await.unwrap();
        match event {
            ClientEvent::Packet(Packet::Handshake { player_id, .. }) => {
                assert_eq!(player_id, 42);
            }
            other => panic!("expected handshake, got {other:?}"),
        }
        assert_eq!(client.player_id(), 42);
        drop(accept.await.unwrap());
    }

    #[tokio::test]
    async fn outbound_requests_arrive_as_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (mut client, _events) = Client::connect(&addr.to_string()).await.unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();

        client.send_attack(Direction::Right, 100, 100).await.unwrap();
        client
            .send_fast_update(100, 100, Direction::Right, 1)
            .await
            .unwrap();

        let mut decoder = Decoder::new();
        let mut packets = Vec::new();
        let mut buffer = [0u8; 256];
        while packets.len() < 2 {
            let n = stream.read(&mut buffer).await.unwrap();
            assert!(n > 0, "connection closed early");
            packets.extend(decoder.decode(&buffer[..n]).packets);
        }

        assert!(matches!(
            packets[0],
            Packet::Attack {
                player_id: 0,
                direction: Direction::Right,
                x: 100,
                y: 100,
            }
        ));
        assert!(matches!(packets[1], Packet::PlayerUpdate { .. }));
    }

    #[tokio::test]
    async fn server_close_yields_disconnected_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (_client, mut events) = Client::connect(&addr.to_string()).await.unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);

        match events.recv().await.unwrap() {
            ClientEvent::Disconnected => {}
            other => panic!("expected disconnect, got {other:?}"),
        }
    }
}
