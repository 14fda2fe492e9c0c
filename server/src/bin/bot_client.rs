//! Headless client that joins the arena and steers at random.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use rand::Rng;
use shared::{GameEvent, GameSnapshot, Packet, SnapshotAssembler, VehicleId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Vehicle color requested on join
    #[arg(short, long, default_value = "")]
    color: String,

    /// How long to stay connected, in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,

    /// Chance of sending a turn each decision interval
    #[arg(long, default_value = "0.2")]
    turn_chance: f64,
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    server: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, server).await?;
    Ok(())
}

/// Collects the join header and snapshot chunks. `None` if the server refused.
async fn receive_snapshot(
    socket: &UdpSocket,
    buf: &mut [u8],
) -> Result<Option<(VehicleId, GameSnapshot)>, Box<dyn std::error::Error>> {
    let mut assembler = SnapshotAssembler::new();
    loop {
        let (len, _) = socket.recv_from(buf).await?;
        match assembler.push(deserialize::<Packet>(&buf[..len])?) {
            Some(Packet::Disconnected { reason }) => {
                warn!("Server refused join: {}", reason);
                return Ok(None);
            }
            Some(_) => {}
            None => {
                if let Some(joined) = assembler.finish() {
                    return Ok(Some(joined));
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let server_addr: SocketAddr = args.server.parse()?;
    info!("Bot bound to {}", socket.local_addr()?);

    let join = Packet::Join {
        client_version: PROTOCOL_VERSION,
        color: args.color.clone(),
    };
    send(&socket, &join, server_addr).await?;

    let mut buf = [0u8; 65536];
    let joined = timeout(Duration::from_secs(5), receive_snapshot(&socket, &mut buf)).await??;

    let Some((vehicle_id, snapshot)) = joined else {
        return Ok(());
    };
    info!(
        "Joined as vehicle {} ({} vehicles, {} wall segments in arena)",
        vehicle_id,
        snapshot.vehicles.len(),
        snapshot.segments.len()
    );

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut decide = interval(Duration::from_millis(250));
    let mut heartbeat = interval(Duration::from_secs(1));
    let mut deaths = 0u32;
    let mut score = 0u32;

    while Instant::now() < deadline {
        tokio::select! {
            _ = decide.tick() => {
                let roll: f64 = rand::thread_rng().gen();
                if roll < args.turn_chance {
                    let packet = if rand::thread_rng().gen_bool(0.5) {
                        Packet::TurnLeft
                    } else {
                        Packet::TurnRight
                    };
                    send(&socket, &packet, server_addr).await?;
                }
            }
            _ = heartbeat.tick() => {
                send(&socket, &Packet::Heartbeat, server_addr).await?;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(Packet::Event { tick, event }) if event.vehicle_id() == vehicle_id => {
                        match event {
                            GameEvent::VehicleCollided { attributed_to, .. } => {
                                deaths += 1;
                                info!("Tick {}: crashed (wall of {:?})", tick, attributed_to);
                            }
                            GameEvent::ScoreChanged { new_score, .. } => {
                                score = new_score;
                                info!("Tick {}: score is now {}", tick, score);
                            }
                            GameEvent::VehicleRespawned { position, .. } => {
                                info!("Tick {}: respawned at ({}, {})", tick, position.x, position.z);
                            }
                            _ => {}
                        }
                    }
                    Ok(Packet::Disconnected { reason }) => {
                        warn!("Disconnected by server: {}", reason);
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    send(&socket, &Packet::Disconnect, server_addr).await?;
    info!("Bot finished: {} deaths, score {}", deaths, score);
    Ok(())
}
