//! Session tracking for connected clients.
//!
//! Maps UDP addresses to session ids, enforces the server capacity and
//! detects clients that stopped sending packets. Each session id doubles as
//! the id of the client's vehicle in the simulation.

use log::info;
use shared::VehicleId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const PALETTE: [&str; 8] = [
    "cyan", "magenta", "yellow", "orange", "lime", "red", "blue", "white",
];

/// Color used when a client joins without choosing one.
pub fn fallback_color(id: VehicleId) -> String {
    PALETTE[(id as usize).saturating_sub(1) % PALETTE.len()].to_string()
}

#[derive(Debug)]
pub struct Client {
    pub id: VehicleId,
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: VehicleId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<VehicleId, Client>,
    next_client_id: VehicleId,
    max_clients: usize,
}

impl ClientManager {
    /// Session ids start from 1 and are never reused within a run.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Returns the new session id, or `None` when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<VehicleId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &VehicleId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<VehicleId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the activity timestamp of the client at `addr`.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<VehicleId> {
        let client = self.clients.values_mut().find(|c| c.addr == addr)?;
        client.last_seen = Instant::now();
        Some(client.id)
    }

    /// Removes clients silent for longer than `timeout` and returns their ids.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<VehicleId> {
        let timed_out: Vec<VehicleId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(VehicleId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
