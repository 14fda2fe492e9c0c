//! # Arena Server Library
//!
//! Authoritative server for a grid-locked light-wall arena. Every connected
//! client steers a vehicle that moves one grid unit per tick and leaves a
//! wall behind it; touching any wall or leaving the arena eliminates the
//! vehicle until it respawns after a fixed delay. Clients only render state
//! and send turn intents; position, heading, walls, collisions and score are
//! decided here.
//!
//! ## Simulation Core
//!
//! ### Spatial Index (`spatial_index`)
//! Uniform grid mapping wall segments to the cells their endpoints hash to,
//! so a collision check only looks at the 3x3 block of cells around the
//! candidate point no matter how long the match has been running.
//!
//! ### Trail Store (`trail`)
//! Owns the global oldest-first list of wall segments and every vehicle's
//! bounded position history, and keeps the spatial index consistent with
//! every insertion, eviction and clear.
//!
//! ### Vehicles and Collisions (`vehicle`, `collision`)
//! Vehicles are `Alive` or `Dead`. A candidate step is checked against the
//! arena boundary and then against nearby walls, skipping only the moving
//! vehicle's own newest wall. The owner of the wall that was hit earns a
//! point unless it is the vehicle itself.
//!
//! ### Spawning (`spawn`)
//! Samples interior points until one is far enough from vehicles and walls,
//! falling back to an unchecked point once the attempt budget runs out.
//!
//! ### Tick Loop (`simulation`)
//! Applies due respawns, then queued turns, then advances every live vehicle
//! in ascending id order. All state lives in one [`simulation::Simulation`]
//! value, so a single task driving it serializes every mutation.
//!
//! ## Transport Shell
//!
//! `client_manager` and `network` wrap the simulation in a UDP server: a
//! receiver task, a sender task and a timeout checker feed one
//! `tokio::select!` loop that owns the simulation and ticks it at a fixed
//! rate.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::SimConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", SimConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod collision;
pub mod config;
pub mod network;
pub mod simulation;
pub mod spatial_index;
pub mod spawn;
pub mod trail;
pub mod vehicle;
