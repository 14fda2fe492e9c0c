use clap::Parser;
use log::info;
use server::config::SimConfig;
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// JSON file with simulation settings; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tick rate (updates per second)
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Half the side length of the square arena
    #[arg(long)]
    arena_half_size: Option<i32>,

    /// Maximum trail length per vehicle
    #[arg(long)]
    max_trail: Option<usize>,

    /// Respawn delay in milliseconds
    #[arg(long)]
    respawn_delay_ms: Option<u64>,

    /// Maximum number of connected clients
    #[arg(short = 'm', long)]
    max_clients: Option<usize>,

    /// Seed for spawn placement
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<SimConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::default(),
        };

        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(half_size) = self.arena_half_size {
            config.arena_half_size = half_size;
        }
        if let Some(max_trail) = self.max_trail {
            config.max_trail_length = max_trail;
        }
        if let Some(delay) = self.respawn_delay_ms {
            config.respawn_delay = Duration::from_millis(delay);
        }
        if let Some(max_clients) = self.max_clients {
            config.max_clients = max_clients;
        }
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let config = args.into_config()?;

    info!(
        "Starting arena server: half-size {}, {} Hz, max trail {}",
        config.arena_half_size, config.tick_rate, config.max_trail_length
    );

    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
