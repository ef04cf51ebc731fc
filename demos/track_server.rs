//! Live track server example
//!
//! Run with: cargo run --example track_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example track_server                    # binds to 0.0.0.0:8000
//!   cargo run --example track_server localhost          # binds to 127.0.0.1:8000
//!   cargo run --example track_server 127.0.0.1:8001     # binds to 127.0.0.1:8001
//!
//! ## Storage
//!
//! Set `REDIS_URL` (e.g. `redis://127.0.0.1/`) to keep tracks in Redis.
//! Without it tracks live in memory and a demo track `1` is created.
//!
//! ## Authentication
//!
//! Set `TRACKCAST_TOKEN` to require that token in `hello`. Without it every
//! connection is accepted.
//!
//! ## Talking to it
//!
//! ```text
//! $ nc localhost 8000
//! {"event":"hello","data":{"token":null}}
//! {"event":"watch track","data":{"trackid":"1"}}
//! {"event":"new point","data":{"lat":45.52,"lon":-122.68}}
//! {"event":"get track","data":{"trackid":"1"}}
//! ```
//!
//! Open a second `nc` on the same track to see points arrive live.

use std::net::SocketAddr;

use trackcast::server::DEFAULT_PORT;
use trackcast::{
    AllowAll, Authenticator, KvStore, MemoryStore, RedisStore, ServerConfig, StaticTokens,
    TrackHeader, TrackId, TrackRepository, TrackServer,
};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8000
/// - "localhost:8001" -> 127.0.0.1:8001
/// - "127.0.0.1" -> 127.0.0.1:8000
/// - "0.0.0.0:8000" -> 0.0.0.0:8000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: track_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  REDIS_URL        Redis connection URL (default: in-memory store)");
    eprintln!("  TRACKCAST_TOKEN  Token required in hello (default: accept everyone)");
}

async fn serve<S: KvStore, A: Authenticator>(
    config: ServerConfig,
    repository: TrackRepository<S>,
    auth: A,
) -> trackcast::Result<()> {
    let server = TrackServer::new(config, repository, auth);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    let stats = server.service().stats();
    println!(
        "Stats: connections={} points={} deliveries={} dropped={} rate={:.2}/s",
        stats.connections_total,
        stats.points_persisted,
        stats.deliveries,
        stats.dropped_deliveries,
        stats.persist_rate(),
    );

    Ok(())
}

async fn serve_with_auth<S: KvStore>(
    config: ServerConfig,
    repository: TrackRepository<S>,
) -> trackcast::Result<()> {
    match std::env::var("TRACKCAST_TOKEN") {
        Ok(token) => {
            let auth = StaticTokens::new().with_token(token, "demo");
            serve(config, repository, auth).await
        }
        Err(_) => serve(config, repository, AllowAll).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default().bind_addr,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trackcast=debug".parse()?)
                .add_directive("track_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr);
    println!("Starting track server on {}", config.bind_addr);

    match std::env::var("REDIS_URL") {
        Ok(url) => {
            let store = RedisStore::connect(&url).await?;
            serve_with_auth(config, TrackRepository::new(store)).await?;
        }
        Err(_) => {
            let repository = TrackRepository::new(MemoryStore::new());
            let header = TrackHeader::from([("name".to_string(), "Demo track".to_string())]);
            repository.create_track(&TrackId::new("1"), &header).await?;
            println!("Using in-memory store with demo track 1");

            serve_with_auth(config, repository).await?;
        }
    }

    Ok(())
}
