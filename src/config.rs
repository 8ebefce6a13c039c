use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use clap::Parser;

/// Fixed endpoint of the storage service.
pub const DEFAULT_ADDR: &str = "localhost:50052";

pub const DEFAULT_PORT: u16 = 50052;

/// Interactive harness for a remote key-value storage service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct HarnessArgs {
    /// Address of the storage service.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,
}

/// In-memory storage service for the harness to talk to.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Socket address to listen on.
    #[arg(long, default_value_t = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), DEFAULT_PORT))]
    pub listen: SocketAddr,
}

/// Install the fmt subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
