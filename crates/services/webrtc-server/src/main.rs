//! WebRTC relay server binary entry point
//!
//! Serves the browser client from a static directory, accepts one control
//! channel per client at `/ws`, and forwards RTP received on the ingest
//! socket into each client's video and audio tracks.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: HTTP on 0.0.0.0:8080, RTP ingest on 127.0.0.1:5004
//! cargo run -p relay-webrtc-server
//!
//! # Custom addresses and static root
//! cargo run -p relay-webrtc-server -- \
//!   --bind-address 127.0.0.1:9000 \
//!   --ingest-address 0.0.0.0:6000 \
//!   --static-dir ./web
//!
//! # Host candidates only (no STUN), JSON logs
//! cargo run -p relay-webrtc-server -- --no-stun --json-logs
//!
//! # Feed it test media
//! ffmpeg -re -f lavfi -i testsrc=size=640x480:rate=30 -c:v libvpx -payload_type 96 \
//!   -f rtp rtp://127.0.0.1:5004
//! ```

use clap::Parser;
use relay_webrtc::config::DEFAULT_STUN_SERVER;
use relay_webrtc::{RelayConfig, RelayServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// WebRTC media relay
///
/// Browser signaling over WebSocket, VP8/Opus RTP ingest over UDP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP listen address (upgrade endpoint + static files)
    #[arg(long, default_value = "0.0.0.0:8080", env = "RELAY_BIND_ADDRESS")]
    bind_address: SocketAddr,

    /// Directory served as the static file root
    #[arg(long, default_value = "static", env = "RELAY_STATIC_DIR")]
    static_dir: PathBuf,

    /// Local UDP address receiving RTP (port 0 picks a port per session)
    #[arg(long, default_value = "127.0.0.1:5004", env = "RELAY_INGEST_ADDRESS")]
    ingest_address: SocketAddr,

    /// STUN server used for candidate discovery
    #[arg(long, default_value = DEFAULT_STUN_SERVER, env = "RELAY_STUN_SERVER")]
    stun_server: String,

    /// Gather host candidates only
    #[arg(long, default_value_t = false, env = "RELAY_NO_STUN")]
    no_stun: bool,

    /// Packets buffered per media kind before loss is concealed
    #[arg(long, default_value_t = 10, env = "RELAY_REASSEMBLY_WINDOW")]
    reassembly_window: usize,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false, env = "RELAY_JSON_LOGS")]
    json_logs: bool,
}

impl Args {
    fn into_config(self) -> RelayConfig {
        let stun = if self.no_stun {
            None
        } else {
            Some(self.stun_server.as_str())
        };

        RelayConfig::default()
            .with_bind_address(self.bind_address)
            .with_static_dir(self.static_dir.clone())
            .with_ingest_address(self.ingest_address)
            .with_stun_server(stun)
            .with_reassembly_window(self.reassembly_window)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up Ctrl+C handler at the very start
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = Arc::clone(&shutdown_flag);

    ctrlc::set_handler(move || {
        eprintln!("\nCtrl+C received, shutting down...");

        let was_already_set = shutdown_flag_handler.swap(true, Ordering::SeqCst);
        if was_already_set {
            eprintln!("Shutdown already in progress, forcing exit");
            std::process::exit(0);
        }

        // Sessions get a few seconds to close their peer connections
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_secs(3));
            eprintln!("Graceful shutdown timed out (3s), forcing exit");
            std::process::exit(0);
        });
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("relay-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, shutdown_flag))
}

async fn async_main(
    args: Args,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(args.json_logs);

    info!(
        version = relay_webrtc::version(),
        "WebRTC relay starting"
    );

    let config = args.into_config();
    let server = RelayServer::new(config)?;

    let cfg = server.config();
    info!(
        bind_address = %cfg.bind_address,
        static_dir = ?cfg.static_dir,
        ingest_address = %cfg.ingest_address,
        stun_server = ?cfg.stun_server,
        reassembly_window = cfg.reassembly_window,
        "Configuration loaded"
    );

    let handle = server.start().await?;
    info!(
        "Relay running on http://{}. Press Ctrl+C to shutdown.",
        handle.local_addr()
    );

    while !shutdown_flag.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    info!("Shutdown signal received, cleaning up...");
    handle.shutdown().await?;
    info!("Relay shut down gracefully");

    Ok(())
}

fn init_tracing(json: bool) {
    // RUST_LOG wins; otherwise info
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
