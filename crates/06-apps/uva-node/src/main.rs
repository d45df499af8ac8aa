//! Launcher for a window server or a node joining one.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use transport::TransportConfig;
use uva_protocol::AddressWindow;
use uva_runtime::{NodeRole, PeerAddress, RuntimeConfig, UvaCoordinator, DEFAULT_ACCEPTED_BEGIN};
use window_server::{ServerConfig, WindowServer};

#[derive(Parser, Debug)]
#[command(author, version, about = "Shared address window node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the canonical window content.
    Serve(ServeArgs),
    /// Join a running window server as a node.
    Join(JoinArgs),
}

#[derive(Args, Debug)]
struct WindowArgs {
    /// First address of the shared window (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_addr, default_value_t = DEFAULT_ACCEPTED_BEGIN)]
    window_begin: usize,

    /// Length of the shared window in bytes
    #[arg(long, value_parser = parse_addr, default_value_t = 0x1000)]
    window_len: usize,
}

impl WindowArgs {
    fn window(&self) -> Result<AddressWindow> {
        AddressWindow::from_len(self.window_begin, self.window_len)
            .context("invalid window bounds")
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind (ip or host)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, default_value_t = 7070)]
    port: u16,

    #[command(flatten)]
    window: WindowArgs,

    /// Bytes copied to the start of the window before serving
    #[arg(long)]
    image: Option<PathBuf>,

    /// Admit participants on accept instead of after init completion
    #[arg(long)]
    no_gate: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Authority,
    Participant,
}

impl From<RoleArg> for NodeRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Authority => NodeRole::Authority,
            RoleArg::Participant => NodeRole::Participant,
        }
    }
}

#[derive(Args, Debug)]
struct JoinArgs {
    /// File holding `<ip> <port>` of the window server
    #[arg(long, conflicts_with_all = ["host", "port"])]
    server_desc: Option<PathBuf>,

    /// Window server host
    #[arg(long)]
    host: Option<String>,

    /// Window server port
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, value_enum, default_value_t = RoleArg::Participant)]
    role: RoleArg,

    #[command(flatten)]
    window: WindowArgs,

    /// Per-read/write timeout in seconds; blocks forever when absent
    #[arg(long)]
    io_timeout: Option<u64>,
}

impl JoinArgs {
    fn peer(&self) -> Result<PeerAddress> {
        if let Some(path) = &self.server_desc {
            return PeerAddress::from_desc_file(path)
                .with_context(|| format!("failed to read server descriptor {path:?}"));
        }
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Ok(PeerAddress::new(host.clone(), port)),
            _ => bail!("either --server-desc or both --host and --port are required"),
        }
    }
}

fn parse_addr(raw: &str) -> Result<usize, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|err| format!("`{raw}`: {err}"))
}

fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Serve(args) => serve(args),
        Command::Join(args) => join(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn serve(args: ServeArgs) -> Result<()> {
    let bind: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("failed to parse bind address")?;
    let mut config = ServerConfig::new(bind, args.window.window()?).with_gate(!args.no_gate);
    if let Some(path) = &args.image {
        let image = fs::read(path).with_context(|| format!("failed to read image {path:?}"))?;
        config = config.with_image(image);
    }

    let server = WindowServer::bind(config).with_context(|| format!("failed to bind {bind}"))?;
    server.run().context("window server exited with error")
}

fn join(args: JoinArgs) -> Result<()> {
    let peer = args.peer()?;
    let window = args.window.window()?;
    let role = NodeRole::from(args.role);
    let transport = TransportConfig::default().with_io_timeout(args.io_timeout.map(Duration::from_secs));
    let config = RuntimeConfig::new(peer.clone(), window)
        .with_role(role)
        .with_transport(transport);

    // SAFETY: this process maps nothing at the window or accepted ranges; the
    // coordinator owns them until `finalize`.
    let mut coordinator = unsafe { UvaCoordinator::initialize(&config) }
        .with_context(|| format!("failed to join {peer}"))?;
    coordinator
        .startup_gate(role)
        .context("startup gate rejected this node")?;

    // The first touch faults and pulls the window's canonical bytes.
    // SAFETY: the address lies in the window, which the interceptor services.
    let first = unsafe { std::ptr::read_volatile(window.begin() as *const u8) };
    info!(first = format_args!("{first:#04x}"), "window fetched");

    if role == NodeRole::Authority {
        coordinator
            .complete_init()
            .context("init completion was not acknowledged")?;
    }

    let stats = coordinator.stats();
    info!(pages = stats.mapped_pages, fetches = stats.fetches, "node finished");
    coordinator.finalize().context("finalize failed")?;
    Ok(())
}
