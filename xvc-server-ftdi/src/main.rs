//! # XVC Server for FTDI MPSSE Adapters
//!
//! Bridges the Xilinx Virtual Cable (XVC) protocol to a physical JTAG
//! chain over an FTDI FT2232H/FT232H/FT4232H adapter's MPSSE engine.
//!
//! ## Overview
//!
//! This binary extends [`xvc_server`] with a USB-facing backend: it owns
//! the FTDI device, translates each `shift:` command's TMS/TDI vectors
//! into MPSSE opcodes via the shift engine, and reports TCK/vector-size
//! capability queries against the adapter's real FIFO sizes.
mod backend;
mod bitvec;
mod controller;
mod engine;
mod error;
mod mpsse;
mod tap;
mod transport;

use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use clap_num::number_range;
use env_logger::Env;
use log::LevelFilter;
use xvc_server::server::{Config, Server};

use crate::backend::FtdiBackend;
use crate::controller::{AdapterConfig, JtagController};

/// The default adapter URL, used when neither `--url` nor `FTDI_DEVICE`
/// is given. An FT4232H's first MPSSE-capable interface.
const DEFAULT_FTDI_URL: &str = "ftdi://0403:6011/1";

/// Backend drivers this binary knows how to build. A registry of one
/// entry on purpose: pure bit-bang/GPIO-mode adapters are out of scope
/// here, so there is nothing else to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AdapterKind {
    Ftdi,
}

fn parse_port(s: &str) -> Result<u16, String> {
    number_range(s, 1u16, u16::MAX)
}

#[derive(Parser)]
#[command(about = "Xilinx Virtual Cable (XVC) server for FTDI MPSSE JTAG adapters", long_about = None)]
struct Args {
    /// Backend driver to use.
    adapter: AdapterKind,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 2542, value_parser = parse_port)]
    port: u16,

    /// Pulse TRST before accepting clients, for adapters that drive it.
    #[arg(long)]
    reset: bool,

    /// Increase logging verbosity (repeatable; capped at 4: warn, info,
    /// debug, trace, trace-with-deps).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Shorthand for `-vv` (debug logging).
    #[arg(short, long)]
    debug: bool,

    /// Bind to 127.0.0.1 instead of the primary outbound IPv4 address.
    #[arg(short, long)]
    local: bool,

    /// Explicit FTDI adapter URL (`ftdi://<vendor>:<product>/<interface>`),
    /// overriding `FTDI_DEVICE` and the built-in default. Not part of the
    /// original CLI surface; added since a hardware-facing backend needs
    /// some way to target a specific board without an environment edit.
    #[arg(long)]
    url: Option<String>,
}

fn log_level(args: &Args) -> LevelFilter {
    if args.debug {
        return LevelFilter::Debug;
    }
    match args.verbose.min(4) {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// The address a socket would use to reach the public internet, without
/// actually sending any packets (`connect` on a UDP socket only consults
/// the routing table).
fn primary_outbound_ipv4() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn adapter_url(args: &Args) -> String {
    args.url
        .clone()
        .or_else(|| std::env::var("FTDI_DEVICE").ok())
        .unwrap_or_else(|| DEFAULT_FTDI_URL.to_string())
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level(&args).to_string())).init();
    log::info!("Starting XVC server (adapter: {:?})", args.adapter);

    let url = adapter_url(&args);
    log::debug!("Adapter URL: {}", url);

    let adapter_config = AdapterConfig {
        url,
        ..AdapterConfig::default()
    };
    let mut controller = JtagController::new(adapter_config);
    controller.configure()?;
    log::info!(
        "Adapter configured: read_fifo={} write_fifo={}",
        controller.read_fifo_len(),
        controller.write_fifo_len()
    );

    if args.reset {
        log::info!("Pulsing TRST before accepting clients");
        controller.reset_tap()?;
    }

    let backend = Arc::new(FtdiBackend::new(controller));
    let shutdown_backend = Arc::clone(&backend);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let signal_handle = std::thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received interrupt, closing JTAG adapter");
                shutdown_backend.close();
                std::process::exit(0);
            }
        });
    });

    let ip = if args.local {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        primary_outbound_ipv4()
    };
    let addr = SocketAddr::new(ip, args.port);
    log::info!("Binding to address: {}", addr);

    let config = Config {
        read_write_timeout: Duration::from_secs(10),
        ..Config::default()
    };
    let server = Server::new(backend, config);

    // Reached only if `listen` returns on its own (it normally doesn't;
    // Ctrl-C exits the process directly from the signal thread above).
    let result = server.listen(addr);
    let _ = signal_handle;
    result
}

fn main() {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
