//! End-to-end scenarios driving a real `Server<FakeJtag>` over TCP through
//! `xvc-client`, covering the handshake, clock-set and shift wire paths.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

use xvc_client::XvcClient;
use xvc_server::server::{Config, Server};
use xvc_tests::FakeJtag;

static NEXT_PORT: AtomicU16 = AtomicU16::new(28542);

fn spawn_server(jtag: FakeJtag) -> SocketAddr {
    let port = NEXT_PORT.fetch_add(1, Ordering::SeqCst);
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    thread::spawn(move || {
        let server = Server::new(jtag, Config::default());
        server.listen(addr).expect("server failed to bind");
    });
    // Give the listener a moment to bind before the first connection
    // attempt; the server has no readiness signal to block on instead.
    thread::sleep(Duration::from_millis(50));
    addr
}

#[test]
fn handshake_reports_version_and_max_vector_size() {
    let addr = spawn_server(FakeJtag::default());
    let mut client = XvcClient::new(addr).expect("connect");
    let info = client.get_info().expect("getinfo");
    assert_eq!(info.version(), xvc_protocol::Version::V1_0);
    assert!(info.max_vector_len() > 0);
}

#[test]
fn clock_set_never_exceeds_fake_adapters_ceiling() {
    let addr = spawn_server(FakeJtag::new(1_000_000));
    let mut client = XvcClient::new(addr).expect("connect");
    let period = client.set_tck(1000).expect("settck"); // 1000 ns = 1 MHz request
    let actual_hz = 1_000_000_000u64 / period as u64;
    assert!(actual_hz <= 1_000_000);
}

#[test]
fn single_bit_shift_round_trips_through_loopback() {
    let addr = spawn_server(FakeJtag::default());
    let mut client = XvcClient::new(addr).expect("connect");
    let tdo = client.shift(1, &[0x00], &[0x01]).expect("shift");
    assert_eq!(tdo.len(), 1);
    assert_eq!(tdo[0] & 0x01, 0x01);
}

#[test]
fn five_bit_shift_returns_one_byte() {
    let addr = spawn_server(FakeJtag::default());
    let mut client = XvcClient::new(addr).expect("connect");
    let tdo = client.shift(5, &[0x1F], &[0x00]).expect("shift");
    assert_eq!(tdo.len(), 1);
}

#[test]
fn mixed_length_shift_preserves_byte_count() {
    let addr = spawn_server(FakeJtag::default());
    let mut client = XvcClient::new(addr).expect("connect");
    let tdo = client.shift(10, &[0x1F, 0x00], &[0b0110_0110, 0b0000_0001]).expect("shift");
    assert_eq!(tdo.len(), 2);
}

#[test]
fn zero_length_shift_returns_empty_vector() {
    let addr = spawn_server(FakeJtag::default());
    let mut client = XvcClient::new(addr).expect("connect");
    let tdo = client.shift(0, &[], &[]).expect("shift");
    assert_eq!(tdo.len(), 0);
}
