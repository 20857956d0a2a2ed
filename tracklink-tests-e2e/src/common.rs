//! End-to-end test helpers: an in-process protocol listener backed by a
//! recording bus instead of a real broker.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use tracklink_core::codec::FrameCodec;
use tracklink_server::bus::{Publisher, RecordingBusProducer};
use tracklink_server::metrics::ConnectionCount;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub fn pick_free_port() -> TestResult<u16> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Start one protocol's accept loop on a free loopback port. Returns the
/// address to connect to and the receiving end of the recording bus,
/// where every `publish()` call surfaces as `(topic, json_bytes)`.
pub async fn spawn_protocol<C: FrameCodec + Default + Send + 'static>(
) -> TestResult<(SocketAddr, mpsc::UnboundedReceiver<(&'static str, Vec<u8>)>)> {
    let port = pick_free_port()?;
    let (producer, rx) = RecordingBusProducer::new();
    let (publisher, _writer) = Publisher::spawn(Arc::new(producer), 32);
    let publisher = Arc::new(publisher);
    let connections = Arc::new(ConnectionCount::default());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let _ = tracklink_server::listener::run::<C>(port, publisher, connections, shutdown_rx).await;
    });
    // Give the listener a moment to bind.
    sleep(Duration::from_millis(50)).await;
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse()?;
    Ok((addr, rx))
}

pub fn et300_frame(opcode: u8, payload: &[u8], serial_no: u16) -> Vec<u8> {
    use tracklink_core::crc::crc16_x25;

    let mut body = vec![opcode];
    body.extend_from_slice(payload);
    body.extend_from_slice(&serial_no.to_be_bytes());
    // the wire length field counts opcode+payload+serial+crc, so it runs
    // 2 bytes ahead of `body` (which doesn't include the crc yet).
    let length = (body.len() + 2) as u8;
    let mut crc_region = vec![length];
    crc_region.extend_from_slice(&body);
    let crc = crc16_x25(&crc_region);

    let mut frame = vec![0x78, 0x78, length];
    frame.extend_from_slice(&body);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame.extend_from_slice(&[0x0D, 0x0A]);
    frame
}

/// Same framing as [`et300_frame`] but with the CRC bytes corrupted, for
/// exercising the malformed-frame termination path.
pub fn corrupt_crc_frame(opcode: u8, payload: &[u8], serial_no: u16) -> Vec<u8> {
    let mut frame = et300_frame(opcode, payload, serial_no);
    let crc_offset = frame.len() - 4;
    frame[crc_offset] ^= 0xFF;
    frame
}

/// `(<imei><opcode><body>)`, the shared GT02/TK103 ASCII framing.
pub fn ascii_frame(imei: &str, opcode: &str, body: &str) -> Vec<u8> {
    format!("({imei}{opcode}{body})").into_bytes()
}

/// A 62-byte fixed-width location body with every field aligned to the
/// documented byte offsets, fix-valid or fix-invalid per `fix_valid`.
pub fn ascii_location_body(fix_valid: bool) -> String {
    let flag = if fix_valid { 'A' } else { 'V' };
    format!("230501{flag}2836.8340N07712.5400E0004212000000009001010010X00002710")
}
