//! One TCP connection, one [`Session`]. Generic over the device protocol's
//! [`FrameCodec`] so all six protocols share a single read loop, with
//! protocol specifics isolated in the codec layer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tracklink_core::frame::{DecodedFrame, StatusFields};
use tracklink_core::normalize::{self, OutboundRecord};
use tracklink_core::{Ack, FrameCodec};

use crate::bus::Publisher;
use crate::metrics::ConnectionCount;

/// The server reads up to this many bytes per `read()` and treats each
/// read as exactly one frame: a short read that splits a frame across
/// TCP segments is malformed, not a request for more bytes.
const READ_BUF_SIZE: usize = 4096;

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Per-connection session state, owned exclusively by this task. No
/// locks protect any of these fields — the session is their sole
/// mutator.
pub struct Session<C: FrameCodec> {
    codec: C,
    addr: SocketAddr,
    imei: Option<String>,
    last_serial_no: Option<u16>,
    last_status: Option<StatusFields>,
}

impl<C: FrameCodec + Default + Send + 'static> Session<C> {
    pub fn new(addr: SocketAddr) -> Self {
        Self { codec: C::default(), addr, imei: None, last_serial_no: None, last_status: None }
    }

    /// Drive one connection to completion. Returns once the peer closes
    /// the socket or a frame fails to decode; either way exactly one
    /// OFFLINE event is published if the session ever logged in, and the
    /// writer is closed on every exit path.
    pub async fn run(mut self, stream: TcpStream, publisher: Arc<Publisher>, connections: Arc<ConnectionCount>) {
        let (mut reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        let mut buf = vec![0u8; READ_BUF_SIZE];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!(addr = %self.addr, protocol = C::NAME, "connection closed by peer");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(addr = %self.addr, protocol = C::NAME, error = %e, "read error, ending session");
                    connections.increment_errors();
                    break;
                }
            };

            let frame = match self.codec.decode(&buf[..n]) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(addr = %self.addr, protocol = C::NAME, error = %e, "malformed frame, ending session");
                    connections.increment_errors();
                    break;
                }
            };

            if let Some(serial) = frame.serial_no() {
                self.last_serial_no = Some(serial);
            }

            let ack = self.codec.ack(&buf[..n], &frame);
            self.write_ack(&writer, ack).await;
            self.dispatch(frame, &publisher);
        }

        if let Some(imei) = self.imei.clone() {
            publisher.publish(normalize::offline_event(&imei, self.last_serial_no, now_unix()));
        }
        let mut w = writer.lock().await;
        let _ = w.shutdown().await;
        drop(w);
        connections.decrement();
    }

    fn dispatch(&mut self, frame: DecodedFrame, publisher: &Publisher) {
        match frame {
            DecodedFrame::Login { imei, serial_no } => {
                if normalize::is_valid_imei(&imei) {
                    info!(addr = %self.addr, protocol = C::NAME, imei = %imei, "login");
                    self.imei = Some(imei.clone());
                    publisher.publish(normalize::online_event(&imei, serial_no, now_unix()));
                } else {
                    warn!(addr = %self.addr, protocol = C::NAME, imei = %imei, "invalid imei, dropping login");
                }
            }
            DecodedFrame::Status { serial_no, status } => {
                self.last_status = Some(status.clone());
                self.publish_records(publisher, |imei, now| normalize::status(imei, &status, serial_no, now));
            }
            DecodedFrame::Location { serial_no, location, alarm_status } => {
                if let Some(alarm) = &alarm_status {
                    self.last_status = Some(alarm.clone());
                }
                self.publish_records(publisher, |imei, now| {
                    normalize::location(imei, &location, alarm_status.as_ref(), serial_no, now)
                });
            }
            DecodedFrame::Analog { serial_no, external_voltage } => {
                let status = normalize::analog_status(self.last_status.as_ref(), external_voltage);
                self.last_status = Some(status.clone());
                self.publish_records(publisher, |imei, now| normalize::status(imei, &status, serial_no, now));
            }
            DecodedFrame::Unknown { opcode } => {
                debug!(addr = %self.addr, protocol = C::NAME, opcode = %opcode, "unrecognized opcode, no publication");
            }
        }
    }

    /// Gate every publication on a numerically-valid login having
    /// happened. Frames before login are decoded but their normalized
    /// output is dropped with a warning.
    fn publish_records(
        &self,
        publisher: &Publisher,
        build: impl FnOnce(&str, i64) -> Vec<OutboundRecord>,
    ) {
        match &self.imei {
            Some(imei) => {
                for record in build(imei, now_unix()) {
                    publisher.publish(record);
                }
            }
            None => warn!(addr = %self.addr, protocol = C::NAME, "frame received before login, dropping"),
        }
    }

    async fn write_ack(&self, writer: &Arc<Mutex<OwnedWriteHalf>>, ack: Ack) {
        match ack {
            Ack::None => {}
            Ack::Immediate(bytes) => {
                let mut w = writer.lock().await;
                if let Err(e) = w.write_all(&bytes).await {
                    warn!(addr = %self.addr, protocol = C::NAME, error = %e, "failed to write ack");
                }
            }
            Ack::Delayed { bytes, after } => {
                let writer = writer.clone();
                let addr = self.addr;
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    // The connection may have closed while this timer was
                    // running; a write failure here is expected and
                    // silently swallowed.
                    let mut w = writer.lock().await;
                    if w.write_all(&bytes).await.is_err() {
                        debug!(%addr, protocol = C::NAME, "delayed ack write failed, connection likely closed");
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBusProducer;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tracklink_core::codec::et300::Et300Codec;
    use tracklink_core::crc::crc16_x25;

    fn build_et300_frame(opcode: u8, payload: &[u8], serial_no: u16) -> Vec<u8> {
        let mut body = vec![opcode];
        body.extend_from_slice(payload);
        body.extend_from_slice(&serial_no.to_be_bytes());
        // the wire length field counts opcode+payload+serial+crc, so it
        // runs 2 bytes ahead of `body` (which doesn't include the crc yet).
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

    async fn spawn_session() -> (
        SocketAddr,
        Arc<Publisher>,
        tokio::sync::mpsc::UnboundedReceiver<(&'static str, Vec<u8>)>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();
        let (producer, rx) = RecordingBusProducer::new();
        let (publisher, _writer) = Publisher::spawn(Arc::new(producer), 32);
        let publisher = Arc::new(publisher);
        let connections = Arc::new(ConnectionCount::default());

        let publisher_clone = publisher.clone();
        tokio::spawn(async move {
            let (stream, addr) = listener.accept().await.unwrap();
            let session = Session::<Et300Codec>::new(addr);
            session.run(stream, publisher_clone, connections).await;
        });

        (local_addr, publisher, rx)
    }

    #[tokio::test]
    async fn login_then_location_publishes_online_and_location() {
        let (addr, _publisher, mut rx) = spawn_session().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let login_payload = [0x03, 0x55, 0x63, 0x70, 0x64, 0x43, 0x24, 0x91];
        client.write_all(&build_et300_frame(0x01, &login_payload, 1)).await.unwrap();

        let (topic, payload) = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(topic, "events");
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["status"], "ONLINE");

        let mut loc_payload = vec![23, 5, 1, 12, 0, 0, 0x08];
        let lat_raw = (28.6139_f64 * 60.0 * 30000.0).round() as u32;
        let lng_raw = (77.2090_f64 * 60.0 * 30000.0).round() as u32;
        loc_payload.extend_from_slice(&lat_raw.to_be_bytes());
        loc_payload.extend_from_slice(&lng_raw.to_be_bytes());
        loc_payload.push(42);
        let course_word: u16 = 0x1000 | 0x0400 | 90;
        loc_payload.extend_from_slice(&course_word.to_be_bytes());
        client.write_all(&build_et300_frame(0x12, &loc_payload, 2)).await.unwrap();

        let (topic, payload) = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(topic, "location");
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert!((value["lat"].as_f64().unwrap() - 28.6139).abs() < 1e-3);
        assert!((value["lng"].as_f64().unwrap() - 77.2090).abs() < 1e-3);
        assert_eq!(value["speed"], 42.0);
        assert_eq!(value["course"], 90);

        drop(client);
        let (topic, payload) = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(topic, "events");
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["status"], "OFFLINE");
    }

    #[tokio::test]
    async fn frames_before_login_publish_nothing() {
        let (addr, _publisher, mut rx) = spawn_session().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // status frame sent before any login
        let status_payload = [0b0000_0010u8, 4, 3, 0x00, 0x00];
        client.write_all(&build_et300_frame(0x13, &status_payload, 1)).await.unwrap();

        // drop the connection; the only record possible is OFFLINE, which
        // is itself gated on imei having been set, so nothing is published.
        drop(client);
        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "expected no publication for a session that never logged in");
    }
}
