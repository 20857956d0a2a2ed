//! Full-session scenarios driven over real loopback TCP connections,
//! one per device protocol, against an in-process listener recording to
//! an [`tracklink_server::bus::RecordingBusProducer`] instead of a real
//! broker.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use tracklink_core::codec::{et300::Et300Codec, gt02::Gt02Codec, gt06::Gt06Codec, tk103::Tk103Codec, wetrack::WeTrackCodec};
use tracklink_tests_e2e::common::{ascii_frame, ascii_location_body, corrupt_crc_frame, et300_frame, spawn_protocol, TestResult};

const LOGIN_PAYLOAD: [u8; 8] = [0x03, 0x55, 0x63, 0x70, 0x64, 0x43, 0x24, 0x91];
const IMEI: &str = "355637064432491";

async fn recv_json(rx: &mut tokio::sync::mpsc::UnboundedReceiver<(&'static str, Vec<u8>)>) -> (String, serde_json::Value) {
    let (topic, payload) = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().expect("record published");
    (topic.to_string(), serde_json::from_slice(&payload).unwrap())
}

#[tokio::test]
async fn et300_login_then_location_publishes_online_and_fix() -> TestResult<()> {
    let (addr, mut rx) = spawn_protocol::<Et300Codec>().await?;
    let mut client = TcpStream::connect(addr).await?;

    client.write_all(&et300_frame(0x01, &LOGIN_PAYLOAD, 1)).await?;
    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "events");
    assert_eq!(value["status"], "ONLINE");
    assert_eq!(value["imei"], IMEI);

    let mut loc_payload = vec![23, 5, 1, 12, 0, 0, 0x08];
    let lat_raw = (28.6139_f64 * 60.0 * 30000.0).round() as u32;
    let lng_raw = (77.2090_f64 * 60.0 * 30000.0).round() as u32;
    loc_payload.extend_from_slice(&lat_raw.to_be_bytes());
    loc_payload.extend_from_slice(&lng_raw.to_be_bytes());
    loc_payload.push(42);
    let course_word: u16 = 0x1000 | 0x0400 | 90;
    loc_payload.extend_from_slice(&course_word.to_be_bytes());
    client.write_all(&et300_frame(0x12, &loc_payload, 2)).await?;

    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "location");
    assert!((value["lat"].as_f64().unwrap() - 28.6139).abs() < 1e-3);
    assert_eq!(value["imei"], IMEI);

    drop(client);
    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "events");
    assert_eq!(value["status"], "OFFLINE");
    Ok(())
}

#[tokio::test]
async fn gt06_status_with_sos_publishes_status_and_event_before_ack() -> TestResult<()> {
    let (addr, mut rx) = spawn_protocol::<Gt06Codec>().await?;
    let mut client = TcpStream::connect(addr).await?;

    client.write_all(&et300_frame(0x01, &LOGIN_PAYLOAD, 1)).await?;
    // consume the canned login ack
    let mut buf = [0u8; 64];
    let n = timeout(Duration::from_millis(500), client.read(&mut buf)).await??;
    assert!(n > 0);
    let _ = recv_json(&mut rx).await; // ONLINE

    // GT06 status bits[3..6] = '100' -> SOS trigram
    let status_payload = [0b0001_0000u8, 4, 3, 0x00, 0x00];
    client.write_all(&et300_frame(0x13, &status_payload, 2)).await?;

    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "status");
    assert_eq!(value["imei"], IMEI);

    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "events");
    assert_eq!(value["status"], "SOS");

    // the status ack is delayed 10s; nothing should arrive on the wire yet.
    let immediate = timeout(Duration::from_millis(200), client.read(&mut buf)).await;
    assert!(immediate.is_err(), "status ack must not be written immediately");
    Ok(())
}

#[tokio::test]
async fn tk103_login_then_two_frames_get_config_acks() -> TestResult<()> {
    let (addr, mut rx) = spawn_protocol::<Tk103Codec>().await?;
    let mut client = TcpStream::connect(addr).await?;
    let imei = "035566306435";

    client.write_all(&ascii_frame(imei, "BP05", "")).await?;
    let mut buf = [0u8; 128];
    let n = timeout(Duration::from_millis(500), client.read(&mut buf)).await??;
    assert_eq!(&buf[..n], format!("({imei}AP05)").as_bytes());
    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "events");
    assert_eq!(value["status"], "ONLINE");

    let body = ascii_location_body(true);
    client.write_all(&ascii_frame(imei, "BR00", &body)).await?;
    let n = timeout(Duration::from_millis(500), client.read(&mut buf)).await??;
    assert_eq!(&buf[..n], format!("({imei}AR05000A)").as_bytes());
    let _ = recv_json(&mut rx).await; // location record

    client.write_all(&ascii_frame(imei, "BR00", &body)).await?;
    let n = timeout(Duration::from_millis(500), client.read(&mut buf)).await??;
    assert_eq!(&buf[..n], format!("({imei}AR06003C)").as_bytes());
    Ok(())
}

#[tokio::test]
async fn gt02_invalid_fix_publishes_only_invalid_location_event() -> TestResult<()> {
    let (addr, mut rx) = spawn_protocol::<Gt02Codec>().await?;
    let mut client = TcpStream::connect(addr).await?;
    let imei = "035566306435";

    client.write_all(&ascii_frame(imei, "BP05", "")).await?;
    let (_, value) = recv_json(&mut rx).await;
    assert_eq!(value["status"], "ONLINE");

    let body = ascii_location_body(false);
    client.write_all(&ascii_frame(imei, "BR00", &body)).await?;

    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "events");
    assert_eq!(value["status"], "INVALID_LOCATION");

    // no location record should follow within a short window.
    let nothing = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(nothing.is_err());
    Ok(())
}

#[tokio::test]
async fn connection_drop_mid_session_publishes_exactly_one_offline() -> TestResult<()> {
    let (addr, mut rx) = spawn_protocol::<Et300Codec>().await?;
    let client = TcpStream::connect(addr).await?;

    let mut client = client;
    client.write_all(&et300_frame(0x01, &LOGIN_PAYLOAD, 1)).await?;
    let (_, value) = recv_json(&mut rx).await;
    assert_eq!(value["status"], "ONLINE");

    drop(client);

    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "events");
    assert_eq!(value["status"], "OFFLINE");

    // exactly one OFFLINE: nothing further arrives.
    let nothing = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(nothing.is_err());
    Ok(())
}

#[tokio::test]
async fn wetrack_malformed_crc_terminates_session_with_offline_only() -> TestResult<()> {
    let (addr, mut rx) = spawn_protocol::<WeTrackCodec>().await?;
    let mut client = TcpStream::connect(addr).await?;

    client.write_all(&et300_frame(0x01, &LOGIN_PAYLOAD, 1)).await?;
    let mut buf = [0u8; 64];
    let n = timeout(Duration::from_millis(500), client.read(&mut buf)).await??;
    assert!(n > 0); // login ack
    let (_, value) = recv_json(&mut rx).await;
    assert_eq!(value["status"], "ONLINE");

    let status_payload = [0b0010_0000u8, 4, 3, 0x00, 0x00];
    client.write_all(&corrupt_crc_frame(0x13, &status_payload, 2)).await?;

    // the malformed frame ends the session; no status record, only OFFLINE.
    let (topic, value) = recv_json(&mut rx).await;
    assert_eq!(topic, "events");
    assert_eq!(value["status"], "OFFLINE");

    let nothing = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(nothing.is_err());
    Ok(())
}
