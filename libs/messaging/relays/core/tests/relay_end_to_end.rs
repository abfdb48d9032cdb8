//! # End-to-End Relay Tests
//!
//! Runs the full coordinator on an ephemeral localhost listener and talks to
//! it with real TCP clients. The console is an in-memory pipe; closing it
//! stops the relay.

use codec::{Frame, FrameType, DUPLICATE_NAME_MESSAGE};
use network::{FrameLimits, TcpConnection};
use relay_config::RelayConfig;
use relay_core::{bind, Multiplexer};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{duplex, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct RunningRelay {
    addr: SocketAddr,
    console: DuplexStream,
    handle: JoinHandle<relay_core::Result<()>>,
}

async fn start_relay(configure: impl FnOnce(&mut RelayConfig)) -> RunningRelay {
    let mut config = RelayConfig::default();
    config.server.bind_address = "127.0.0.1".into();
    config.server.port = 0;
    config.delivery.interval_secs = 1;
    configure(&mut config);

    // Port 0 is rejected by validation but fine for binding in tests
    let listener = bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (console, console_reader) = duplex(1024);
    let mut relay = Multiplexer::new(config);
    let handle = tokio::spawn(async move {
        relay
            .run(listener, BufReader::new(console_reader))
            .await
    });

    RunningRelay {
        addr,
        console,
        handle,
    }
}

async fn join(relay: &RunningRelay, name: &str) -> TcpConnection {
    let mut conn = TcpConnection::connect(relay.addr, FrameLimits::default())
        .await
        .unwrap();
    let welcome = timeout(WAIT, conn.receive_frame()).await.unwrap().unwrap();
    assert_eq!(welcome.frame_type().unwrap(), FrameType::Welcome);
    conn.send_frame(&Frame::text(FrameType::UserName, name))
        .await
        .unwrap();
    conn
}

#[tokio::test]
async fn test_mail_is_delivered_on_the_next_pass() {
    let relay = start_relay(|_| {}).await;

    let mut alice = join(&relay, "alice").await;
    let mut bob = join(&relay, "bob").await;

    alice
        .send_frame(&Frame::text(FrameType::EmailToServer, "bob@127.0.0.1 hello bob"))
        .await
        .unwrap();

    let delivered = timeout(WAIT, bob.receive_frame()).await.unwrap().unwrap();
    assert_eq!(delivered.frame_type().unwrap(), FrameType::EmailToClient);
    assert_eq!(delivered.payload_text(), "From: alice@127.0.0.1\nhello bob");

    alice
        .send_frame(&Frame::empty(FrameType::CloseConnection))
        .await
        .unwrap();
    let closed = timeout(WAIT, alice.receive_frame()).await.unwrap();
    assert!(closed.unwrap_err().is_clean_close());

    drop(relay.console);
    timeout(WAIT, relay.handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_duplicate_name_gets_error_and_is_closed() {
    let relay = start_relay(|_| {}).await;

    let _first = join(&relay, "carol").await;
    // Let the first announcement land before the second
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut second = join(&relay, "carol").await;

    let error = timeout(WAIT, second.receive_frame()).await.unwrap().unwrap();
    assert_eq!(error.frame_type().unwrap(), FrameType::ServerError);
    assert_eq!(error.payload_text(), DUPLICATE_NAME_MESSAGE);

    let closed = timeout(WAIT, second.receive_frame()).await.unwrap();
    assert!(closed.is_err());

    drop(relay.console);
    timeout(WAIT, relay.handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_oversize_frame_closes_only_that_connection() {
    let relay = start_relay(|_| {}).await;

    let mut good = join(&relay, "dave").await;
    let mut bad = join(&relay, "erin").await;

    let oversize = Frame::new(FrameType::EmailToServer, vec![b'x'; 4096]);
    bad.send_frame(&oversize).await.unwrap();
    let closed = timeout(WAIT, bad.receive_frame()).await.unwrap();
    assert!(closed.is_err());

    good.send_frame(&Frame::text(FrameType::EmailToServer, "dave@127.0.0.1 still here"))
        .await
        .unwrap();
    let delivered = timeout(WAIT, good.receive_frame()).await.unwrap().unwrap();
    assert_eq!(delivered.payload_text(), "From: dave@127.0.0.1\nstill here");

    drop(relay.console);
    timeout(WAIT, relay.handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_console_eof_stops_the_relay() {
    let mut relay = start_relay(|_| {}).await;

    relay.console.write_all(b"help\nlist\n\n").await.unwrap();
    relay.console.shutdown().await.unwrap();

    timeout(WAIT, relay.handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_garbled_console_line_does_not_stop_the_relay() {
    let mut relay = start_relay(|_| {}).await;

    relay.console.write_all(b"li\xffst\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!relay.handle.is_finished());

    // Still serving clients after the bad line
    let mut frank = join(&relay, "frank").await;
    frank
        .send_frame(&Frame::text(FrameType::EmailToServer, "frank@127.0.0.1 note to self"))
        .await
        .unwrap();
    let delivered = timeout(WAIT, frank.receive_frame()).await.unwrap().unwrap();
    assert_eq!(delivered.payload_text(), "From: frank@127.0.0.1\nnote to self");

    relay.console.write_all(b"list\n").await.unwrap();
    relay.console.shutdown().await.unwrap();
    timeout(WAIT, relay.handle).await.unwrap().unwrap().unwrap();
}
