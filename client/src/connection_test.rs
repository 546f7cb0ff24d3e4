use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use super::*;
use crate::player::test_helpers::MockPlayer;
use crate::session::SessionConfig;

fn server_frame(syscall: &str, status: frames::Status, data: serde_json::Value) -> Message {
    let frame = frames::Frame { status, ..frames::Frame::request(uuid::Uuid::new_v4().to_string(), syscall, data) };
    Message::Binary(frames::encode_frame(&frame).into())
}

async fn next_event(rx: &mut mpsc::Receiver<SyncEvent>) -> SyncEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event receive timed out")
        .expect("event channel closed")
}

#[test]
fn join_url_maps_scheme_and_encodes() {
    let url = join_url("http://localhost:3000/", "public", "DJ Ada", Some("p&w=1")).expect("url");
    assert_eq!(url, "ws://localhost:3000/api/rooms/public/ws?name=DJ+Ada&password=p%26w%3D1");

    let url = join_url("https://rooms.example", "r1", "x", None).expect("url");
    assert_eq!(url, "wss://rooms.example/api/rooms/r1/ws?name=x");

    // Room ids are path segments, so separators are escaped.
    let url = join_url("http://h", "a/b?c", "x", None).expect("url");
    assert_eq!(url, "ws://h/api/rooms/a%2Fb%3Fc/ws?name=x");

    assert!(matches!(join_url("ftp://nope", "r", "x", None), Err(ClientError::InvalidUrl(_))));
    assert!(matches!(join_url("not a url", "r", "x", None), Err(ClientError::InvalidUrl(_))));
}

#[tokio::test]
async fn forbidden_upgrade_maps_to_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = [0_u8; 1024];
        let _ = stream.read(&mut buf).await;
        let body = "password incorrect";
        let response = format!(
            "HTTP/1.1 403 Forbidden\r\ncontent-length: {}\r\ncontent-type: text/plain\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
    });

    let err = connect(&format!("ws://{addr}/api/rooms/r1/ws")).await.expect_err("rejected");
    // The reason is whatever body bytes arrived with the response head.
    assert!(
        matches!(&err, ClientError::Rejected(reason) if reason.is_empty() || reason == "password incorrect"),
        "{err}"
    );
    assert_eq!(err.error_code(), "E_JOIN_REJECTED");
}

#[tokio::test]
async fn runner_pings_clock_and_forwards_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        ws.send(server_frame("session:connected", frames::Status::Request, json!({ "clientId": "c1" })))
            .await
            .expect("send welcome");

        // Answer the first clock ping, then close.
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Binary(bytes) = msg else { continue };
            let frame = frames::decode_frame(&bytes).expect("decode");
            if frame.syscall == "clock:sync" {
                let sent = frame.data["clientSentAtMs"].clone();
                let reply = json!({ "clientSentAtMs": sent, "serverNowMs": frames::now_ms() });
                ws.send(server_frame("clock:sync", frames::Status::Done, reply)).await.expect("reply");
                break;
            }
        }
        let _ = ws.close(None).await;
    });

    let socket = connect(&format!("ws://{addr}/api/rooms/r1/ws")).await.expect("connect");
    let mut session = SyncSession::new(MockPlayer::default(), SessionConfig::default());
    let (_cmd_tx, cmd_rx) = mpsc::channel(8);
    let (event_tx, mut event_rx) = mpsc::channel(64);

    let runner = tokio::spawn(async move {
        let result = run(socket, &mut session, cmd_rx, event_tx).await;
        (result, session.clock().has_sync())
    });

    assert_eq!(next_event(&mut event_rx).await, SyncEvent::Connected { client_id: "c1".into() });
    assert!(matches!(next_event(&mut event_rx).await, SyncEvent::ClockSynced { .. }));

    let (result, has_sync) = timeout(Duration::from_secs(2), runner).await.expect("runner finished").expect("join");
    assert!(result.is_ok());
    // Teardown resets the clock once the socket closes.
    assert!(!has_sync);
}
