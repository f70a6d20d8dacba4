#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use ytcontrol::{
    api,
    config::{Overrides, Settings},
    hub::ConnectionHub,
    protocol::Heartbeat,
    relay::CommandRelay,
    server::{self, ServerError},
    shutdown::ShutdownCoordinator,
};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running server on an ephemeral port, wired the same way `main` wires it
/// minus the OS hotkey listener.
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: ConnectionHub,
    pub relay: CommandRelay,
    pub shutdown: ShutdownCoordinator,
    pub settings: Arc<Settings>,
    stop: Option<oneshot::Sender<()>>,
    pub http: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Stop accepting connections, as on Ctrl+C.
    pub fn stop_accepting(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

pub async fn start_server() -> TestServer {
    start_server_with_heartbeat(Heartbeat::default()).await
}

pub async fn start_server_with_heartbeat(heartbeat: Heartbeat) -> TestServer {
    let settings = Settings::resolve(Overrides::default()).unwrap();
    let listener = server::bind(&settings.host, 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let settings = Arc::new(settings.with_port(addr.port()));

    let hub = ConnectionHub::new();
    let (relay, _dispatcher) = CommandRelay::spawn(settings.actions.clone(), hub.clone());
    let shutdown = ShutdownCoordinator::new();
    let state = api::AppState::new(hub.clone(), shutdown.clone(), settings.clone())
        .with_heartbeat(heartbeat);

    let (stop, stop_rx) = oneshot::channel::<()>();
    let http = tokio::spawn(server::serve(listener, api::router(state), async {
        stop_rx.await.ok();
    }));

    TestServer {
        addr,
        hub,
        relay,
        shutdown,
        settings,
        stop: Some(stop),
        http,
    }
}

/// A socket.io-client stand-in speaking the websocket transport.
pub struct BrowserClient {
    pub tx: SplitSink<ClientStream, Message>,
    pub rx: SplitStream<ClientStream>,
    /// Socket id from the namespace connect ack.
    pub sid: String,
    /// Engine.IO open packet payload.
    pub open: serde_json::Value,
}

pub fn socket_io_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/socket.io/?EIO=4&transport=websocket")
}

/// Upgrade and read the Engine.IO open packet, without joining a namespace.
pub async fn open_transport(addr: SocketAddr) -> (SplitSink<ClientStream, Message>, SplitStream<ClientStream>, serde_json::Value) {
    let (stream, _response) = tokio::time::timeout(RECV_TIMEOUT, connect_async(socket_io_url(addr)))
        .await
        .expect("websocket connect timed out")
        .expect("websocket connect failed");
    let (tx, mut rx) = stream.split();

    let open = recv_text(&mut rx).await;
    let body = open.strip_prefix('0').expect("expected an open packet");
    let open = serde_json::from_str(body).expect("invalid open payload");
    (tx, rx, open)
}

/// Upgrade, then join the default namespace.
pub async fn connect_client(addr: SocketAddr) -> BrowserClient {
    let (mut tx, mut rx, open) = open_transport(addr).await;
    tx.send(Message::Text("40".into())).await.unwrap();

    let ack = recv_text(&mut rx).await;
    let body = ack.strip_prefix("40").expect("expected a connect ack");
    let ack: serde_json::Value = serde_json::from_str(body).expect("invalid ack payload");
    let sid = ack["sid"].as_str().expect("ack without sid").to_string();

    BrowserClient { tx, rx, sid, open }
}

/// Next text frame, whatever it is.
pub async fn recv_text(rx: &mut SplitStream<ClientStream>) -> String {
    let msg = tokio::time::timeout(RECV_TIMEOUT, rx.next())
        .await
        .expect("timeout waiting for message")
        .expect("stream ended")
        .expect("ws error");
    match msg {
        Message::Text(text) => text.as_str().to_string(),
        other => panic!("expected text message, got {other:?}"),
    }
}

impl BrowserClient {
    /// Next socket.io event as `[name, payload]`, answering pings on the way.
    pub async fn recv_event(&mut self) -> serde_json::Value {
        loop {
            let text = recv_text(&mut self.rx).await;
            if text == "2" {
                self.tx.send(Message::Text("3".into())).await.unwrap();
                continue;
            }
            let body = text.strip_prefix("42").expect("expected an event frame");
            return serde_json::from_str(body).expect("invalid event payload");
        }
    }

    /// Like `recv_event`, but `None` if nothing arrives within `wait`.
    pub async fn try_recv_event(&mut self, wait: Duration) -> Option<serde_json::Value> {
        tokio::time::timeout(wait, self.recv_event()).await.ok()
    }

    /// Wait for the server to close the socket and return the close code.
    pub async fn recv_close_code(&mut self) -> Option<u16> {
        loop {
            let msg = tokio::time::timeout(RECV_TIMEOUT, self.rx.next())
                .await
                .expect("timeout waiting for close");
            match msg {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.tx.send(Message::Close(None)).await;
        let _ = self.tx.flush().await;
    }
}

/// Poll `cond` until it holds or the receive timeout passes.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
