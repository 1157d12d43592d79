//! In-process server and clients for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use rust_decimal_macros::dec;
use serde_json::Value;
use shop_core::{Order, OrderItem};
use shop_server::{AppConfig, AppResult, Application};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    addr: SocketAddr,
    http: reqwest::Client,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<AppResult<()>>,
}

impl TestServer {
    /// Start with default configuration.
    pub async fn start() -> Self {
        Self::start_with(AppConfig::default()).await
    }

    pub async fn start_with(config: AppConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Application::new(config).unwrap();
        let handle = tokio::spawn(app.serve(listener, async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            http: reqwest::Client::new(),
            shutdown_tx,
            handle,
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Open a WebSocket as the given user (`user_id` 0 for anonymous).
    pub async fn connect(&self, path: &str, user_id: u64, role: &str) -> WsClient {
        let mut request = self.ws_url(path).into_client_request().unwrap();
        if user_id != 0 {
            let headers = request.headers_mut();
            headers.insert("x-user-id", user_id.to_string().parse().unwrap());
            headers.insert("x-user-role", role.parse().unwrap());
        }
        let (client, _) = connect_async(request).await.unwrap();
        client
    }

    /// POST an event as the given user.
    pub async fn publish(&self, event: &Value, user_id: u64, role: &str) -> reqwest::Response {
        self.http
            .post(self.http_url("/api/events"))
            .header("x-user-id", user_id.to_string())
            .header("x-user-role", role)
            .json(event)
            .send()
            .await
            .unwrap()
    }

    pub async fn health(&self) -> Value {
        self.http
            .get(self.http_url("/healthz"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Poll `/healthz` until the hub reports `expected` sessions.
    pub async fn wait_for_sessions(&self, expected: u64) {
        let reached = timeout(Duration::from_secs(5), async {
            loop {
                if self.health().await["sessions"] == expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(reached.is_ok(), "hub never reached {expected} sessions");
    }

    /// Trigger graceful shutdown and wait for the server to exit.
    pub async fn shutdown(self) -> AppResult<()> {
        let _ = self.shutdown_tx.send(());
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not shut down")
            .unwrap()
    }
}

/// Next text frame, skipping control frames.
pub async fn next_text(client: &mut WsClient, wait: Duration) -> Option<Value> {
    timeout(wait, async {
        while let Some(frame) = client.next().await {
            match frame {
                Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Wait until the server closes the connection.
pub async fn closed_within(client: &mut WsClient, wait: Duration) -> bool {
    timeout(wait, async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .is_ok()
}

pub fn order(id: i64) -> Order {
    Order {
        id,
        owner_id: "2".to_string(),
        total: dec!(450),
        status: "new".to_string(),
        name: Some("Zarema".to_string()),
        address: Some("Pushkina 10".to_string()),
        delivery_type: "courier".to_string(),
        payment_type: "cash".to_string(),
        change_for: Some(dec!(500)),
        delivery_fee: Some(dec!(0)),
        delivery_text: None,
        created_at: Utc::now(),
        items: vec![OrderItem {
            product_id: 11,
            name: Some("Walnuts".to_string()),
            quantity: 3,
            price: Some(dec!(150)),
        }],
    }
}

pub fn new_order_event(id: i64) -> Value {
    serde_json::json!({ "type": "new_order", "order": order(id) })
}
