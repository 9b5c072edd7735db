//! Test helpers for integration tests
//!
//! Spawns a real gateway listener backed by in-memory membership and an
//! unreachable Redis endpoint, so the suite runs with no external
//! services: fabric-dependent paths must degrade exactly the way the
//! handlers promise (error frames and 503s, never hangs).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use pulse_cache::{RedisPool, RedisPoolConfig};
use pulse_common::{
    AppConfig, AppSettings, ConnectionConfig, DatabaseConfig, Environment, FabricConfig,
    JwtConfig, PresenceConfig, RedisConfig, RelayConfig, ServerConfig,
};
use pulse_core::Frame;
use pulse_gateway::connection::ConnectionRegistry;
use pulse_gateway::fanout::{FanoutConfig, FanoutDispatcher};
use pulse_gateway::{create_app, GatewayState};
use pulse_store::MemoryMembership;

use crate::fixtures::TEST_JWT_SECRET;

/// Redis endpoint with nothing listening; connections fail fast
pub const DEAD_REDIS_URL: &str = "redis://127.0.0.1:1";

/// Counter for unique test ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19000);

/// Get a unique port for testing
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// WebSocket client half used by the tests
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Gateway instance under test
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    /// State handle for asserting on registry internals
    pub state: GatewayState,
    /// Membership backend for seeding participants
    pub membership: Arc<MemoryMembership>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a gateway with a grace period long enough that the missing
    /// fabric never degrades the instance
    pub async fn start() -> Result<Self> {
        Self::start_with_grace(3600).await
    }

    /// Start a gateway with a custom fabric grace period in seconds
    pub async fn start_with_grace(grace_secs: u64) -> Result<Self> {
        let config = test_config(grace_secs);
        let membership = Arc::new(MemoryMembership::new());

        let registry = ConnectionRegistry::new_shared();
        let fanout = Arc::new(
            FanoutDispatcher::new(
                FanoutConfig {
                    redis_url: config.redis.url.clone(),
                    broadcast_buffer: config.fabric.broadcast_buffer,
                    reconnect_delay_ms: config.fabric.reconnect_delay_ms,
                },
                registry.clone(),
            )
            .await?,
        );
        fanout.clone().start();

        let redis = RedisPool::new(RedisPoolConfig {
            url: config.redis.url.clone(),
            max_size: 2,
        })?;

        let state = GatewayState::new(registry, fanout, membership.clone(), redis, config);
        let app = create_app(state.clone());

        let port = get_test_port();
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        // Wait for server to be ready
        tokio::time::sleep(Duration::from_millis(50)).await;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr: actual_addr,
            client,
            state,
            membership,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the WebSocket endpoint URL
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Attempt a WebSocket upgrade with an optional `token` query param
    pub async fn try_connect_ws(
        &self,
        token: Option<&str>,
    ) -> Result<WsClient, tungstenite::Error> {
        let url = match token {
            Some(token) => format!("{}?token={token}", self.ws_url()),
            None => self.ws_url(),
        };
        let (ws, _response) = connect_async(url).await?;
        Ok(ws)
    }

    /// Connect over WebSocket, failing the test on rejection
    pub async fn connect_ws(&self, token: &str) -> Result<WsClient> {
        self.try_connect_ws(Some(token))
            .await
            .map_err(|e| anyhow::anyhow!("upgrade failed: {e}"))
    }

    /// Connect using the Authorization header instead of the query param
    pub async fn connect_ws_with_header(&self, token: &str) -> Result<WsClient> {
        let mut request = self.ws_url().into_client_request()?;
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {token}").parse()?);
        let (ws, _response) = connect_async(request).await?;
        Ok(ws)
    }
}

/// Build a configuration pointing at in-process backends only
pub fn test_config(grace_secs: u64) -> AppConfig {
    AppConfig {
        app: AppSettings {
            name: "pulse-integration".to_string(),
            env: Environment::Development,
            instance_id: "itest-1".to_string(),
        },
        gateway: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: "postgres://localhost/unused".to_string(),
            max_connections: 1,
        },
        redis: RedisConfig {
            url: DEAD_REDIS_URL.to_string(),
            max_connections: 2,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
        presence: PresenceConfig {
            horizon_secs: 30,
            sweep_secs: 10,
        },
        relay: RelayConfig {
            partitions: 4,
            workers: 1,
            consumer_group: "relay".to_string(),
            block_ms: 100,
            claim_idle_ms: 1000,
            batch_size: 16,
        },
        fabric: FabricConfig {
            grace_secs,
            reconnect_delay_ms: 50,
            broadcast_buffer: 64,
        },
        connection: ConnectionConfig {
            queue_size: 16,
            heartbeat_timeout_secs: 60,
        },
    }
}

/// Extract the HTTP status of a rejected upgrade, if it was one
pub fn upgrade_rejection(error: &tungstenite::Error) -> Option<u16> {
    match error {
        tungstenite::Error::Http(response) => Some(response.status().as_u16()),
        _ => None,
    }
}

/// Send a raw text payload over the socket
pub async fn send_text(ws: &mut WsClient, text: &str) -> Result<()> {
    ws.send(Message::Text(text.to_string())).await?;
    Ok(())
}

/// Send a binary payload over the socket
pub async fn send_binary(ws: &mut WsClient, bytes: &[u8]) -> Result<()> {
    ws.send(Message::Binary(bytes.to_vec())).await?;
    Ok(())
}

/// Receive the next frame, skipping transport-level messages
pub async fn recv_frame(ws: &mut WsClient) -> Result<Frame> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for a frame"))?
            .ok_or_else(|| anyhow::anyhow!("socket closed while waiting for a frame"))??;

        match message {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Ping(_) | Message::Pong(_) => {}
            other => anyhow::bail!("expected a text frame, got {other:?}"),
        }
    }
}

/// Receive until the server closes the socket, returning the close code
pub async fn recv_close_code(ws: &mut WsClient) -> Result<u16> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for close"))?
            .ok_or_else(|| anyhow::anyhow!("socket ended without a close frame"))??;

        match message {
            Message::Close(Some(frame)) => return Ok(u16::from(frame.code)),
            Message::Close(None) => anyhow::bail!("close frame carried no code"),
            Message::Text(_) | Message::Ping(_) | Message::Pong(_) => {}
            other => anyhow::bail!("expected close, got {other:?}"),
        }
    }
}

/// Poll a condition until it holds or the timeout elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Assert response status without parsing the body
pub async fn assert_status(response: Response, expected: u16) -> Result<()> {
    let status = response.status().as_u16();
    if status != expected {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected}, got {status}. Body: {body}");
    }
    Ok(())
}
