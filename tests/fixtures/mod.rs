//! Test fixtures: an in-process server and a line-protocol client

#![allow(dead_code)]

use arena_ladder::config::{AppConfig, MatchmakingSettings};
use arena_ladder::player::Player;
use arena_ladder::protocol::{Connection, Credentials, Frame, MatchReport, PlayerSummary};
use arena_ladder::service::AppState;
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// How long a test waits for any single reply
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for an ephemeral, instant-match server
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.service.port = 0;
    config.service.enable_health_server = false;
    config.service.shutdown_timeout_seconds = 1;
    config.matchmaking = MatchmakingSettings::instant();
    config
}

/// A running server bound to an ephemeral port
pub struct TestServer {
    pub state: Arc<AppState>,
    pub addr: SocketAddr,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let state = Arc::new(AppState::new(config).await.expect("server state"));
        let addr = state.start().await.expect("server start");
        Self { state, addr }
    }

    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        TestClient {
            connection: Connection::new(stream, 1024 * 1024),
        }
    }

    pub async fn shutdown(self) {
        self.state.shutdown().await.expect("shutdown");
    }
}

/// Scripted client speaking the line protocol
pub struct TestClient {
    connection: Connection<TcpStream>,
}

impl TestClient {
    pub async fn send_line(&mut self, line: &str) {
        self.connection.write_line(line).await.expect("send line");
    }

    pub async fn send_json<T: Serialize>(&mut self, message: &T) {
        self.connection.send(message).await.expect("send json");
    }

    /// Next reply parsed as JSON
    pub async fn recv(&mut self) -> Value {
        let frame = tokio::time::timeout(REPLY_TIMEOUT, self.connection.read_frame())
            .await
            .expect("reply timed out")
            .expect("read frame");
        match frame {
            Frame::Line(line) => serde_json::from_str(&line).expect("json reply"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    /// Send a command and return its single reply
    pub async fn request(&mut self, command: &str) -> Value {
        self.send_line(command).await;
        self.recv().await
    }

    async fn credentials(&mut self, command: &str, username: &str, password: &str) -> bool {
        let template = self.request(command).await;
        assert_eq!(template["USERNAME"], Value::Null);
        assert_eq!(template["PASSWORD"], Value::Null);

        self.send_json(&Credentials::new(username, password)).await;
        self.recv().await.as_bool().expect("boolean confirmation")
    }

    pub async fn sign_up(&mut self, username: &str, password: &str) -> bool {
        self.credentials("SIGN UP", username, password).await
    }

    pub async fn sign_in(&mut self, username: &str, password: &str) -> bool {
        self.credentials("SIGN IN", username, password).await
    }

    pub async fn profile(&mut self) -> Player {
        serde_json::from_value(self.request("PROFILE").await).expect("profile record")
    }

    /// Queue for a ranked match and wait for its report
    pub async fn competitive(&mut self) -> MatchReport {
        serde_json::from_value(self.request("COMPETITIVE").await).expect("match report")
    }

    /// Read the whole leaderboard, acknowledging every page
    pub async fn leaderboard(&mut self) -> Vec<PlayerSummary> {
        let total = self.request("LEADERBOARD").await.as_u64().expect("count") as usize;

        let mut entries = Vec::with_capacity(total);
        while entries.len() < total {
            let page: Vec<PlayerSummary> =
                serde_json::from_value(self.recv().await).expect("leaderboard page");
            assert!(!page.is_empty());
            entries.extend(page);
            self.send_json(&(total - entries.len())).await;
        }
        entries
    }
}
