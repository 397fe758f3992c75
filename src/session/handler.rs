//! Per-connection command dispatch

use crate::error::{MatchmakingError, Result};
use crate::leaderboard::Leaderboard;
use crate::matchmaking::{MatchmakingQueue, QueueEntry};
use crate::metrics::MetricsCollector;
use crate::player::{AccountStore, PlayerHandle};
use crate::protocol::{decode, Command, Connection, Credentials, ErrorReply, Frame, MatchReport};
use crate::types::PlayerStatus;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared server state every session works against
#[derive(Clone)]
pub struct SessionContext {
    pub accounts: Arc<dyn AccountStore>,
    pub queue: Arc<MatchmakingQueue>,
    pub leaderboard: Arc<Leaderboard>,
    pub metrics_collector: Arc<MetricsCollector>,
    pub max_frame_length: usize,
    pub leaderboard_page_size: usize,
    pub cancel: CancellationToken,
}

/// Which credentials exchange is running
#[derive(Debug, Clone, Copy)]
enum AuthKind {
    SignUp,
    SignIn,
}

impl AuthKind {
    fn label(self) -> &'static str {
        match self {
            AuthKind::SignUp => "sign_up",
            AuthKind::SignIn => "sign_in",
        }
    }
}

pub struct Session<S> {
    connection: Connection<S>,
    context: SessionContext,
    peer: String,
    player: Option<PlayerHandle>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, context: SessionContext, peer: impl Into<String>) -> Self {
        Self {
            connection: Connection::new(stream, context.max_frame_length),
            context,
            peer: peer.into(),
            player: None,
        }
    }

    /// Serve commands until the client disconnects or the transport fails
    pub async fn run(mut self) {
        self.context.metrics_collector.record_session_opened();
        info!("Session opened for {}", self.peer);

        if let Err(e) = self.serve().await {
            match e.downcast_ref::<MatchmakingError>() {
                Some(MatchmakingError::TransportError { .. }) => {
                    warn!("Session {} lost its connection: {}", self.peer, e)
                }
                _ => error!("Session {} failed: {}", self.peer, e),
            }
        }

        // Another session may still hold the player in a queue or a match
        if let Some(player) = &self.player {
            match player.transition_status(PlayerStatus::Online, PlayerStatus::Offline) {
                Ok(true) => info!("Player '{}' is offline", player.username()),
                Ok(false) => debug!(
                    "Player '{}' left {} while busy, status kept",
                    player.username(),
                    self.peer
                ),
                Err(e) => error!("Failed to mark '{}' offline: {}", player.username(), e),
            }
        }

        self.context.metrics_collector.record_session_closed();
        info!("Session closed for {}", self.peer);
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            let line = tokio::select! {
                frame = self.connection.read_frame() => match frame? {
                    Frame::Line(line) => line,
                    Frame::Oversized => {
                        warn!("Session {} sent an oversized frame", self.peer);
                        continue;
                    }
                    Frame::Closed => return Ok(()),
                },
                _ = self.context.cancel.cancelled() => return Ok(()),
            };

            self.dispatch(&line).await?;
        }
    }

    async fn dispatch(&mut self, line: &str) -> Result<()> {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                debug!("Session {}: {}", self.peer, e);
                return self
                    .connection
                    .send(&ErrorReply::new(format!("UNKNOWN COMMAND: {}", e.0)))
                    .await;
            }
        };

        self.context.metrics_collector.record_command(command.token());
        let authenticated = self.player.is_some();
        if !command.allowed(authenticated) {
            debug!("Session {} refused {} in current state", self.peer, command);
            let reason = if authenticated {
                "ALREADY SIGNED IN"
            } else {
                "NOT SIGNED IN"
            };
            return self.connection.send(&ErrorReply::new(reason)).await;
        }

        debug!("Session {} runs {}", self.peer, command);
        match command {
            Command::SignUp => self.authenticate(AuthKind::SignUp).await,
            Command::SignIn => self.authenticate(AuthKind::SignIn).await,
            Command::SignOut | Command::Casual => Ok(()),
            Command::Profile => self.profile().await,
            Command::Leaderboard => self.leaderboard().await,
            Command::Competitive => self.competitive().await,
            Command::Help => {
                self.connection
                    .send(&Command::available(authenticated))
                    .await
            }
        }
    }

    /// Read a frame that must be present for the exchange to continue
    async fn expect_line(&mut self) -> Result<Option<String>> {
        match self.connection.read_frame().await? {
            Frame::Line(line) => Ok(Some(line)),
            Frame::Oversized => Ok(None),
            Frame::Closed => Err(MatchmakingError::TransportError {
                message: "Connection closed mid-exchange".to_string(),
            }
            .into()),
        }
    }

    async fn authenticate(&mut self, kind: AuthKind) -> Result<()> {
        self.connection.send(&Credentials::template()).await?;

        let credentials = match self.expect_line().await? {
            Some(line) => match decode::<Credentials>(&line) {
                Ok(credentials) => Some(credentials),
                Err(e) => {
                    warn!("Session {}: {}", self.peer, e);
                    None
                }
            },
            None => {
                warn!("Session {} sent oversized credentials", self.peer);
                None
            }
        };

        let player = match credentials {
            Some(Credentials {
                username: Some(username),
                password: Some(password),
            }) => match kind {
                AuthKind::SignUp => self.context.accounts.sign_up(&username, &password)?,
                AuthKind::SignIn => self.context.accounts.sign_in(&username, &password)?,
            },
            _ => None,
        };

        self.context
            .metrics_collector
            .record_auth_attempt(kind.label(), player.is_some());

        match player {
            Some(player) => {
                info!("Player '{}' signed in from {}", player.username(), self.peer);
                self.player = Some(player);
                self.connection.send(&true).await
            }
            None => {
                debug!("Session {}: {} refused", self.peer, kind.label());
                self.connection.send(&false).await
            }
        }
    }

    fn bound_player(&self) -> Result<PlayerHandle> {
        self.player.clone().ok_or_else(|| {
            MatchmakingError::InternalError {
                message: "Session has no signed-in player".to_string(),
            }
            .into()
        })
    }

    async fn profile(&mut self) -> Result<()> {
        let player = self.bound_player()?.snapshot()?;
        self.connection.send(&player).await
    }

    /// Stream the board as a count followed by acknowledged pages
    async fn leaderboard(&mut self) -> Result<()> {
        let entries = self.context.leaderboard.snapshot()?;
        self.connection.send(&entries.len()).await?;

        let page_size = self.context.leaderboard_page_size.max(1);
        for page in entries.chunks(page_size) {
            self.connection.send(&page).await?;

            let acknowledged = match self.expect_line().await? {
                Some(line) => decode::<i64>(&line),
                None => Err(MatchmakingError::ProtocolError {
                    reason: "Oversized acknowledgement".to_string(),
                }
                .into()),
            };
            if let Err(e) = acknowledged {
                warn!("Session {} abandoned the leaderboard: {}", self.peer, e);
                return Ok(());
            }
        }

        Ok(())
    }

    async fn competitive(&mut self) -> Result<()> {
        let player = self.bound_player()?;

        if !player.transition_status(PlayerStatus::Online, PlayerStatus::InQueue)? {
            let status = player.status()?;
            debug!("Player '{}' cannot queue while {}", player.username(), status);
            return self
                .connection
                .send(&ErrorReply::new(format!("CANNOT QUEUE WHILE {}", status)))
                .await;
        }

        let (entry, ticket) = QueueEntry::new(player.clone())?;
        let depth = self.context.queue.push(entry)?;
        self.context.metrics_collector.record_player_queued(depth);
        info!("Player '{}' queued for a competitive match", player.username());

        let report = tokio::select! {
            ticket = ticket => match ticket {
                Ok(ticket) => {
                    info!(
                        "Player '{}' found match {} in lobby {}",
                        player.username(), ticket.match_id, ticket.lobby_id
                    );
                    ticket.result.await.ok()
                }
                Err(_) => None,
            },
            _ = self.context.cancel.cancelled() => return Ok(()),
        };

        self.deliver(&player, report).await
    }

    async fn deliver(&mut self, player: &PlayerHandle, report: Option<MatchReport>) -> Result<()> {
        match report {
            Some(report) => self.connection.send(&report).await,
            None => {
                warn!("Match for player '{}' was aborted", player.username());
                if !player.transition_status(PlayerStatus::InGame, PlayerStatus::Online)? {
                    player.transition_status(PlayerStatus::InQueue, PlayerStatus::Online)?;
                }
                self.connection
                    .send(&ErrorReply::new("MATCH ABORTED"))
                    .await
            }
        }
    }
}
