//! Session task and its handle
//!
//! A single task owns the [`Game`] together with the tunnel of every live
//! connection. Transports talk to it through a cloneable [`HubHandle`], which
//! queues commands onto one channel, so every connect, message and
//! disconnect is applied one at a time in arrival order.

use std::collections::HashMap;

use derive_where::derive_where;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::{
    constants::session::COMMAND_BUFFER_SIZE,
    game::{Game, HealthReport, IncomingMessage},
    question::QuestionSet,
    session::Tunnel,
    watcher::{self, Id},
};

/// Errors returned by [`HubHandle`] operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session task is no longer running
    #[error("session task has stopped")]
    Closed,
    /// The session refused the connection
    #[error("connection refused: {0}")]
    Refused(#[from] watcher::Error),
}

/// Commands processed by the session task
#[derive(Debug)]
enum Command<T> {
    Connect {
        tunnel: T,
        reply: oneshot::Sender<Result<Id, watcher::Error>>,
    },
    Message {
        id: Id,
        message: IncomingMessage,
    },
    Disconnect {
        id: Id,
    },
    Health {
        reply: oneshot::Sender<HealthReport>,
    },
}

/// Handle to a running session task
#[derive_where(Clone, Debug)]
pub struct HubHandle<T> {
    commands: mpsc::Sender<Command<T>>,
}

struct Hub<T> {
    game: Game,
    tunnels: HashMap<Id, T>,
}

/// Spawns the session task for the given questions
///
/// The task runs until every handle has been dropped.
///
/// # Panics
///
/// Panics if called outside of a tokio runtime.
pub fn spawn<T>(questions: QuestionSet) -> HubHandle<T>
where
    T: Tunnel + Clone + Send + 'static,
{
    let (commands, mut receiver) = mpsc::channel(COMMAND_BUFFER_SIZE);

    let mut hub = Hub {
        game: Game::new(questions),
        tunnels: HashMap::new(),
    };

    tokio::spawn(async move {
        while let Some(command) = receiver.recv().await {
            hub.handle(command);
        }
        log::info!("session task stopped");
    });

    HubHandle { commands }
}

impl<T: Tunnel + Clone> Hub<T> {
    fn handle(&mut self, command: Command<T>) {
        match command {
            Command::Connect { tunnel, reply } => {
                let result = self.connect(tunnel);
                let _ = reply.send(result);
            }
            Command::Message { id, message } => {
                let tunnels = &self.tunnels;
                self.game
                    .receive_message(id, message, |id| tunnels.get(&id).cloned());
            }
            Command::Disconnect { id } => {
                if self.tunnels.remove(&id).is_none() {
                    return;
                }
                let tunnels = &self.tunnels;
                self.game
                    .remove_watcher(id, |id| tunnels.get(&id).cloned());
                log::info!(
                    "connection {id} closed, {} remaining",
                    self.game.watchers.connection_count()
                );
            }
            Command::Health { reply } => {
                let _ = reply.send(self.game.health());
            }
        }
    }

    fn connect(&mut self, tunnel: T) -> Result<Id, watcher::Error> {
        let id = Id::new();

        if let Err(e) = self.game.add_unassigned(id) {
            log::warn!("refusing connection: {e}");
            tunnel.close();
            return Err(e);
        }

        self.tunnels.insert(id, tunnel);
        log::info!(
            "connection {id} opened, {} live",
            self.game.watchers.connection_count()
        );

        Ok(id)
    }
}

impl<T> HubHandle<T> {
    async fn submit(&self, command: Command<T>) -> Result<(), Error> {
        self.commands.send(command).await.map_err(|_| Error::Closed)
    }

    /// Registers a new connection and its tunnel
    ///
    /// The connection receives every broadcast from now on. Nothing is sent
    /// to anybody until it joins.
    ///
    /// # Errors
    ///
    /// Returns `Error::Refused` if the session is full, in which case the
    /// tunnel has been closed, or `Error::Closed` if the session task is gone.
    pub async fn connect(&self, tunnel: T) -> Result<Id, Error> {
        let (reply, response) = oneshot::channel();
        self.submit(Command::Connect { tunnel, reply }).await?;
        Ok(response.await.map_err(|_| Error::Closed)??)
    }

    /// Queues a message from a connection
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the session task is gone.
    pub async fn send(&self, id: Id, message: IncomingMessage) -> Result<(), Error> {
        self.submit(Command::Message { id, message }).await
    }

    /// Queues the disconnect of a connection
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the session task is gone.
    pub async fn disconnect(&self, id: Id) -> Result<(), Error> {
        self.submit(Command::Disconnect { id }).await
    }

    /// Asks the session for a health report
    ///
    /// The report is taken after everything queued before it was applied.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the session task is gone.
    pub async fn health(&self) -> Result<HealthReport, Error> {
        let (reply, response) = oneshot::channel();
        self.submit(Command::Health { reply }).await?;
        response.await.map_err(|_| Error::Closed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::{
        SyncMessage, UpdateMessage, constants::session::MAX_CONNECTION_COUNT, game::Stage,
    };

    #[derive(Debug, Clone, Default)]
    struct RecordingTunnel {
        received: Arc<Mutex<Vec<serde_json::Value>>>,
        closed: Arc<AtomicBool>,
    }

    impl RecordingTunnel {
        fn events(&self) -> Vec<String> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .map(|value| value["event"].as_str().unwrap().to_owned())
                .collect()
        }

        fn record(&self, text: &str) {
            self.received
                .lock()
                .unwrap()
                .push(serde_json::from_str(text).unwrap());
        }
    }

    impl Tunnel for RecordingTunnel {
        fn send_message(&self, message: &UpdateMessage) {
            self.record(&message.to_message());
        }

        fn send_state(&self, state: &SyncMessage) {
            self.record(&state.to_message());
        }

        fn close(self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn questions() -> QuestionSet {
        QuestionSet::from_json(r#"[{"prompt": "1 + 1?", "options": ["1", "2"], "correctIndex": 1}]"#)
            .unwrap()
    }

    fn message(json: &str) -> IncomingMessage {
        IncomingMessage::from_json(json).unwrap()
    }

    #[tokio::test]
    async fn test_connect_is_silent() {
        let hub = spawn(questions());
        let first = RecordingTunnel::default();
        let second = RecordingTunnel::default();

        hub.connect(first.clone()).await.unwrap();
        hub.connect(second.clone()).await.unwrap();
        hub.health().await.unwrap();

        assert!(first.events().is_empty());
        assert!(second.events().is_empty());
    }

    #[tokio::test]
    async fn test_join_reaches_spectators() {
        let hub = spawn(questions());
        let spectator = RecordingTunnel::default();
        let player = RecordingTunnel::default();

        hub.connect(spectator.clone()).await.unwrap();
        let id = hub.connect(player.clone()).await.unwrap();
        hub.send(id, message(r#"{"event":"join","data":{"name":"Alice"}}"#))
            .await
            .unwrap();

        let health = hub.health().await.unwrap();
        assert_eq!(health.players, 1);
        assert_eq!(health.stage, Stage::Lobby);
        assert_eq!(spectator.events(), ["state"]);
        assert_eq!(player.events(), ["state"]);
    }

    #[tokio::test]
    async fn test_game_round_through_handle() {
        let hub = spawn(questions());
        let host = RecordingTunnel::default();
        let player = RecordingTunnel::default();

        let host_id = hub.connect(host.clone()).await.unwrap();
        let player_id = hub.connect(player.clone()).await.unwrap();
        hub.send(host_id, message(r#"{"event":"join","data":{"role":"host"}}"#))
            .await
            .unwrap();
        hub.send(player_id, message(r#"{"event":"join","data":{"name":"Bob"}}"#))
            .await
            .unwrap();
        hub.send(host_id, message(r#"{"event":"host-start-question"}"#))
            .await
            .unwrap();
        hub.send(player_id, message(r#"{"event":"submit-answer","data":1}"#))
            .await
            .unwrap();
        hub.send(host_id, message(r#"{"event":"host-reveal-answer"}"#))
            .await
            .unwrap();

        let health = hub.health().await.unwrap();
        assert_eq!(health.stage, Stage::Reveal);

        let received = player.received.lock().unwrap().clone();
        let reveal = received
            .iter()
            .find(|value| value["event"] == "question-reveal")
            .unwrap();
        assert_eq!(reveal["data"]["mobAlive"], 1);
        assert_eq!(reveal["data"]["correctIndex"], 1);
    }

    #[tokio::test]
    async fn test_disconnect_broadcasts_to_the_rest() {
        let hub = spawn(questions());
        let staying = RecordingTunnel::default();
        let leaving = RecordingTunnel::default();

        let staying_id = hub.connect(staying.clone()).await.unwrap();
        let leaving_id = hub.connect(leaving.clone()).await.unwrap();
        hub.send(staying_id, message(r#"{"event":"join","data":{"name":"Alice"}}"#))
            .await
            .unwrap();
        hub.send(leaving_id, message(r#"{"event":"join","data":{"name":"Bob"}}"#))
            .await
            .unwrap();
        hub.health().await.unwrap();
        let before = leaving.events().len();

        hub.disconnect(leaving_id).await.unwrap();

        assert_eq!(hub.health().await.unwrap().players, 1);
        assert_eq!(staying.events(), ["state", "state", "state"]);
        assert_eq!(leaving.events().len(), before);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_is_ignored() {
        let hub = spawn::<RecordingTunnel>(questions());
        hub.disconnect(Id::new()).await.unwrap();
        assert_eq!(hub.health().await.unwrap().players, 0);
    }

    #[tokio::test]
    async fn test_full_session_refuses_and_closes() {
        let hub = spawn(questions());
        for _ in 0..MAX_CONNECTION_COUNT {
            hub.connect(RecordingTunnel::default()).await.unwrap();
        }

        let refused = RecordingTunnel::default();
        assert_eq!(
            hub.connect(refused.clone()).await,
            Err(Error::Refused(watcher::Error::MaximumConnections))
        );
        assert!(refused.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_health_serializes() {
        let hub = spawn::<RecordingTunnel>(questions());
        let health = hub.health().await.unwrap();

        assert_eq!(
            serde_json::to_value(health).unwrap(),
            serde_json::json!({"status": "ok", "stage": "lobby", "players": 0})
        );
    }
}
