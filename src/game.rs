//! Core session logic and state management
//!
//! This module contains the session state machine: which stage the game is
//! in, which question is live, who holds host authority, and how answers are
//! collected and reconciled at reveal time. Every mutating event ends with a
//! fresh snapshot pushed to all connections.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::{
    UpdateMessage,
    question::{Question, QuestionSet},
    session::Tunnel,
    view::{HostView, PublicView, QuestionAnnouncement},
    watcher::{self, Id, Watchers},
};

/// The phase the session is in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Waiting for the host to start a question; initial and after reset
    #[default]
    Lobby,
    /// A question is live and accepting answers
    Question,
    /// Answers are locked, scored and eliminations applied
    Reveal,
}

/// The role a connection asks for when joining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Takes over host authority
    Host,
    /// Plays along
    Player,
}

/// Payload of a `join` event
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JoinRequest {
    /// Requested display name; blank or missing gets a placeholder
    pub name: Option<String>,
    /// `"host"` to become host, any other value or none to play
    pub role: Option<serde_json::Value>,
}

impl JoinRequest {
    /// Interprets the requested role
    ///
    /// Only the exact string `"host"` asks for host authority; values of
    /// any other type join as a player rather than failing to decode.
    pub fn role(&self) -> Role {
        match self.role.as_ref().and_then(serde_json::Value::as_str) {
            Some("host") => Role::Host,
            _ => Role::Player,
        }
    }
}

/// Messages received from connections
///
/// Which connection may send what is checked when the message is applied,
/// not when it is decoded; anything sent by the wrong connection or at the
/// wrong time is dropped without a reply.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum IncomingMessage {
    /// Register as host or player
    Join(JoinRequest),
    /// Host: start the next question
    HostStartQuestion,
    /// Player: choose an option of the live question
    SubmitAnswer(i64),
    /// Host: lock answers, score and eliminate
    HostRevealAnswer,
    /// Host: rewind to the lobby
    HostResetGame,
}

impl IncomingMessage {
    /// Decodes a message from its JSON representation
    ///
    /// Payloads of the wrong shape, such as a non-integer answer, are
    /// rejected here and never reach the session.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the text is not a known message.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Answer to a health query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Always `"ok"` while the session is running
    pub status: &'static str,
    /// Current stage
    pub stage: Stage,
    /// Number of players
    pub players: usize,
}

/// The trivia session
///
/// Owns the question source, the connection registry and the stage. Only
/// the host writes stage transitions and only a player writes their own
/// answer, and all events are applied one at a time, so no locking is
/// needed inside.
pub struct Game {
    /// The immutable question source
    questions: QuestionSet,
    /// Manager for all connections (spectators, players, host)
    pub watchers: Watchers,
    /// Current stage
    stage: Stage,
    /// Number of questions started since the last reset
    question_index: usize,
    /// Index into `questions` of the current question, kept through reveal
    active_question: Option<usize>,
}

impl Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("stage", &self.stage)
            .field("question_index", &self.question_index)
            .field("players", &self.watchers.player_count())
            .finish_non_exhaustive()
    }
}

// Accessors
impl Game {
    /// Returns the current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the number of questions started since the last reset
    ///
    /// While a question is live this is its 1-based number.
    pub fn question_number(&self) -> usize {
        self.question_index
    }

    /// Returns the number of questions in the question source
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Returns the current question, including during reveal
    pub fn active_question(&self) -> Option<&Question> {
        self.active_question.and_then(|i| self.questions.get(i))
    }

    /// Answers a health query without touching any state
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            stage: self.stage,
            players: self.watchers.player_count(),
        }
    }
}

impl Game {
    /// Creates a new session in the lobby
    ///
    /// # Arguments
    ///
    /// * `questions` - The question source, read once at startup
    pub fn new(questions: QuestionSet) -> Self {
        Self {
            questions,
            watchers: Watchers::default(),
            stage: Stage::Lobby,
            question_index: 0,
            active_question: None,
        }
    }

    /// Registers a newly opened connection
    ///
    /// The connection receives every broadcast from now on but has no role
    /// until it joins. Nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `watcher::Error::MaximumConnections` if the session is full.
    pub fn add_unassigned(&mut self, watcher: Id) -> Result<(), watcher::Error> {
        self.watchers.add_watcher(watcher)?;
        log::debug!("connection {watcher} opened");
        Ok(())
    }

    /// Handles a closed connection
    ///
    /// A departing player is deleted outright and a departing host gives up
    /// authority without anybody taking over. Everybody left gets a fresh
    /// snapshot.
    pub fn remove_watcher<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let was_host = self.watchers.is_host(watcher_id);

        if self.watchers.remove_watcher(watcher_id).is_none() {
            return;
        }

        if was_host {
            log::info!("host {watcher_id} disconnected");
        } else {
            log::debug!("connection {watcher_id} closed");
        }

        self.broadcast_state(tunnel_finder);
    }

    /// Handles an incoming message from a connection
    ///
    /// Messages from unknown connections, from the wrong role or at the
    /// wrong stage are dropped; in that case nothing is sent at all.
    pub fn receive_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        message: IncomingMessage,
        tunnel_finder: F,
    ) {
        if !self.watchers.has_watcher(watcher_id) {
            log::debug!("dropping message from unknown connection {watcher_id}");
            return;
        }

        let applied = match message {
            IncomingMessage::Join(request) => {
                self.join(watcher_id, &request, &tunnel_finder);
                true
            }
            IncomingMessage::HostStartQuestion => self.start_question(watcher_id, &tunnel_finder),
            IncomingMessage::SubmitAnswer(option_index) => {
                self.submit_answer(watcher_id, option_index)
            }
            IncomingMessage::HostRevealAnswer => self.reveal_answer(watcher_id, &tunnel_finder),
            IncomingMessage::HostResetGame => self.reset_game(watcher_id, &tunnel_finder),
        };

        if applied {
            self.broadcast_state(tunnel_finder);
        }
    }

    /// Pushes the public view to every connection and the host view to the host
    pub fn broadcast_state<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        self.watchers
            .announce_state(&PublicView::of(self).into(), &tunnel_finder);

        if let Some(host) = self.watchers.host() {
            self.watchers
                .send_state(&HostView::of(self).into(), host, &tunnel_finder);
        }
    }

    fn authorized(&self, watcher_id: Id, action: &str) -> bool {
        let authorized = self.watchers.is_host(watcher_id);
        if !authorized {
            log::debug!("ignoring {action} from non-host {watcher_id}");
        }
        authorized
    }

    fn join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        request: &JoinRequest,
        tunnel_finder: F,
    ) {
        match request.role() {
            Role::Host => {
                if let Some(previous) = self.watchers.set_host(watcher_id) {
                    log::info!("host {previous} displaced by {watcher_id}");
                } else {
                    log::info!("{watcher_id} joined as host");
                }
                self.watchers
                    .send_state(&HostView::of(self).into(), watcher_id, tunnel_finder);
            }
            Role::Player => {
                let name = self
                    .watchers
                    .add_player(watcher_id, request.name.as_deref());
                log::info!("{watcher_id} joined as player {name:?}");
            }
        }
    }

    fn start_question<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) -> bool {
        if !self.authorized(watcher_id, "start-question") {
            return false;
        }

        let Some(index) = self.questions.cyclic_index(self.question_index) else {
            log::debug!("ignoring start-question without any questions");
            return false;
        };

        self.active_question = Some(index);
        self.question_index += 1;
        self.stage = Stage::Question;
        self.watchers.for_each_player_mut(|player| player.answer = None);

        log::info!(
            "question {} of {} started",
            self.question_index,
            self.questions.len()
        );

        if let Some(question) = self.active_question() {
            self.watchers.announce(
                &UpdateMessage::QuestionStarted(QuestionAnnouncement::new(
                    question,
                    self.question_index,
                    self.questions.len(),
                )),
                tunnel_finder,
            );
        }

        true
    }

    fn submit_answer(&mut self, watcher_id: Id, option_index: i64) -> bool {
        if self.stage != Stage::Question {
            log::debug!("ignoring answer from {watcher_id} outside of a question");
            return false;
        }

        let Some(player) = self.watchers.player_mut(watcher_id) else {
            log::debug!("ignoring answer from non-player {watcher_id}");
            return false;
        };

        player.answer = Some(option_index);

        true
    }

    fn reveal_answer<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) -> bool {
        if !self.authorized(watcher_id, "reveal-answer") {
            return false;
        }

        let Some(correct_index) = self.active_question().map(|q| q.correct_index) else {
            log::debug!("ignoring reveal-answer without an active question");
            return false;
        };

        let mut eliminated = Vec::new();
        self.watchers.for_each_player_mut(|player| {
            if !player.is_alive() {
                return;
            }

            let answer = player.answer.take();
            if answer.and_then(|a| usize::try_from(a).ok()) == Some(correct_index) {
                player.score += 1;
            } else {
                player.status = watcher::Status::Out;
                eliminated.push(player.id);
            }
        });
        self.stage = Stage::Reveal;

        let mob_alive = self.watchers.alive_count();
        log::info!(
            "question {} revealed: {} eliminated, {mob_alive} alive",
            self.question_index,
            eliminated.len()
        );

        self.watchers.announce(
            &UpdateMessage::QuestionReveal {
                correct_index,
                eliminated,
                mob_alive,
            },
            tunnel_finder,
        );

        true
    }

    fn reset_game<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) -> bool {
        if !self.authorized(watcher_id, "reset-game") {
            return false;
        }

        self.question_index = 0;
        self.active_question = None;
        self.stage = Stage::Lobby;
        self.watchers.for_each_player_mut(watcher::Player::rewind);

        log::info!("game reset");

        self.watchers
            .announce(&UpdateMessage::GameReset, tunnel_finder);

        true
    }
}
