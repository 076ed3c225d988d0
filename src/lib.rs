//! # One vs. Hundred
//!
//! This library provides the session logic for a live, host-moderated,
//! last-one-standing trivia game. One host connection drives a sequence of
//! multiple-choice questions, any number of players answer in real time and
//! everyone who answers a revealed question incorrectly is out.
//!
//! The [`game::Game`] state machine is transport agnostic: it talks to
//! connections through the [`session::Tunnel`] trait. [`hub`] serializes all
//! inbound events onto a single task and [`server`] exposes the session over
//! WebSocket together with an HTTP health endpoint.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
use serde::Serialize;

pub mod config;
pub mod constants;
pub mod game;
pub mod hub;
mod names;
pub mod question;
pub mod server;
pub mod session;
pub mod view;
pub mod watcher;

/// State snapshots pushed after every mutation
///
/// Every client replaces its whole view with the latest snapshot it got, so
/// these can be dropped or repeated without harm.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, derive_more::From)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SyncMessage {
    /// Public view, broadcast to every connection
    State(view::PublicView),
    /// Host view, sent to the host connection only
    HostControl(view::HostView),
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// One-off events announcing a stage transition
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum UpdateMessage {
    /// A question went live; never carries the correct index
    QuestionStarted(view::QuestionAnnouncement),
    /// Answers were locked and scored
    #[serde(rename_all = "camelCase")]
    QuestionReveal {
        /// Index of the right option
        correct_index: usize,
        /// Players eliminated by this reveal, in join order
        eliminated: Vec<watcher::Id>,
        /// Players still alive after this reveal
        mob_alive: usize,
    },
    /// The game was rewound to the lobby
    GameReset,
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_message_to_message() {
        let id = watcher::Id::new();
        let message = UpdateMessage::QuestionReveal {
            correct_index: 2,
            eliminated: vec![id],
            mob_alive: 7,
        };
        let json: serde_json::Value = serde_json::from_str(&message.to_message()).unwrap();

        assert_eq!(json["event"], "question-reveal");
        assert_eq!(json["data"]["correctIndex"], 2);
        assert_eq!(json["data"]["eliminated"][0], id.to_string());
        assert_eq!(json["data"]["mobAlive"], 7);
    }

    #[test]
    fn test_game_reset_has_no_payload() {
        let json: serde_json::Value =
            serde_json::from_str(&UpdateMessage::GameReset.to_message()).unwrap();

        assert_eq!(json["event"], "game-reset");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_question_started_to_message() {
        let message = UpdateMessage::QuestionStarted(view::QuestionAnnouncement {
            prompt: "2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            number: 1,
            total: 5,
        });
        let json: serde_json::Value = serde_json::from_str(&message.to_message()).unwrap();

        assert_eq!(json["event"], "question-started");
        assert_eq!(json["data"]["prompt"], "2 + 2?");
        assert_eq!(json["data"]["number"], 1);
        assert_eq!(json["data"]["total"], 5);
        assert!(json["data"].get("correctIndex").is_none());
    }
}
