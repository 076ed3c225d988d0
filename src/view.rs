//! Projections of the session state
//!
//! Two read-only views are derived from a [`Game`] after every mutation:
//! the public view, which is safe to show to every connection, and the host
//! view, which additionally carries the correct answer and every player's
//! raw state. Both are recomputed from scratch each time.

use itertools::Itertools;
use serde::Serialize;

use crate::{
    game::{Game, Stage},
    question::Question,
    watcher::{Id, Player, Status},
};

/// A live question as players see it
///
/// Shared by the `question-started` event and the public view. It has no
/// room for the correct index on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnnouncement {
    /// The question text
    pub prompt: String,
    /// The selectable options
    pub options: Vec<String>,
    /// 1-based number of this question in the current game
    pub number: usize,
    /// Number of questions in the question source
    pub total: usize,
}

impl QuestionAnnouncement {
    /// Strips the answer from a question
    pub fn new(question: &Question, number: usize, total: usize) -> Self {
        Self {
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            number,
            total,
        }
    }
}

/// A player as other players see them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    /// Connection id of the player
    pub id: Id,
    /// Display name
    pub name: String,
    /// Correct answers so far
    pub score: u64,
    /// Alive or out
    pub status: Status,
    /// Whether an answer is recorded for the live question
    pub answered: bool,
}

impl From<&Player> for PublicPlayer {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            score: player.score,
            status: player.status,
            answered: player.has_answered(),
        }
    }
}

/// The view broadcast to every connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicView {
    /// Current stage
    pub stage: Stage,
    /// Number of questions started in this game
    pub question_number: usize,
    /// Number of questions in the question source
    pub total_questions: usize,
    /// Players still alive
    pub mob_alive: usize,
    /// All players in join order
    pub players: Vec<PublicPlayer>,
    /// The live question, only while the stage is `question`
    pub active_question: Option<QuestionAnnouncement>,
}

impl PublicView {
    /// Projects the public view of a game
    pub fn of(game: &Game) -> Self {
        let active_question = match (game.stage(), game.active_question()) {
            (Stage::Question, Some(question)) => Some(QuestionAnnouncement::new(
                question,
                game.question_number(),
                game.total_questions(),
            )),
            _ => None,
        };

        Self {
            stage: game.stage(),
            question_number: game.question_number(),
            total_questions: game.total_questions(),
            mob_alive: game.watchers.alive_count(),
            players: game.watchers.players().map_into().collect_vec(),
            active_question,
        }
    }
}

/// The view sent only to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    /// Current stage
    pub stage: Stage,
    /// Whether a host is connected
    pub host_connected: bool,
    /// Number of questions started in this game
    pub question_number: usize,
    /// Number of questions in the question source
    pub total_questions: usize,
    /// Players still alive
    pub mob_alive: usize,
    /// The current question including its correct index, kept through reveal
    pub active_question: Option<Question>,
    /// Full player records in join order, answers included
    pub players: Vec<Player>,
}

impl HostView {
    /// Projects the host view of a game
    pub fn of(game: &Game) -> Self {
        Self {
            stage: game.stage(),
            host_connected: game.watchers.host().is_some(),
            question_number: game.question_number(),
            total_questions: game.total_questions(),
            mob_alive: game.watchers.alive_count(),
            active_question: game.active_question().cloned(),
            players: game.watchers.players().cloned().collect_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        SyncMessage, UpdateMessage, game::IncomingMessage, question::QuestionSet, session::Tunnel,
    };

    struct NullTunnel;

    impl Tunnel for NullTunnel {
        fn send_message(&self, _message: &UpdateMessage) {}

        fn send_state(&self, _state: &SyncMessage) {}

        fn close(self) {}
    }

    fn no_tunnels(_id: Id) -> Option<NullTunnel> {
        None
    }

    fn questions() -> QuestionSet {
        QuestionSet::from_json(
            r#"[{"prompt": "Welche Farbe hat der Himmel?", "options": ["Blau", "Grün", "Gelb"], "correctIndex": 0}]"#,
        )
        .unwrap()
    }

    fn message(json: &str) -> IncomingMessage {
        IncomingMessage::from_json(json).unwrap()
    }

    /// A game in the question stage with a host and two players, one of
    /// whom answered
    fn live_game() -> (Game, Id, Id, Id) {
        let mut game = Game::new(questions());
        let host = Id::new();
        let alice = Id::new();
        let bob = Id::new();
        for id in [host, alice, bob] {
            game.add_unassigned(id).unwrap();
        }
        let script = [
            (host, r#"{"event":"join","data":{"role":"host"}}"#),
            (alice, r#"{"event":"join","data":{"name":"Alice"}}"#),
            (bob, r#"{"event":"join","data":{"name":"Bob"}}"#),
            (host, r#"{"event":"host-start-question"}"#),
            (alice, r#"{"event":"submit-answer","data":2}"#),
        ];
        for (id, json) in script {
            game.receive_message(id, message(json), no_tunnels);
        }
        (game, host, alice, bob)
    }

    #[test]
    fn test_public_view_during_question() {
        let (game, _, alice, bob) = live_game();
        let view = PublicView::of(&game);

        assert_eq!(view.stage, Stage::Question);
        assert_eq!(view.question_number, 1);
        assert_eq!(view.total_questions, 1);
        assert_eq!(view.mob_alive, 2);
        assert_eq!(view.players.len(), 2);
        assert_eq!(view.players[0].id, alice);
        assert!(view.players[0].answered);
        assert_eq!(view.players[1].id, bob);
        assert!(!view.players[1].answered);

        let active = view.active_question.unwrap();
        assert_eq!(active.prompt, "Welche Farbe hat der Himmel?");
        assert_eq!(active.number, 1);
        assert_eq!(active.total, 1);
    }

    #[test]
    fn test_public_view_never_leaks_answers() {
        let (game, _, _, _) = live_game();
        let json = serde_json::to_value(SyncMessage::State(PublicView::of(&game))).unwrap();

        assert!(json["data"]["activeQuestion"].get("correctIndex").is_none());
        for player in json["data"]["players"].as_array().unwrap() {
            assert!(player.get("answer").is_none());
        }
        let text = json.to_string();
        assert!(!text.contains("correctIndex"));
        assert!(!text.contains("\"answer\""));
    }

    #[test]
    fn test_public_view_hides_question_outside_question_stage() {
        let (mut game, host, _, _) = live_game();
        game.receive_message(
            host,
            message(r#"{"event":"host-reveal-answer"}"#),
            no_tunnels,
        );

        let view = PublicView::of(&game);
        assert_eq!(view.stage, Stage::Reveal);
        assert_eq!(view.active_question, None);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["activeQuestion"].is_null());
    }

    #[test]
    fn test_host_view_carries_everything() {
        let (game, _, alice, _) = live_game();
        let view = HostView::of(&game);

        assert!(view.host_connected);
        assert_eq!(view.active_question.as_ref().unwrap().correct_index, 0);
        assert_eq!(view.players[0].id, alice);
        assert_eq!(view.players[0].answer, Some(2));

        let json = serde_json::to_value(SyncMessage::HostControl(view)).unwrap();
        assert_eq!(json["event"], "host-control");
        assert_eq!(json["data"]["activeQuestion"]["correctIndex"], 0);
        assert_eq!(json["data"]["players"][0]["answer"], 2);
        assert_eq!(json["data"]["hostConnected"], true);
    }

    #[test]
    fn test_host_view_keeps_question_through_reveal() {
        let (mut game, host, _, _) = live_game();
        game.receive_message(
            host,
            message(r#"{"event":"host-reveal-answer"}"#),
            no_tunnels,
        );

        let view = HostView::of(&game);
        assert_eq!(view.stage, Stage::Reveal);
        assert!(view.active_question.is_some());
    }

    #[test]
    fn test_projections_are_idempotent() {
        let (game, _, _, _) = live_game();

        assert_eq!(PublicView::of(&game), PublicView::of(&game));
        assert_eq!(HostView::of(&game), HostView::of(&game));
        assert_eq!(
            SyncMessage::from(PublicView::of(&game)).to_message(),
            SyncMessage::from(PublicView::of(&game)).to_message()
        );
    }

    #[test]
    fn test_lobby_view() {
        let game = Game::new(questions());
        let view = PublicView::of(&game);

        assert_eq!(view.stage, Stage::Lobby);
        assert_eq!(view.question_number, 0);
        assert_eq!(view.mob_alive, 0);
        assert!(view.players.is_empty());
        assert!(!HostView::of(&game).host_connected);
    }
}
