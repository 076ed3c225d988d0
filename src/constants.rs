//! Configuration constants for the trivia session
//!
//! This module contains the limits and defaults used throughout the crate
//! to keep the question source sane and to give the server predictable
//! boundaries.

/// Question source limits, enforced when the question file is loaded
pub mod quiz {
    /// Maximum number of questions in a single question file
    pub const MAX_QUESTION_COUNT: usize = 1000;
    /// Maximum length of a question prompt in characters
    pub const MAX_PROMPT_LENGTH: usize = 500;
    /// Minimum number of options for a question
    pub const MIN_OPTION_COUNT: usize = 1;
    /// Maximum number of options for a question
    pub const MAX_OPTION_COUNT: usize = 16;
    /// Maximum length of a single option in characters
    pub const MAX_OPTION_LENGTH: usize = 200;
}

/// Session limits
pub mod session {
    /// Maximum number of simultaneous connections (host, players and spectators)
    pub const MAX_CONNECTION_COUNT: usize = 1000;
    /// Number of inbound events that may queue up before senders wait
    pub const COMMAND_BUFFER_SIZE: usize = 256;
}

/// Player naming
pub mod names {
    /// Prefix of the placeholder given to players who join without a name
    pub const PLACEHOLDER_PREFIX: &str = "Spieler";
}

/// Defaults for the standalone server
pub mod server {
    /// Address the server binds to
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    /// Port the server listens on
    pub const DEFAULT_PORT: u16 = 3000;
    /// Location of the question file
    pub const DEFAULT_QUESTIONS_PATH: &str = "data/questions.json";
    /// Largest WebSocket message accepted from a client, in bytes
    pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
}
