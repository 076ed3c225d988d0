//! Question source
//!
//! The question list is read once at startup from a JSON file and never
//! changes afterwards. Every record is validated on load so that the session
//! can rely on `correct_index` pointing at one of the options.

use std::{fs, path::Path};

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::quiz::{
    MAX_OPTION_COUNT, MAX_OPTION_LENGTH, MAX_PROMPT_LENGTH, MAX_QUESTION_COUNT, MIN_OPTION_COUNT,
};

/// Checks that an index addresses one of the given options
fn index_within(options: &[String]) -> impl FnOnce(&usize, &()) -> garde::Result + '_ {
    move |index, _| {
        if *index < options.len() {
            Ok(())
        } else {
            Err(garde::Error::new(format!(
                "correct index {index} is outside of the {} options",
                options.len()
            )))
        }
    }
}

/// A single multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// The text shown to everyone
    #[garde(length(max = MAX_PROMPT_LENGTH))]
    pub prompt: String,
    /// The selectable options, in display order
    #[garde(
        length(min = MIN_OPTION_COUNT, max = MAX_OPTION_COUNT),
        inner(length(max = MAX_OPTION_LENGTH))
    )]
    pub options: Vec<String>,
    /// Index of the right option
    #[garde(custom(index_within(&self.options)))]
    pub correct_index: usize,
}

/// Errors that can occur while loading the question source
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be read
    #[error("failed to read question file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a JSON list of questions
    #[error("malformed question file: {0}")]
    Parse(#[from] serde_json::Error),
    /// One or more questions break the constraints
    #[error("invalid question file: {0}")]
    Invalid(#[from] garde::Report),
}

/// The immutable, ordered list of questions for a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(transparent)]
pub struct QuestionSet(#[garde(length(max = MAX_QUESTION_COUNT), dive)] Vec<Question>);

impl QuestionSet {
    /// Creates a validated question set
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if any question breaks the constraints.
    pub fn new(questions: Vec<Question>) -> Result<Self, Error> {
        let set = Self(questions);
        set.validate()?;
        Ok(set)
    }

    /// Parses and validates a question set from its JSON representation
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for malformed JSON and `Error::Invalid` if any
    /// question breaks the constraints.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let set: Self = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    /// Reads, parses and validates the question file at `path`
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`QuestionSet::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let set = Self::from_json(&contents)?;
        log::info!("loaded {} questions from {}", set.len(), path.display());
        Ok(set)
    }

    /// Returns the number of questions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if there are no questions at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets the question at `index`
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.0.get(index)
    }

    /// Selects a question cyclically, wrapping around past the end
    ///
    /// Returns `None` only for an empty set.
    pub fn cyclic_index(&self, counter: usize) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(counter % self.len())
        }
    }
}
