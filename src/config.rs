//! Startup configuration
//!
//! Settings are read from the command line, falling back to environment
//! variables and then to the defaults in [`crate::constants::server`].

use std::path::PathBuf;

use clap::Parser;

use crate::constants::server::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_QUESTIONS_PATH};

/// Command line arguments of the server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    /// Address to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// JSON file holding the list of questions
    #[arg(short, long, env = "QUESTIONS", default_value = DEFAULT_QUESTIONS_PATH)]
    pub questions: PathBuf,
}

impl Settings {
    /// Returns the `host:port` string to listen on
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
