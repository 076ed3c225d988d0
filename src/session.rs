//! Communication session management
//!
//! This module defines the trait for tunneling messages between the session
//! and connected clients (host, players and spectators). The tunnel
//! abstraction keeps the session independent of the transport in use.

use super::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
///
/// Each live connection owns one tunnel. Broadcasting is done by the
/// session by sending the same message through every tunnel it knows about.
pub trait Tunnel {
    /// Sends a one-off event to the client
    ///
    /// Events announce something that just happened, such as a question
    /// starting or being revealed.
    ///
    /// # Arguments
    ///
    /// * `message` - The event to send
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state snapshot to the client
    ///
    /// Snapshots replace whatever the client currently shows; they are sent
    /// after every mutation.
    ///
    /// # Arguments
    ///
    /// * `state` - The snapshot to send
    fn send_state(&self, state: &SyncMessage);

    /// Closes the communication tunnel
    ///
    /// Used when a connection is refused or torn down by the server.
    fn close(self);
}
