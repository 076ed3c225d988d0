//! Connection registry
//!
//! This module tracks every live connection of a session: spectators that
//! have not joined yet, players with their per-round state, and which
//! connection currently holds host authority. It owns no transport details;
//! messages are delivered through [`Tunnel`]s found by id.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use super::{SyncMessage, UpdateMessage, names, session::Tunnel};

/// A unique identifier for a connection
///
/// Every connection gets a fresh id when it opens; it stays stable for the
/// lifetime of that connection and is never reused.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Whether a player is still in the running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Has answered every revealed question correctly so far
    Alive,
    /// Answered a revealed question incorrectly (or not at all)
    Out,
}

/// A player and their state for the current game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// The connection this player belongs to
    pub id: Id,
    /// Display name
    pub name: String,
    /// Alive or out
    pub status: Status,
    /// Number of correct answers in this game
    pub score: u64,
    /// Option index chosen for the live question, if any
    pub answer: Option<i64>,
}

impl Player {
    /// Creates a fresh player that is alive with no points and no answer
    pub fn new(id: Id, name: String) -> Self {
        Self {
            id,
            name,
            status: Status::Alive,
            score: 0,
            answer: None,
        }
    }

    /// Checks if the player is still alive
    pub fn is_alive(&self) -> bool {
        self.status == Status::Alive
    }

    /// Checks if the player has an answer recorded for the live question
    pub fn has_answered(&self) -> bool {
        self.answer.is_some()
    }

    /// Puts the player back into the state of a fresh join, keeping the name
    pub fn rewind(&mut self) {
        self.status = Status::Alive;
        self.score = 0;
        self.answer = None;
    }
}

/// What a connection currently is within the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// A connection that has not joined as a player (spectators, hosts)
    Unassigned,
    /// A joined player
    Player(Player),
}

/// The kind of connection without associated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum ValueKind {
    /// A connection that has not joined as a player
    Unassigned,
    /// A joined player
    Player,
}

impl Value {
    /// Returns the kind of this value without the associated data
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unassigned => ValueKind::Unassigned,
            Value::Player(_) => ValueKind::Player,
        }
    }
}

/// Errors that can occur when managing connections
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of allowed connections
    #[error("maximum number of connections reached")]
    MaximumConnections,
}

/// Manages all connections of a session
///
/// Players are kept in join order, which is the order every view lists them
/// in. Host authority is tracked separately from the connection's value: the
/// host is whichever connection joined as host last, and it loses authority
/// only by being displaced or by disconnecting.
#[derive(Debug, Default)]
pub struct Watchers {
    /// Primary mapping from connection ID to its value
    mapping: HashMap<Id, Value>,

    /// Reverse mapping organized by kind
    reverse_mapping: EnumMap<ValueKind, HashSet<Id>>,

    /// Players in join order
    player_order: Vec<Id>,

    /// Connection currently holding host authority
    host: Option<Id>,
}

impl Watchers {
    /// Registers a newly opened connection as unassigned
    ///
    /// Registering an id that is already known does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumConnections` if the session is full.
    pub fn add_watcher(&mut self, watcher_id: Id) -> Result<(), Error> {
        if self.mapping.contains_key(&watcher_id) {
            return Ok(());
        }

        if self.mapping.len() >= crate::constants::session::MAX_CONNECTION_COUNT {
            return Err(Error::MaximumConnections);
        }

        self.mapping.insert(watcher_id, Value::Unassigned);
        self.reverse_mapping[ValueKind::Unassigned].insert(watcher_id);

        Ok(())
    }

    /// Gives host authority to `watcher_id`, displacing any previous host
    ///
    /// Returns the displaced host, if there was one other than `watcher_id`.
    pub fn set_host(&mut self, watcher_id: Id) -> Option<Id> {
        self.host
            .replace(watcher_id)
            .filter(|previous| *previous != watcher_id)
    }

    /// Registers `watcher_id` as a player
    ///
    /// A connection that joins again replaces its previous player record but
    /// keeps its position in the join order.
    ///
    /// # Returns
    ///
    /// The display name the player was given
    pub fn add_player(&mut self, watcher_id: Id, requested_name: Option<&str>) -> String {
        let name = names::display_name(requested_name, self.player_count());
        let player = Player::new(watcher_id, name.clone());

        match self.mapping.insert(watcher_id, Value::Player(player)) {
            Some(Value::Player(_)) => {}
            previous => {
                if previous.is_some() {
                    self.reverse_mapping[ValueKind::Unassigned].remove(&watcher_id);
                }
                self.reverse_mapping[ValueKind::Player].insert(watcher_id);
                self.player_order.push(watcher_id);
            }
        }

        name
    }

    /// Removes a connection entirely
    ///
    /// The player record, if any, is deleted, and host authority is cleared
    /// if the connection held it. Unknown ids are ignored.
    ///
    /// # Returns
    ///
    /// The value the connection had, if it was known
    pub fn remove_watcher(&mut self, watcher_id: Id) -> Option<Value> {
        if self.host == Some(watcher_id) {
            self.host = None;
        }

        let value = self.mapping.remove(&watcher_id)?;
        self.reverse_mapping[value.kind()].remove(&watcher_id);
        if value.kind() == ValueKind::Player {
            self.player_order.retain(|id| *id != watcher_id);
        }

        Some(value)
    }

    /// Checks if a connection is registered
    pub fn has_watcher(&self, watcher_id: Id) -> bool {
        self.mapping.contains_key(&watcher_id)
    }

    /// Returns the connection currently holding host authority
    pub fn host(&self) -> Option<Id> {
        self.host
    }

    /// Checks if `watcher_id` currently holds host authority
    pub fn is_host(&self, watcher_id: Id) -> bool {
        self.host == Some(watcher_id)
    }

    /// Gets the player record of a connection
    pub fn player(&self, watcher_id: Id) -> Option<&Player> {
        match self.mapping.get(&watcher_id) {
            Some(Value::Player(player)) => Some(player),
            _ => None,
        }
    }

    /// Gets the mutable player record of a connection
    pub fn player_mut(&mut self, watcher_id: Id) -> Option<&mut Player> {
        match self.mapping.get_mut(&watcher_id) {
            Some(Value::Player(player)) => Some(player),
            _ => None,
        }
    }

    /// Iterates over all players in join order
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.player_order
            .iter()
            .filter_map(|id| match self.mapping.get(id) {
                Some(Value::Player(player)) => Some(player),
                _ => None,
            })
    }

    /// Applies `f` to every player in join order
    pub fn for_each_player_mut<F: FnMut(&mut Player)>(&mut self, mut f: F) {
        for id in &self.player_order {
            if let Some(Value::Player(player)) = self.mapping.get_mut(id) {
                f(player);
            }
        }
    }

    /// Gets the number of connections of a specific kind
    pub fn specific_count(&self, filter: ValueKind) -> usize {
        self.reverse_mapping[filter].len()
    }

    /// Gets the number of players
    pub fn player_count(&self) -> usize {
        self.specific_count(ValueKind::Player)
    }

    /// Gets the number of players still alive
    pub fn alive_count(&self) -> usize {
        self.players().filter(|player| player.is_alive()).count()
    }

    /// Gets the number of live connections of any kind
    pub fn connection_count(&self) -> usize {
        self.mapping.len()
    }

    /// Gets all connections with their tunnels
    ///
    /// Connections without an active tunnel are skipped.
    pub fn vec<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) -> Vec<(Id, T)> {
        self.mapping
            .keys()
            .sorted()
            .filter_map(|id| tunnel_finder(*id).map(|tunnel| (*id, tunnel)))
            .collect_vec()
    }

    /// Sends a state snapshot to a specific connection
    pub fn send_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &SyncMessage,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(watcher_id) else {
            return;
        };

        session.send_state(message);
    }

    /// Broadcasts an event to every connection
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, session) in self.vec(tunnel_finder) {
            session.send_message(message);
        }
    }

    /// Broadcasts a state snapshot to every connection
    pub fn announce_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &SyncMessage,
        tunnel_finder: F,
    ) {
        for (_, session) in self.vec(tunnel_finder) {
            session.send_state(message);
        }
    }
}
