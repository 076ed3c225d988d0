//! Player display names
//!
//! Players may pick any name. A missing or blank name is replaced by a
//! numbered placeholder based on how many players are already present.

use crate::constants::names::PLACEHOLDER_PREFIX;

/// Resolves the display name of a joining player
///
/// # Arguments
///
/// * `requested` - The name sent by the client, if any
/// * `player_count` - Number of players registered at the time of joining
///
/// # Returns
///
/// The trimmed requested name, or `"Spieler N"` with `N = player_count + 1`
/// when the requested name is absent or blank.
pub fn display_name(requested: Option<&str>, player_count: usize) -> String {
    match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => placeholder(player_count + 1),
    }
}

fn placeholder(position: usize) -> String {
    format!("{PLACEHOLDER_PREFIX} {position}")
}
