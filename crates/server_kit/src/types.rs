//! # Value Types
//!
//! Plain data passed between functions, hooks and console command builders.
//! None of these types hold references to live world state; they are copied
//! out of the game when an event fires and handed to callbacks by value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a player as seen by console commands.
///
/// The console accepts any of the three identifiers; commands built by this
/// crate prefer [`PlayerBase::player_id`] because names may contain spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerBase {
    /// Cross-platform player id (e.g. `Steam_76561198000000000`)
    pub player_id: String,
    /// Display name
    pub player_name: String,
    /// Entity id inside the running world
    pub entity_id: i32,
}

impl PlayerBase {
    pub fn new(player_id: impl Into<String>, player_name: impl Into<String>, entity_id: i32) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            entity_id,
        }
    }
}

impl fmt::Display for PlayerBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.player_name, self.player_id)
    }
}

/// A world position.
///
/// Formats as three space-separated integers, the shape the `tele`
/// console command expects.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.x.round() as i32,
            self.y.round() as i32,
            self.z.round() as i32
        )
    }
}

/// A chat line typed by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub player: PlayerBase,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>, player: PlayerBase) -> Self {
        Self {
            text: text.into(),
            player,
        }
    }
}

/// A message broadcast to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalMessage {
    pub message: String,
    /// Shown as the sender; the server name is used when absent
    pub sender_name: Option<String>,
}

/// A message delivered to a single player.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivateMessage {
    /// Player id, entity id or name of the recipient
    pub target_player_id_or_name: String,
    pub message: String,
    pub sender_name: Option<String>,
}

/// Destination of a teleport.
#[derive(Debug, Clone, PartialEq)]
pub enum TeleportTarget {
    /// Another player, by id, entity id or name
    Player(String),
    /// Absolute world coordinates
    Position(Position),
}

impl From<Position> for TeleportTarget {
    fn from(position: Position) -> Self {
        Self::Position(position)
    }
}

impl From<&PlayerBase> for TeleportTarget {
    fn from(player: &PlayerBase) -> Self {
        Self::Player(player.player_id.clone())
    }
}

/// Days left until the next blood moon.
///
/// `days_until_horde` is reduced by `frequency` until it falls within one
/// cycle, then the remainder is subtracted from the cycle length. Returns
/// `None` when `frequency` is zero since no cycle exists.
pub fn days_remaining(days_until_horde: u32, frequency: u32) -> Option<u32> {
    if frequency == 0 {
        return None;
    }
    if days_until_horde <= frequency {
        return Some(frequency - days_until_horde);
    }
    // Repeated subtraction stops at the first value in (0, frequency].
    let within_cycle = (days_until_horde - 1) % frequency + 1;
    Some(frequency - within_cycle)
}
