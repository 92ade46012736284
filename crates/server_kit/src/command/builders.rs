//! Console command builders
//!
//! Each builder formats its arguments with [`format_argument`] so that a
//! command is never produced from an argument the console would split.
use super::argument::{format_argument, format_optional_argument};
use crate::error::CommandError;
use crate::types::{GlobalMessage, PrivateMessage, TeleportTarget};

/// `tele <origin> <target>`
///
/// Coordinates are emitted as three bare tokens; a player target is quoted
/// like any other argument. A player target that already looks like three
/// space-separated coordinates is passed through as coordinates.
pub fn teleport_player(origin: &str, target: &TeleportTarget) -> Result<String, CommandError> {
    let origin = format_argument(origin)?;
    let target = match target {
        TeleportTarget::Position(position) => position.to_string(),
        TeleportTarget::Player(player) if player.split(' ').count() == 3 => player.clone(),
        TeleportTarget::Player(player) => format_argument(player)?,
    };
    Ok(format!("tele {origin} {target}"))
}

/// `ty-say <message> [sender]`
pub fn global_message(message: &GlobalMessage) -> Result<String, CommandError> {
    let text = format_argument(&message.message)?;
    let sender = format_optional_argument(message.sender_name.as_deref())?;
    Ok(join_command("ty-say", &[text, sender]))
}

/// `ty-pm <target> <message> [sender]`
pub fn private_message(message: &PrivateMessage) -> Result<String, CommandError> {
    let target = format_argument(&message.target_player_id_or_name)?;
    let text = format_argument(&message.message)?;
    let sender = format_optional_argument(message.sender_name.as_deref())?;
    Ok(join_command("ty-pm", &[target, text, sender]))
}

// Trailing empty arguments are optional and left off.
fn join_command(name: &str, args: &[String]) -> String {
    let mut command = String::from(name);
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command.trim_end().to_string()
}
