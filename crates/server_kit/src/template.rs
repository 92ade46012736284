//! Command templates.
//!
//! Configured command lines may reference the player that triggered them.
//! Supported placeholders are `{PlayerId}`, `{PlayerName}` and `{EntityId}`;
//! anything else in braces is left untouched.

use crate::types::PlayerBase;

const PLAYER_ID: &str = "{PlayerId}";
const PLAYER_NAME: &str = "{PlayerName}";
const ENTITY_ID: &str = "{EntityId}";

/// Substitutes the player placeholders in `template`.
pub fn render_command(template: &str, player: &PlayerBase) -> String {
    if !template.contains('{') {
        return template.to_string();
    }
    template
        .replace(PLAYER_ID, &player.player_id)
        .replace(PLAYER_NAME, &player.player_name)
        .replace(ENTITY_ID, &player.entity_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all_placeholders() {
        let player = PlayerBase::new("Steam_1", "Alice", 171);
        assert_eq!(
            render_command("give {EntityId} medicalBandage 2 # for {PlayerName} ({PlayerId})", &player),
            "give 171 medicalBandage 2 # for Alice (Steam_1)"
        );
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        let player = PlayerBase::new("Steam_1", "Alice", 171);
        assert_eq!(render_command("say {ServerName}", &player), "say {ServerName}");
        assert_eq!(render_command("saveworld", &player), "saveworld");
    }
}
