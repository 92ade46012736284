/// Command-line argument quoting
use crate::error::CommandError;

/// Formats a value so that the console parses it as exactly one token.
///
/// * an empty value stays empty
/// * a value already wrapped in double quotes is returned unchanged
/// * any other value containing a double quote is rejected, since wrapping
///   cannot escape it
/// * a value containing a space is wrapped in double quotes
///
/// Formatting an already formatted value returns it unchanged.
pub fn format_argument(value: &str) -> Result<String, CommandError> {
    if value.is_empty() {
        return Ok(String::new());
    }

    if is_quoted(value) {
        return Ok(value.to_string());
    }

    if value.contains('"') {
        return Err(CommandError::embedded_quote(value));
    }

    if value.contains(' ') {
        return Ok(format!("\"{value}\""));
    }

    Ok(value.to_string())
}

/// Optional variant used for trailing arguments such as a sender name.
pub fn format_optional_argument(value: Option<&str>) -> Result<String, CommandError> {
    value.map_or_else(|| Ok(String::new()), format_argument)
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
}
