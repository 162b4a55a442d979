//! Validation helpers for client-supplied identifiers.

use validator::ValidationError;

/// Normalize a room name to the restricted keyspace character set.
///
/// Room names become storage path segments, so everything outside
/// `[A-Za-z0-9_]` must go before the name touches a hierarchical key:
/// whitespace and dashes map to underscores, anything else is dropped.
pub fn sanitize_room_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                Some(c)
            } else if c.is_whitespace() || c == '-' {
                Some('_')
            } else {
                None
            }
        })
        .collect()
}

/// Validates that a room name still names something after sanitization.
pub fn validate_room_name(name: &str) -> Result<(), ValidationError> {
    if sanitize_room_name(name).is_empty() {
        let mut err = ValidationError::new("room_name_empty");
        err.message = Some("Room name must contain at least one letter, digit, or underscore".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_room_name("sprint_12"), "sprint_12");
        assert_eq!(sanitize_room_name("Team42"), "Team42");
    }

    #[test]
    fn sanitize_maps_separators_to_underscore() {
        assert_eq!(sanitize_room_name("sprint 12"), "sprint_12");
        assert_eq!(sanitize_room_name("alpha-team"), "alpha_team");
    }

    #[test]
    fn sanitize_strips_path_separators() {
        // Injection attempt: must not be able to escape the room keyspace.
        assert_eq!(sanitize_room_name("evil/../other"), "evilother");
        assert_eq!(sanitize_room_name("a/b.c#d$e"), "abcde");
    }

    #[test]
    fn validate_rejects_names_that_sanitize_away() {
        assert!(validate_room_name("sprint 12").is_ok());
        assert!(validate_room_name("///").is_err());
        assert!(validate_room_name("   ").is_err());
        assert!(validate_room_name("").is_err());
    }
}
