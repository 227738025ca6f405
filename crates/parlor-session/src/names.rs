//! Display-name collision handling.

/// Resolves a display name against the names already live in a room.
///
/// A collision with a live seat is not rejected: the joiner becomes
/// `name_1`, `name_2`, … — scanning existing suffixes for the next
/// unused integer, so `mina`, `mina_1` and a third `mina` yields `mina_2`.
pub fn dedupe_name(desired: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == desired) {
        return desired.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{desired}_{n}");
        if !taken.iter().any(|t| *t == candidate) {
            return candidate;
        }
        n += 1;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_free_name_passes_through() {
        assert_eq!(dedupe_name("mina", &names(&["jun"])), "mina");
    }

    #[test]
    fn test_collision_gets_first_suffix() {
        assert_eq!(dedupe_name("mina", &names(&["mina"])), "mina_1");
    }

    #[test]
    fn test_scans_past_existing_suffixes() {
        let taken = names(&["mina", "mina_1", "mina_2"]);
        assert_eq!(dedupe_name("mina", &taken), "mina_3");
    }

    #[test]
    fn test_gap_in_suffixes_is_reused() {
        let taken = names(&["mina", "mina_2"]);
        assert_eq!(dedupe_name("mina", &taken), "mina_1");
    }

    #[test]
    fn test_suffixed_join_collides_independently() {
        // Someone joining as "mina_1" while "mina_1" is live suffixes off
        // the requested name, not the base.
        let taken = names(&["mina_1"]);
        assert_eq!(dedupe_name("mina_1", &taken), "mina_1_1");
    }
}
