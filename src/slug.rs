//! Slug derivation for article titles.

/// Derive the URL identifier for an article title.
///
/// The title is lowercased, runs of whitespace or hyphens collapse into a
/// single `-`, and anything outside `[a-z0-9-]` is dropped. Leading and
/// trailing hyphens are trimmed, so the result is stable under re-derivation.
/// A title with no ASCII letters or digits yields an empty string.
pub fn derive_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_is_stripped() {
        assert_eq!(derive_slug("Hello World!"), "hello-world");
        assert_eq!(derive_slug("What's new, Rust?"), "whats-new-rust");
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        assert_eq!(derive_slug("  many \t  spaces\nhere "), "many-spaces-here");
        assert_eq!(derive_slug("already-hyphen - ated"), "already-hyphen-ated");
    }

    #[test]
    fn test_derivation_is_idempotent() {
        for title in ["Hello World!", "  A -- B  ", "Ünïcode Tïtle 42", "x"] {
            let once = derive_slug(title);
            assert_eq!(derive_slug(&once), once);
            assert_eq!(derive_slug(title), once);
        }
    }

    #[test]
    fn test_non_ascii_letters_are_dropped() {
        assert_eq!(derive_slug("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_empty_titles() {
        assert_eq!(derive_slug(""), "");
        assert_eq!(derive_slug("   "), "");
        assert_eq!(derive_slug("?!-"), "");
    }
}
