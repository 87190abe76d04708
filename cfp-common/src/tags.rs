//! Keyword tag sanitization and splitting
//!
//! Tags travel as one comma-joined string. Sanitization is the only
//! input-validation rule the core applies to free text; long-form fields are
//! cleaned by the rendering layer.

/// Replace every character outside `[0-9A-Za-z,_ +-]` with `_`
pub fn sanitize(tags: &str) -> String {
    tags.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ',' | '_' | ' ' | '+' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Split a comma-joined tag string into individual tag values
///
/// Empty segments are dropped so an empty input yields no tags.
pub fn split(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_forbidden_characters() {
        assert_eq!(sanitize("C++, rock&roll"), "C++, rock_roll");
        assert_eq!(sanitize("<script>"), "_script_");
        assert_eq!(sanitize("plain tag"), "plain tag");
    }

    #[test]
    fn sanitize_keeps_allowed_punctuation() {
        assert_eq!(sanitize("a-b_c+d, e"), "a-b_c+d, e");
    }

    #[test]
    fn split_drops_empty_segments() {
        assert_eq!(split(""), Vec::<String>::new());
        assert_eq!(split("rust, async,"), vec!["rust", "async"]);
        assert_eq!(split("C++, rock_roll"), vec!["C++", "rock_roll"]);
    }
}
