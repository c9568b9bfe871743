use std::collections::HashSet;

/// Strips markup from user-supplied display text (usernames).
///
/// Usernames are rendered by every client that shows a profile, so tags and
/// attributes are removed with a whitelist sanitizer and the result is trimmed.
/// A name that is nothing but markup comes back empty.
pub fn clean_display_text(input: &str) -> String {
    ammonia::Builder::default()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
        .trim()
        .to_string()
}
