use once_cell::sync::Lazy;
use regex::Regex;

const MAX_SLUG_LEN: usize = 200;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Derives a URL slug from a post title.
///
/// Lowercases, drops non-ASCII characters, collapses every run of
/// other characters into a single hyphen and trims the ends. Titles
/// that reduce to nothing fall back to "post".
pub fn generate_slug(title: &str) -> String {
    let ascii_lower: String = title
        .chars()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_ascii_lowercase();

    let slug = NON_SLUG_CHARS
        .replace_all(&ascii_lower, "-")
        .trim_matches('-')
        .to_string();

    let mut slug = if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    };

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Candidate slugs for deduplication: the base itself, then
/// "base-2", "base-3" and so on.
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}
