//! URL slugs for catalog entries.

/// Turn a product name into a URL slug.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters collapses into a single `-`, and leading/trailing dashes are
/// dropped.
///
/// ```
/// use cartwheel_core::slugify;
///
/// assert_eq!(slugify("Gaming Laptop 15\""), "gaming-laptop-15");
/// assert_eq!(slugify("  --Hello,   World!-- "), "hello-world");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Column width of `products.slug`.
pub const MAX_SLUG_LEN: usize = 150;

/// Candidate slug for the `n`th attempt at finding a free slug.
///
/// Attempt 1 is the base itself; later attempts get a numeric suffix
/// starting at `-2`. The base is cut short so the result never exceeds
/// `max_len` bytes. `base` is expected to come from [`slugify`], so it is
/// ASCII and any cut falls on a character boundary.
///
/// ```
/// use cartwheel_core::numbered_slug;
///
/// assert_eq!(numbered_slug("phone", 3, 150), "phone-3");
/// assert_eq!(numbered_slug("abcdef", 2, 6), "abcd-2");
/// ```
#[must_use]
pub fn numbered_slug(base: &str, n: u32, max_len: usize) -> String {
    let suffix = if n <= 1 { String::new() } else { format!("-{n}") };
    let keep = max_len.saturating_sub(suffix.len()).min(base.len());
    let head = base.get(..keep).unwrap_or(base).trim_end_matches('-');
    format!("{head}{suffix}")
}
