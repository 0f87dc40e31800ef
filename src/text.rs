//! Text normalization for values read from source feeds.
//!
//! Source feeds are hand-maintained and carry stray line breaks, tabs and
//! runs of spaces inside values. Every value is normalized before it is
//! compared with or written into a registry:
//!
//! ```text
//! clean(text) = join(" ", split_on_runs_of(c <= U+0020, trim(text)))
//! ```

/// Collapse every run of control characters and spaces into a single space
/// and trim both ends.
///
/// # Example
///
/// ```rust
/// use codebase_reconcile::text::clean;
///
/// assert_eq!(clean("  COVID-19,\r\n   mRNA\t"), "COVID-19, mRNA");
/// ```
pub fn clean(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c <= ' ' {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

/// True when the value is absent or only whitespace.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
