use crate::error::{Error, Result};

/// Upper bound on candidates tried by [`fresh_name`].
pub const MAX_ATTEMPTS: usize = 1 << 16;

/// Bump the trailing number of `name` by `boost`, or append `1` when there is none.
///
/// The first character never counts as part of the number, and leading zeros of
/// the number stay in the prefix: `a007` becomes `a008`, `a0` becomes `a01`.
pub fn increase_name(name: &str, boost: u64) -> String {
    let bytes = name.as_bytes();
    let mut start = name.len();
    while start > 1 && bytes[start - 1].is_ascii_digit() {
        start -= 1;
    }

    let number = name[start..].trim_start_matches('0');
    if number.is_empty() {
        return format!("{name}1");
    }
    let prefix = &name[..name.len() - number.len()];
    match number.parse::<u64>().ok().and_then(|n| n.checked_add(boost)) {
        Some(n) => format!("{prefix}{n}"),
        None => format!("{name}1"),
    }
}

/// First name derived from `candidate` (itself included) that `taken` rejects.
pub fn fresh_name(candidate: &str, taken: impl Fn(&str) -> bool) -> Result<String> {
    let mut name = candidate.to_string();
    for _ in 0..MAX_ATTEMPTS {
        if !taken(&name) {
            return Ok(name);
        }
        name = increase_name(&name, 1);
    }
    Err(Error::NameExhausted(candidate.to_string(), MAX_ATTEMPTS))
}
