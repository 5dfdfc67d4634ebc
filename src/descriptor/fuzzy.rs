//! Approximate matching of user-entered values against a closed vocabulary.
//!
//! This is a convenience for values typed at the command line. Library
//! callers construct descriptors from the exact enums instead.

use crate::error::DalError;

/// Minimum similarity a candidate needs to be considered a match.
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Find the single closest vocabulary entry to `value`.
///
/// Comparison is case-insensitive. An exact match wins immediately. Otherwise
/// every entry whose similarity reaches `cutoff` is a candidate, and the best
/// one is returned. No candidate, or two different entries tied for best, is
/// a configuration error.
pub fn closest_match<'v>(
    field: &'static str,
    value: &str,
    vocabulary: &[&'v str],
    cutoff: f64,
) -> Result<&'v str, DalError> {
    let needle = value.trim().to_ascii_lowercase();

    if let Some(exact) = vocabulary.iter().find(|entry| **entry == needle) {
        return Ok(*exact);
    }

    let mut scored: Vec<(f64, &'v str)> = vocabulary
        .iter()
        .map(|entry| (similarity(&needle, entry), *entry))
        .filter(|(score, _)| *score >= cutoff)
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    match scored.as_slice() {
        [] => Err(DalError::Configuration {
            field,
            value: value.to_string(),
            message: format!("no close match (expected one of: {})", vocabulary.join(", ")),
        }),
        [(best, entry), (second, other), ..] if best == second && entry != other => {
            Err(DalError::Configuration {
                field,
                value: value.to_string(),
                message: format!("ambiguous between '{entry}' and '{other}'"),
            })
        }
        [(_, entry), ..] => Ok(*entry),
    }
}

/// Similarity in `[0, 1]`: one minus the edit distance over the longer length.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr_row = vec![0; b_chars.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != *b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_chars.len()]
}
