//! FILENAME: core/pivot-engine/src/compare.rs
//! Ordering helpers shared by rows, columns, cells and items.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

/// Splits a label into digit runs and non-digit runs.
static CHUNKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+|\D+").unwrap());

/// Null-safe comparison: `None` sorts before any `Some`.
pub fn cmp_option<T, F>(a: Option<T>, b: Option<T>, cmp: F) -> Ordering
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp(a, b),
    }
}

/// Compares labels so that "Group 2" sorts before "Group 10".
///
/// Digit runs compare by numeric value, other runs case-insensitively.
/// Labels that only differ by case or leading zeros fall back to a plain
/// byte comparison so the order stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = CHUNKS.find_iter(a).map(|m| m.as_str());
    let mut right = CHUNKS.find_iter(b).map(|m| m.as_str());

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let x_digits = x.as_bytes()[0].is_ascii_digit();
                let y_digits = y.as_bytes()[0].is_ascii_digit();
                let ord = match (x_digits, y_digits) {
                    (true, true) => cmp_digit_runs(x, y),
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => x.to_lowercase().cmp(&y.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Compares two runs of ASCII digits by value, without overflow.
fn cmp_digit_runs(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}
