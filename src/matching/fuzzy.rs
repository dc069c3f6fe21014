//! String-similarity scoring for fuzzy static matching.
//!
//! Implements a matching-block ratio in the Ratcliff/Obershelp family: find
//! the longest common block of the two strings, recurse on the pieces to its
//! left and right, and score `2 * matched / (len_a + len_b)`. The result is
//! symmetric and bounded in `[0, 1]`, with `1.0` for identical strings.

/// Normalized similarity ratio between two strings.
///
/// Operates on Unicode scalar values, so multi-byte characters count once.
/// Callers are expected to lower-case both sides first; this function does
/// no normalization of its own.
///
/// # Arguments
/// * `a` - First string.
/// * `b` - Second string.
///
/// # Returns
/// A score in `[0.0, 1.0]`. Two empty strings score `1.0`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / total as f64
}

/// Total characters covered by the matching blocks of `a` and `b`.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, size) = longest_matching_block(a, b);
    if size == 0 {
        return 0;
    }

    size + matching_chars(&a[..a_start], &b[..b_start])
        + matching_chars(&a[a_start + size..], &b[b_start + size..])
}

/// Longest common contiguous block between `a` and `b`.
///
/// Returns `(start_in_a, start_in_b, length)`; `(0, 0, 0)` when the strings
/// share no characters. Single-row dynamic programming, O(len_a * len_b)
/// time and O(len_b) space.
fn longest_matching_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0usize);
    let mut row = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        // Walk right-to-left so row[j] still holds the previous iteration's
        // value when row[j + 1] reads it.
        for j in (0..b.len()).rev() {
            if ca == b[j] {
                let run = row[j] + 1;
                row[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            } else {
                row[j + 1] = 0;
            }
        }
    }

    best
}
