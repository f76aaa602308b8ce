//! String similarity metrics on a 0-100 scale.
//!
//! All three metrics are built on normalized Levenshtein similarity and are
//! meant to be applied to already-normalized names.

use strsim::normalized_levenshtein;

/// Full-sequence similarity.
///
/// # Examples
///
/// ```
/// use canonry::similarity::ratio;
///
/// assert_eq!(ratio("norton hospital", "norton hospital"), 100.0);
/// assert!(ratio("norton", "newton") < 100.0);
/// ```
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

/// Best full-sequence similarity of the shorter string against every
/// equal-length window of the longer one.
///
/// A shorter string that appears verbatim inside the longer scores 100.
#[must_use]
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if shorter.is_empty() {
        return if longer.is_empty() { 100.0 } else { 0.0 };
    }
    if shorter.len() == longer.len() {
        return ratio(a, b);
    }

    let needle: String = shorter.iter().collect();
    let mut best = 0.0f64;
    for start in 0..=(longer.len() - shorter.len()) {
        let window: String = longer[start..start + shorter.len()].iter().collect();
        let score = ratio(&needle, &window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

/// Similarity after sorting whitespace-separated tokens.
///
/// Insensitive to word order ("smith john" vs "john smith").
#[must_use]
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
