//! Spell checking for names that failed to resolve.
//!
//! When a template refers to a macro, directive or member that does not exist
//!     the engine tries to suggest a name the author may have meant.
//! The [suggest] function ranks every word of a dictionary by its
//! [Levenshtein distance](https://en.wikipedia.org/wiki/Levenshtein_distance)
//!     to the misspelled word and keeps the ones that are close enough to be useful.
//!
//! ## Implementation notes
//!
//! The distance is computed with the classic dynamic programming recurrence.
//! Let `X[i][j]` be the distance between the first `i` characters of `a` and the first `j`
//!     characters of `b`:
//!
//! ```text
//! X[i][j] = X[i-1][j-1]                          if a[i] == b[j]
//!         = 1 + min(X[i-1][j], X[i][j-1], X[i-1][j-1])  otherwise
//! ```
//!
//! Row `i` only depends on row `i-1`, so two rows of length `b.len() + 1` are enough.
//! Characters are compared after ASCII case folding:
//!     `getname` and `getName` are distance zero apart,
//!     which matches how the engine itself folds getter names.

/// A dictionary word together with its distance to the searched word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub word: String,
    pub distance: usize,
}

/// Find the words in the dictionary that are close to the searched word.
///
/// The result is sorted by distance, closest first; ties keep dictionary order.
/// Words further away than `max_distance` are dropped.
pub fn suggest<'a, I>(dictionary: I, word: &str, max_distance: usize) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut suggestions: Vec<Suggestion> = dictionary
        .into_iter()
        .filter_map(|candidate| {
            let distance = levenshtein_distance(word, candidate);
            if distance <= max_distance {
                Some(Suggestion {
                    word: candidate.to_string(),
                    distance,
                })
            } else {
                None
            }
        })
        .collect();
    suggestions.sort_by_key(|s| s.distance);
    suggestions
}

/// Return the closest dictionary word, if there is one within a sensible distance.
///
/// The cutoff scales with the length of the word: one edit for short words,
///     up to a third of the word for long ones.
pub fn closest<'a, I>(dictionary: I, word: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let max_distance = std::cmp::max(1, word.chars().count() / 3);
    suggest(dictionary, word, max_distance)
        .into_iter()
        .find(|s| !s.word.eq_ignore_ascii_case(word))
        .map(|s| s.word)
}

/// Case insensitive Levenshtein distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().map(|c| c.to_ascii_lowercase()).collect();
    let b: Vec<char> = b.chars().map(|c| c.to_ascii_lowercase()).collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current: Vec<usize> = vec![0; b.len() + 1];
    for (i, a_i) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_j) in b.iter().enumerate() {
            current[j + 1] = if a_i == b_j {
                previous[j]
            } else {
                1 + std::cmp::min(previous[j], std::cmp::min(previous[j + 1], current[j]))
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
