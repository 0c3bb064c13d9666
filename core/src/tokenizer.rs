use lazy_static::lazy_static;
use regex::bytes::{Matches, Regex};

lazy_static! {
    // Digit run, letter run, or one code point that is neither whitespace nor
    // punctuation. Everything else (and any invalid UTF-8) separates terms.
    static ref RE: Regex = Regex::new(r"(?u)\p{Nd}+|\p{L}+|[^\s\p{P}]").expect("valid regex");
}

/// Lazy sequence of lower-cased terms in source order. Never yields an empty term.
pub struct Terms<'a> {
    inner: Matches<'static, 'a>,
}

impl Iterator for Terms<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.inner
            .next()
            .map(|m| String::from_utf8_lossy(m.as_bytes()).chars().map(lower).collect())
    }
}

/// Simple one-to-one case fold with no context rules: a word-final `Σ`
/// folds to `σ`. `İ` is the only character whose full lowercase expands
/// (to `i` plus a combining dot); its simple mapping is the leading `i`.
fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Split raw document bytes into terms.
///
/// Whitespace and punctuation are skipped. A maximal run of digits or of
/// letters forms one term; any other code point (symbols, emoji) is a
/// one-character term. Letters are lower-cased; nothing else is normalized.
pub fn tokenize(content: &[u8]) -> Terms<'_> {
    let re: &'static Regex = &RE;
    Terms { inner: re.find_iter(content) }
}

/// Lazy sequence of n-grams produced by [`gramify`].
pub struct Grams<'a, S> {
    terms: &'a [S],
    min_n: usize,
    max_n: usize,
    left: usize,
    high: usize,
    next_left: usize,
}

/// Expand a term sequence into every contiguous span of `min_n..=max_n` terms.
///
/// Spans are grouped by their end position; for each end position they are
/// emitted longest first. Spans are joined with a single space. An invalid
/// range (`min_n == 0` or `min_n > max_n`) or fewer than `min_n` terms yields
/// nothing.
pub fn gramify<S: AsRef<str>>(terms: &[S], min_n: usize, max_n: usize) -> Grams<'_, S> {
    let exhausted = min_n == 0 || min_n > max_n || terms.len() < min_n;
    Grams {
        terms,
        min_n,
        max_n,
        left: 0,
        high: if exhausted { terms.len() + 1 } else { min_n },
        next_left: 0,
    }
}

impl<S: AsRef<str>> Iterator for Grams<'_, S> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if self.high > self.terms.len() {
                return None;
            }
            if self.next_left + self.min_n <= self.high {
                let span = &self.terms[self.next_left..self.high];
                self.next_left += 1;
                let joined = span.iter().map(|t| t.as_ref()).collect::<Vec<_>>().join(" ");
                if joined.is_empty() {
                    continue;
                }
                return Some(joined);
            }
            self.high += 1;
            if self.high - self.left > self.max_n {
                self.left += 1;
            }
            self.next_left = self.left;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(s: &str) -> Vec<String> {
        tokenize(s.as_bytes()).collect()
    }

    #[test]
    fn splits_letters_from_digits() {
        assert_eq!(terms("Testing2"), vec!["testing", "2"]);
        assert_eq!(terms("2 Testing!"), vec!["2", "testing"]);
    }

    #[test]
    fn symbols_are_single_terms() {
        assert_eq!(terms("a+b=c"), vec!["a", "+", "b", "=", "c"]);
        assert_eq!(terms("€€"), vec!["€", "€"]);
    }

    #[test]
    fn invalid_utf8_separates_terms() {
        assert_eq!(tokenize(b"ab\xffcd").collect::<Vec<_>>(), vec!["ab", "cd"]);
    }

    #[test]
    fn gram_window_slides() {
        let t = ["a", "b", "c", "d"];
        let got: Vec<String> = gramify(&t, 2, 3).collect();
        assert_eq!(got, vec!["a b", "a b c", "b c", "b c d", "c d"]);
    }

    #[test]
    fn invalid_range_is_empty() {
        let t = ["a", "b"];
        assert_eq!(gramify(&t, 0, 2).count(), 0);
        assert_eq!(gramify(&t, 2, 1).count(), 0);
    }
}
