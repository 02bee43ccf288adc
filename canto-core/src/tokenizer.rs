//! Whitespace tokenizer.
//!
//! Words are maximal runs of non-whitespace characters. No case folding,
//! stemming or punctuation stripping is applied: `"Nel"` and `"nel"` are
//! different words, and so are `"vita"` and `"vita,"`.

use crate::histogram::Histogram;

/// Split `text` on Unicode whitespace runs, dropping empty tokens.
///
/// Tokens borrow from `text` and are returned in source order.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Count tokens into a histogram without touching any store.
pub fn count_words<'a, I>(tokens: I) -> Histogram
where
    I: IntoIterator<Item = &'a str>,
{
    let mut histogram = Histogram::new();
    for token in tokens {
        histogram.increment(token);
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_whitespace_runs() {
        assert_eq!(
            tokenize("Nel  mezzo\tdel\ncammin"),
            vec!["Nel", "mezzo", "del", "cammin"]
        );
    }

    #[test]
    fn test_empty_and_blank_text() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t\r\n ").is_empty());
    }

    #[test]
    fn test_preserves_case_and_punctuation() {
        assert_eq!(
            tokenize("vita, Vita vita."),
            vec!["vita,", "Vita", "vita."]
        );
    }

    #[test]
    fn test_unicode_whitespace() {
        // U+00A0 no-break space and U+3000 ideographic space both separate words
        assert_eq!(tokenize("selva\u{00A0}oscura\u{3000}via"), vec!["selva", "oscura", "via"]);
    }

    #[test]
    fn test_count_words() {
        let histogram = count_words(tokenize("a a b"));
        assert_eq!(histogram.get("a"), 2);
        assert_eq!(histogram.get("b"), 1);
        assert_eq!(histogram.len(), 2);
    }
}
