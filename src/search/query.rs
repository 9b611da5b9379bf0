//! Query preprocessing: raw passthrough or keyword extraction.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Preprocessing mode applied before text search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Raw,
    Keywords,
}

const MAX_TOKENS: usize = 12;
const MIN_TOKEN_LEN: usize = 3;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "and", "or", "but", "if", "then", "else", "for", "to", "of", "in",
        "on", "at", "by", "with", "is", "are", "was", "were", "be", "been", "being", "it",
        "its", "this", "that", "these", "those", "as", "from", "not", "do", "does", "did",
    ]
    .into_iter()
    .collect()
});

/// Preprocess `query` according to `mode`. `Raw` passes the input through
/// unchanged; `Keywords` tokenizes (splitting on whitespace/punctuation
/// while keeping hyphenated terms intact), case-folds, removes stop words,
/// drops tokens shorter than 3 characters, deduplicates in first-seen
/// order, caps at 12 tokens, and rejoins with spaces.
pub fn preprocess(query: &str, mode: QueryMode) -> String {
    match mode {
        QueryMode::Raw => query.to_string(),
        QueryMode::Keywords => {
            let mut seen = HashSet::new();
            let mut kept = Vec::new();

            for token in tokenize(query) {
                let folded = token.to_lowercase();
                if folded.len() < MIN_TOKEN_LEN {
                    continue;
                }
                if STOP_WORDS.contains(folded.as_str()) {
                    continue;
                }
                if seen.insert(folded.clone()) {
                    kept.push(folded);
                }
                if kept.len() == MAX_TOKENS {
                    break;
                }
            }

            kept.join(" ")
        }
    }
}

/// Split on whitespace and punctuation, but keep a hyphen inside a word
/// (`co-routine` stays one token; a leading/trailing hyphen is still a
/// separator).
fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in query.chars() {
        let is_word_char = c.is_alphanumeric() || (c == '-' && !current.is_empty());
        if is_word_char {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
        .into_iter()
        .map(|t| t.trim_matches('-').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_mode_passes_through_unchanged() {
        assert_eq!(preprocess("  X  y ", QueryMode::Raw), "  X  y ");
    }

    #[test]
    fn stop_words_are_removed() {
        assert_eq!(preprocess("the a an", QueryMode::Keywords), "");
    }

    #[test]
    fn keeps_hyphenated_terms_intact() {
        assert_eq!(preprocess("error-handling code", QueryMode::Keywords), "error-handling code");
    }

    #[test]
    fn case_folds_and_dedupes_preserving_order() {
        assert_eq!(preprocess("Foo foo FOO bar", QueryMode::Keywords), "foo bar");
    }

    #[test]
    fn drops_short_tokens() {
        assert_eq!(preprocess("go to it now", QueryMode::Keywords), "now");
    }

    #[test]
    fn caps_at_twelve_tokens() {
        let query = (0..20).map(|i| format!("token{i}")).collect::<Vec<_>>().join(" ");
        let result = preprocess(&query, QueryMode::Keywords);
        assert_eq!(result.split_whitespace().count(), 12);
        assert!(result.starts_with("token0 token1"));
    }

    #[test]
    fn punctuation_splits_tokens() {
        assert_eq!(preprocess("foo.bar(); baz!", QueryMode::Keywords), "foo bar baz");
    }
}
