//! Tokenizer/segmenter shared by all text analyzers. No external calls.

/// Splits text into word tokens: maximal runs of alphanumeric characters plus
/// in-word apostrophes. Case is preserved; callers lowercase for comparison.
pub fn words(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || (ch == '\'' && !current.is_empty()) {
            current.push(ch);
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Splits text into sentences on terminal punctuation, dropping empty
/// fragments. Trailing fragments without a terminator still count.
pub fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_strips_punctuation() {
        let w = words("Um, so, basically I think.");
        assert_eq!(w, vec!["Um", "so", "basically", "I", "think"]);
    }

    #[test]
    fn test_words_keeps_contractions() {
        let w = words("I don't know");
        assert_eq!(w, vec!["I", "don't", "know"]);
    }

    #[test]
    fn test_words_empty_input() {
        assert!(words("").is_empty());
        assert!(words("  ,,, !! ").is_empty());
    }

    #[test]
    fn test_sentences_split_and_filter() {
        let s = sentences("First point. Second point! Third?   ");
        assert_eq!(s, vec!["First point", "Second point", "Third"]);
    }

    #[test]
    fn test_sentences_single_without_terminator() {
        let s = sentences("just one fragment");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_sentences_collapses_repeated_terminators() {
        let s = sentences("Wait... what?!");
        assert_eq!(s, vec!["Wait", "what"]);
    }
}
