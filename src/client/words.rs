/// Soft cap on entry length, enforced while composing.
pub const MAX_WORDS: usize = 200;

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keeps the first `max` whitespace-delimited words joined by single spaces.
/// Returns `None` when `text` is already within the limit.
pub fn truncate_words(text: &str, max: usize) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max {
        return None;
    }
    Some(words[..max].join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_any_whitespace() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
        assert_eq!(count_words("one"), 1);
        assert_eq!(count_words(" one\ttwo\n\nthree  "), 3);
    }

    #[test]
    fn truncates_to_first_words() {
        let text: String = (0..250).map(|i| format!("w{i}\n ")).collect();
        let cut = truncate_words(&text, MAX_WORDS).unwrap();
        let expected: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
        assert_eq!(cut, expected.join(" "));
        assert_eq!(count_words(&cut), MAX_WORDS);
    }

    #[test]
    fn leaves_short_text_alone() {
        assert_eq!(truncate_words("a  b", 2), None);
        assert_eq!(truncate_words("", MAX_WORDS), None);
    }
}
