use unicode_segmentation::UnicodeSegmentation;

const FOLLOW_UP_OPENERS: &[&[&str]] = &[
    &["what", "about"],
    &["how", "about"],
    &["and", "what", "about"],
    &["and", "how", "about"],
    &["same", "for"],
    &["what", "of"],
    &["and"],
];

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

// Lower-cased words by UAX #29 boundaries; punctuation is dropped.
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .unicode_words()
        .map(|word| word.to_lowercase())
        .collect()
}

pub fn find_phrase(tokens: &[String], phrase: &str) -> Option<usize> {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return None;
    }

    tokens
        .windows(needle.len())
        .position(|window| window.iter().zip(&needle).all(|(lhs, rhs)| lhs == rhs))
}

pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    find_phrase(tokens, phrase).is_some()
}

pub fn contains_any(tokens: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| contains_phrase(tokens, phrase))
}

pub fn is_follow_up(tokens: &[String]) -> bool {
    FOLLOW_UP_OPENERS.iter().any(|opener| {
        tokens.len() > opener.len()
            && tokens
                .iter()
                .zip(opener.iter())
                .all(|(token, word)| token == word)
    })
}

pub fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
