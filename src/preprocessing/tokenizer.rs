use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Runs of Unicode letters and digits; everything else is a boundary.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\W_]+").expect("valid token regex"));

const DEFAULT_STOP_WORDS: &str = include_str!("../../stop_words/english.txt");

/// Lowercases `text` and splits it on non-alphanumeric boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowercased = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowercased)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Tokenizes and drops stop words. Fit and transform must both go through here.
pub fn filtered_tokens(text: &str, stop_words: &HashSet<String>) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|token| !stop_words.contains(token))
        .collect()
}

pub fn default_stop_words() -> HashSet<String> {
    parse_stop_words(DEFAULT_STOP_WORDS)
}

pub fn load_stop_words<P: AsRef<Path>>(path: P) -> io::Result<HashSet<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_stop_words(&content))
}

fn parse_stop_words(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect()
}
