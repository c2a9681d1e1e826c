//! Text analysis shared by indexing and query parsing.
//!
//! The same analyzer must run on both sides: terms written into the index
//! and terms produced from query text have to agree token for token, or
//! phrase scoping silently stops matching.

/// Maximum token length to keep. Longer runs are almost always encoded
/// binary payloads pasted into element content.
const MAX_TOKEN_LENGTH: usize = 128;

/// Lowercasing word analyzer: splits on anything that is not alphanumeric,
/// keeps token order (positions matter for phrase queries).
pub fn analyze(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                current.push(lower);
            }
        } else if !current.is_empty() {
            push_token(&mut tokens, &mut current);
        }
    }

    if !current.is_empty() {
        push_token(&mut tokens, &mut current);
    }

    tokens
}

fn push_token(tokens: &mut Vec<String>, current: &mut String) {
    if current.len() <= MAX_TOKEN_LENGTH {
        tokens.push(std::mem::take(current));
    } else {
        current.clear();
    }
}
