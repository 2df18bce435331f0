//! Reserved-character escaping
//!
//! The tokenizer performs the inverse: a `^` makes the next character a
//! literal and is dropped from the decoded value.

/// Characters with structural meaning inside a CFI
pub const RESERVED: [char; 7] = ['[', ']', '^', ',', '(', ')', ';'];

/// The escape prefix
pub const ESCAPE_CHAR: char = '^';

pub fn is_reserved(ch: char) -> bool {
    RESERVED.contains(&ch)
}

/// Prefix each reserved character with `^`
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if is_reserved(ch) {
            out.push(ESCAPE_CHAR);
        }
        out.push(ch);
    }
    out
}
