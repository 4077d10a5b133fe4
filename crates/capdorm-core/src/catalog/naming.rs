//! Identifier case conversion.
//!
//! Record and field names are converted to snake_case to produce table and
//! column names. A word starts at a capital letter. A run of capitals is one
//! acronym word, except that the last capital of the run starts a new word
//! when a lowercase letter follows it (`HTTPServer` is `HTTP` + `Server`).
//! Digits never start a word; they stay with the word they trail.

/// Convert a CamelCase identifier to snake_case.
///
/// ```
/// use capdorm_core::catalog::to_snake;
///
/// assert_eq!(to_snake("HTTPServer"), "http_server");
/// assert_eq!(to_snake("UserID"), "user_id");
/// assert_eq!(to_snake("owner_id"), "owner_id");
/// ```
pub fn to_snake(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let mut out = String::with_capacity(identifier.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && starts_word(&chars, i) {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }

    out
}

fn starts_word(chars: &[char], i: usize) -> bool {
    let c = chars[i];
    if !c.is_uppercase() {
        return false;
    }

    let prev = chars[i - 1];
    if prev == '_' {
        return false;
    }
    if !prev.is_uppercase() {
        return true;
    }

    // Inside a capital run: only the capital that opens a lowercase word splits.
    chars.get(i + 1).is_some_and(|next| next.is_lowercase())
}
