//! Naming convention: handler names → route segments.
//!
//! # Rules
//! - A new word starts at every ASCII upper-case letter after the first
//!   character (`getUserProfile` → `get`, `User`, `Profile`)
//! - `_` and `-` also separate words and are dropped (`get_user` → `get`, `user`)
//! - Acronyms split per letter (`getHTTP` → `get`, `H`, `T`, `T`, `P`)
//! - Digits never start a word
//!
//! The first word of a leaf name is the HTTP method; the rest is the path.

/// How the words of a name are joined into a path fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    /// `profileinfo`
    Concatenated,
    /// `profile_info`
    Underscored,
    /// `profile/info`
    Nested,
}

impl JoinStyle {
    /// Styles used for leaf names.
    pub const LEAF: [JoinStyle; 3] = [
        JoinStyle::Concatenated,
        JoinStyle::Underscored,
        JoinStyle::Nested,
    ];

    /// Styles used for group prefixes.
    pub const GROUP: [JoinStyle; 2] = [JoinStyle::Concatenated, JoinStyle::Underscored];

    fn separator(self) -> &'static str {
        match self {
            JoinStyle::Concatenated => "",
            JoinStyle::Underscored => "_",
            JoinStyle::Nested => "/",
        }
    }
}

/// Split `name` at word boundaries.
pub fn split_words(name: &str) -> Vec<&str> {
    let mut words = Vec::new();
    for piece in name.split(['_', '-']) {
        let mut start = 0;
        for (idx, ch) in piece.char_indices() {
            if idx > start && ch.is_ascii_uppercase() {
                words.push(&piece[start..idx]);
                start = idx;
            }
        }
        if start < piece.len() {
            words.push(&piece[start..]);
        }
    }
    words
}

/// Lower-case and join `words` in `style`.
pub fn join(words: &[&str], style: JoinStyle) -> String {
    words
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(style.separator())
}

/// Canonical lookup key: lower-cased words with separators removed.
///
/// `userAccount`, `user_account` and `UserAccount` share the key `useraccount`.
pub fn compact(name: &str) -> String {
    join(&split_words(name), JoinStyle::Concatenated)
}

/// Split a leaf name into `(method, path words)`.
pub fn method_and_words(name: &str) -> Option<(String, Vec<&str>)> {
    let mut words = split_words(name);
    if words.is_empty() {
        return None;
    }
    let method = words.remove(0).to_ascii_lowercase();
    Some((method, words))
}

/// Lower-case a request path and drop a trailing slash (`/` stays `/`).
pub fn normalize_path(path: &str) -> String {
    let lowered = path.to_ascii_lowercase();
    let trimmed = lowered.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
