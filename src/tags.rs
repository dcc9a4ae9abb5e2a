//! Reading and writing comma-separated tag lines.
//!
//! A tag containing a comma cannot be represented; there is no escaping.

/// Token some datasets use to split a tag line into sections.
pub const SEPARATOR_TOKEN: &str = "|||";

const DELIMITER: char = ',';
const JOIN: &str = ", ";

/// Split a raw tag line into trimmed, non-empty tags. Keeps [`SEPARATOR_TOKEN`].
pub fn decode(raw: &str) -> Vec<String> {
    raw.split(DELIMITER)
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Like [`decode`] but drops [`SEPARATOR_TOKEN`]; this is what the user sees and deletes from.
pub fn decode_for_edit(raw: &str) -> Vec<String> {
    decode(raw)
        .into_iter()
        .filter(|tag| tag != SEPARATOR_TOKEN)
        .collect()
}

pub fn encode(tags: &[String]) -> String {
    tags.join(JOIN)
}

pub fn contains_ignore_case(tags: &[String], tag: &str) -> bool {
    let needle = tag.to_lowercase();
    tags.iter().any(|t| t.to_lowercase() == needle)
}

/// Remove the first exact occurrence of `tag`. Returns whether anything was removed.
pub fn remove_first(tags: &mut Vec<String>, tag: &str) -> bool {
    match tags.iter().position(|t| t == tag) {
        Some(idx) => {
            tags.remove(idx);
            true
        }
        None => false,
    }
}
