//! `[Key][Value]` line codec for device documents.
//!
//! One entry per line. Keys and values are the shortest runs up to the next `]`,
//! so neither may contain `]`; there is no escaping. Lines that do not contain the
//! pattern are skipped, and the last occurrence of a repeated key wins.

use std::sync::OnceLock;

use regex::Regex;

use crate::store::record::{FieldMap, FieldName};

const LINE_PATTERN: &str = r"\[(.*?)\]\[(.*?)\]";

fn line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| Regex::new(LINE_PATTERN).expect("document line pattern compiles"))
}

/// Parse a document into a field mapping.
#[must_use]
pub fn decode(text: &str) -> FieldMap {
    let re = line_regex();
    let mut out = FieldMap::new();
    for line in text.lines().filter(|l| !l.is_empty()) {
        if let Some(caps) = re.captures(line) {
            out.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    out
}

/// Encode `(key, value)` pairs in the given order.
#[must_use]
pub fn encode_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        out.push('[');
        out.push_str(key);
        out.push_str("][");
        out.push_str(value);
        out.push_str("]\n");
    }
    out
}

/// Encode a whole mapping.
///
/// Known fields come first in canonical order (telemetry, control, reference,
/// alert); any other keys follow in sorted order.
#[must_use]
pub fn encode(fields: &FieldMap) -> String {
    let known = FieldName::ALL.iter().filter_map(|f| {
        fields
            .get_key_value(f.wire_name())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    });
    let rest = fields
        .iter()
        .filter(|(k, _)| FieldName::from_wire(k).is_none())
        .map(|(k, v)| (k.as_str(), v.as_str()));
    encode_pairs(known.chain(rest))
}
