use once_cell::sync::Lazy;
use regex::Regex;

use crate::object::ObjectType;

static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("label pattern compiles"));

const RESERVED: [&str; 2] = ["true", "false"];

pub(crate) fn is_valid_label(label: &str) -> bool {
    LABEL_PATTERN.is_match(label) && !RESERVED.contains(&label)
}

/// First unused label in `A, B, ..., Z, A_1, ...` (or the lower-case run).
pub(crate) fn next_free_label<F>(kind: ObjectType, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let letters: Vec<char> = if kind.uses_upper_case_labels() {
        ('A'..='Z').collect()
    } else {
        ('a'..='z').collect()
    };
    let mut suffix = 0usize;
    loop {
        for letter in &letters {
            let candidate = if suffix == 0 {
                letter.to_string()
            } else {
                format!("{letter}_{suffix}")
            };
            if !is_taken(&candidate) {
                return candidate;
            }
        }
        suffix += 1;
    }
}
