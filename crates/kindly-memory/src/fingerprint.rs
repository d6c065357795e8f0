// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable content fingerprints for exact-duplicate detection.

use sha2::{Digest, Sha256};

/// Normalize text so trivially different spellings of the same content collide.
///
/// Lowercases, drops everything except letters, digits, and whitespace, and
/// collapses whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex SHA-256 of the normalized content.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(normalize(text).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_punctuation_and_spacing() {
        assert_eq!(
            normalize("  My sister   Maria, got PROMOTED! "),
            "my sister maria got promoted"
        );
    }

    #[test]
    fn keeps_non_latin_letters() {
        assert_eq!(normalize("Моя сестра — Мария."), "моя сестра мария");
    }

    #[test]
    fn equivalent_texts_share_fingerprint() {
        assert_eq!(
            fingerprint("I love hiking."),
            fingerprint("i love   HIKING")
        );
        assert_ne!(fingerprint("I love hiking"), fingerprint("I love biking"));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint("anything");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
