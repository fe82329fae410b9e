//! Registration-number validation.
//!
//! An [`Identifier`] can only be obtained through [`validate`], so every value
//! that reaches the fetcher is known to be exactly eleven decimal digits.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // `\d` is Unicode-aware: any decimal digit counts.
    Regex::new(r"^\d{11}$").expect("identifier pattern is a valid regex")
});

/// Example shown to users when they submit something malformed.
pub const IDENTIFIER_EXAMPLE: &str = "22156148011";

/// A validated eleven-digit registration number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of validating one raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(Identifier),
    /// Carries the trimmed token so it can be echoed back and reported.
    Invalid(String),
}

/// Trim surrounding whitespace and accept the remainder iff it is exactly
/// eleven decimal digits. No other normalization is applied.
pub fn validate(raw: &str) -> Validation {
    let trimmed = raw.trim();
    if IDENTIFIER_PATTERN.is_match(trimmed) {
        Validation::Valid(Identifier(trimmed.to_string()))
    } else {
        Validation::Invalid(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_eleven_digits_unchanged() {
        for raw in ["22156148011", "00000000000", "99999999999"] {
            assert_eq!(validate(raw), Validation::Valid(Identifier(raw.to_string())));
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        match validate("  22156148011\r\n") {
            Validation::Valid(id) => assert_eq!(id.as_str(), "22156148011"),
            other => panic!("expected valid identifier, got {:?}", other),
        }
    }

    #[test]
    fn keeps_leading_zeros() {
        match validate("01234567890") {
            Validation::Valid(id) => assert_eq!(id.to_string(), "01234567890"),
            other => panic!("expected valid identifier, got {:?}", other),
        }
    }

    #[test]
    fn rejects_everything_else() {
        let cases = [
            "",
            "   ",
            "bad",
            "2215614801",       // 10 digits
            "221561480111",     // 12 digits
            "2215614801a",      // letter
            "22156 148011",     // inner space
            "+2215614801",      // sign
            "22156148011\n1",   // embedded newline
        ];
        for raw in cases {
            assert!(
                matches!(validate(raw), Validation::Invalid(_)),
                "expected {:?} to be rejected",
                raw
            );
        }
    }

    #[test]
    fn accepts_non_ascii_decimal_digits() {
        let raw = "٢٢١٥٦١٤٨٠١١";
        assert_eq!(
            validate(&format!(" {} ", raw)),
            Validation::Valid(Identifier(raw.to_string()))
        );
    }

    #[test]
    fn invalid_carries_trimmed_token() {
        assert_eq!(validate("  bad \t"), Validation::Invalid("bad".to_string()));
    }
}
