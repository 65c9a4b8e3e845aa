//! Stateless content checks applied to candidate message bodies.

use std::error::Error;
use std::fmt;

use crate::constants::{CAPS_MIN_CHARS, CAPS_RATIO_LIMIT, MAX_CHAR_RUN};

/// Why a message body was flagged. Checks are evaluated in declaration
/// order and the first violation short-circuits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpamError {
    TooLong,
    ExcessiveCaps,
    RepeatedChars,
}

impl fmt::Display for SpamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong => write!(f, "Message too long."),
            Self::ExcessiveCaps => write!(f, "Too many capital letters."),
            Self::RepeatedChars => write!(f, "Excessive repeated characters."),
        }
    }
}

impl Error for SpamError {}

/// Pure predicate over a candidate body. Holds only its configured
/// length cap; nothing about past messages influences the verdict.
pub struct AntiSpamFilter {
    max_body_chars: usize,
}

impl AntiSpamFilter {
    pub fn new(max_body_chars: usize) -> Self {
        Self { max_body_chars }
    }

    /// Accept or flag a body. Order: length, caps ratio, repeated runs.
    pub fn classify(&self, body: &str) -> Result<(), SpamError> {
        let length = body.chars().count();

        if length > self.max_body_chars {
            return Err(SpamError::TooLong);
        }

        let caps = body.chars().filter(|c| c.is_ascii_uppercase()).count();
        if length > CAPS_MIN_CHARS && caps as f32 > length as f32 * CAPS_RATIO_LIMIT {
            return Err(SpamError::ExcessiveCaps);
        }

        let mut run = 0usize;
        let mut previous: Option<char> = None;
        for c in body.chars() {
            if previous == Some(c) {
                run += 1;
            } else {
                run = 1;
                previous = Some(c);
            }
            if run > MAX_CHAR_RUN {
                return Err(SpamError::RepeatedChars);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_MAX_BODY_CHARS;

    fn filter() -> AntiSpamFilter {
        AntiSpamFilter::new(DEFAULT_MAX_BODY_CHARS)
    }

    #[test]
    fn test_ordinary_bodies_pass() {
        let filter = filter();
        assert!(filter.classify("hello there").is_ok());
        assert!(filter.classify("WOW nice").is_ok());
        assert!(filter.classify("soooooooo good").is_ok());
        assert!(filter.classify("").is_ok());
    }

    #[test]
    fn test_bodies_over_500_chars_are_too_long() {
        let filter = filter();
        assert!(filter.classify(&"a b ".repeat(125)).is_ok());
        assert_eq!(filter.classify(&"ab ".repeat(200)), Err(SpamError::TooLong));
    }

    #[test]
    fn test_mostly_uppercase_bodies_are_flagged() {
        let filter = filter();
        // 14 of 15 chars uppercase, well over the 70% ratio.
        assert_eq!(
            filter.classify("AAAAAAABBBBBBBx"),
            Err(SpamError::ExcessiveCaps)
        );
        // Short shouting is tolerated: ratio only applies past 10 chars.
        assert!(filter.classify("WOWOWOWOW").is_ok());
        // Exactly at the ratio is allowed; the rule is strictly-over.
        // 14 uppercase of 20 chars is precisely 70%.
        assert!(filter.classify("ABABABABABABABbbbbbb").is_ok());
    }

    #[test]
    fn test_eleven_identical_consecutive_chars_are_flagged() {
        let filter = filter();
        assert!(filter.classify(&format!("loo{}ng", "o".repeat(7))).is_ok());
        assert_eq!(
            filter.classify(&"a".repeat(11)),
            Err(SpamError::RepeatedChars)
        );
        assert_eq!(
            filter.classify(&format!("spam {} here", "!".repeat(11))),
            Err(SpamError::RepeatedChars)
        );
        // Ten in a row is still fine.
        assert!(filter.classify(&"a".repeat(10)).is_ok());
    }

    #[test]
    fn test_first_violation_wins() {
        let filter = filter();
        // Over-long AND shouty AND repetitive: length is reported.
        let body = "A".repeat(600);
        assert_eq!(filter.classify(&body), Err(SpamError::TooLong));
        // Shouty AND repetitive at legal length: caps is reported.
        let body = format!("{}{}", "A".repeat(20), "B".repeat(20));
        assert_eq!(filter.classify(&body), Err(SpamError::ExcessiveCaps));
    }
}
