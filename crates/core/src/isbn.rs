use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentifierKind {
    Isbn10,
    Isbn13,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Isbn10 => write!(f, "ISBN-10"),
            IdentifierKind::Isbn13 => write!(f, "ISBN-13"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsbnError {
    #[error("Identifier must be 10 or 13 characters, got {0}")]
    InvalidLength(usize),
    #[error("Checksum mismatch for '{0}'")]
    Checksum(String),
}

/// A checksum-valid ISBN in normalized form (no separators, upper-case `X`).
///
/// The only way to obtain one is through [`Identifier::parse`], so every value
/// in circulation has already passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    value: String,
    kind: IdentifierKind,
}

impl Identifier {
    /// Normalize and validate a raw candidate.
    pub fn parse(candidate: &str) -> Result<Self, IsbnError> {
        let value = normalize(candidate);
        let kind = match value.len() {
            10 => IdentifierKind::Isbn10,
            13 => IdentifierKind::Isbn13,
            n => return Err(IsbnError::InvalidLength(n)),
        };
        if !validate(&value) {
            return Err(IsbnError::Checksum(value));
        }
        Ok(Self { value, kind })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Identifier {
    type Err = IsbnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IsbnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.value
    }
}

/// Strip whitespace and hyphens and upper-case ASCII letters, so `x` becomes `X`.
pub fn normalize(candidate: &str) -> String {
    candidate
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Checksum validation for a normalized 10- or 13-character identifier.
pub fn validate(identifier: &str) -> bool {
    match identifier.len() {
        10 => validate_isbn10(identifier),
        13 => validate_isbn13(identifier),
        _ => false,
    }
}

/// Σ digit[i]·(10−i) over the first nine digits plus the check value
/// (`X` = 10) must be divisible by 11.
pub fn validate_isbn10(identifier: &str) -> bool {
    let bytes = identifier.as_bytes();
    if bytes.len() != 10 {
        return false;
    }

    let mut sum = 0u32;
    for (i, b) in bytes[..9].iter().enumerate() {
        if !b.is_ascii_digit() {
            return false;
        }
        sum += u32::from(b - b'0') * (10 - i as u32);
    }

    sum += match bytes[9] {
        b'X' | b'x' => 10,
        b if b.is_ascii_digit() => u32::from(b - b'0'),
        _ => return false,
    };

    sum % 11 == 0
}

/// Weights alternate 1,3 over the first twelve digits; the check digit is
/// `(10 − sum mod 10) mod 10`.
pub fn validate_isbn13(identifier: &str) -> bool {
    let bytes = identifier.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let sum: u32 = bytes[..12]
        .iter()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    let check = (10 - sum % 10) % 10;

    check == u32::from(bytes[12] - b'0')
}
