//! Supercell-style entity tags.
//!
//! A tag identifies a remote player, clan or band. User input is normalized
//! before use: leading `#` characters are stripped, letters are uppercased and the
//! letter `O` is read as the digit `0`. Only characters from
//! [`TAG_CHARACTERS`] are accepted afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every character a valid tag may contain.
pub const TAG_CHARACTERS: &str = "0289PYLQGRJCUV";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error(
        "The tag you have entered is not valid.\nList of invalid characters in your tag: {}\nList of valid characters for tags: {}",
        join_chars(invalid),
        join_chars(&TAG_CHARACTERS.chars().collect::<Vec<_>>())
    )]
    Invalid { tag: String, invalid: Vec<char> },

    #[error("The tag you have entered is empty")]
    Empty,
}

fn join_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Apply the normalization rule without validating the result.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)` for any input.
pub fn normalize(raw: &str) -> String {
    raw.trim_start_matches('#').to_uppercase().replace('O', "0")
}

/// A normalized, validated tag.
///
/// The only way to build one is through [`Tag::parse`] (or deserialization,
/// which goes through the same check), so holding a `Tag` means it is valid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    pub fn parse(raw: &str) -> Result<Self, TagError> {
        let tag = normalize(raw);
        if tag.is_empty() {
            return Err(TagError::Empty);
        }

        let invalid: Vec<char> = tag
            .chars()
            .filter(|c| !TAG_CHARACTERS.contains(*c))
            .collect();
        if !invalid.is_empty() {
            return Err(TagError::Invalid { tag, invalid });
        }

        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tag as players usually write it, with a leading `#`.
    pub fn hashed(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let tag = Self::parse(&value)?;
        // Stored tags must already be in normal form.
        if tag.0 != value {
            return Err(TagError::Invalid {
                invalid: value.chars().filter(|c| !TAG_CHARACTERS.contains(*c)).collect(),
                tag: value,
            });
        }
        Ok(tag)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl std::str::FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
