//! Target profiles: named bindings from a consumer to a tokenizer encoding.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use tens_canonical::ValidationError;
use tens_codec::BYTE_ENCODING;

use crate::errors::MaterializeError;

const ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,63}$";

fn check(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let re = Regex::new(ID_PATTERN).expect("invalid regex");
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::PatternMismatch {
            field,
            value: value.to_string(),
            pattern: ID_PATTERN,
        })
    }
}

/// Validated target profile id.
///
/// The pattern keeps ids usable as path components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

impl ProfileId {
    /// Parses a profile id.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        check("profile_id", &value)?;
        Ok(Self(value))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ProfileId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProfileId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProfileId> for String {
    fn from(value: ProfileId) -> Self {
        value.0
    }
}

/// Profile id → encoding name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTable {
    profiles: BTreeMap<ProfileId, String>,
}

impl ProfileTable {
    /// Builds a table, validating ids and encoding names.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ValidationError> {
        let mut profiles = BTreeMap::new();
        for (profile, encoding) in map {
            check("encoding_name", encoding)?;
            profiles.insert(ProfileId::parse(profile.as_str())?, encoding.clone());
        }
        Ok(Self { profiles })
    }

    /// Resolves a profile to its id and encoding name.
    pub fn resolve(&self, profile: &str) -> Result<(ProfileId, &str), MaterializeError> {
        self.profiles
            .get_key_value(profile)
            .map(|(id, encoding)| (id.clone(), encoding.as_str()))
            .ok_or_else(|| MaterializeError::UnknownProfile {
                profile: profile.to_string(),
                known: self.ids(),
            })
    }

    /// Configured profile ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.profiles.keys().map(|id| id.to_string()).collect()
    }
}

/// Default profiles: `bytes` → `bytes`.
pub fn default_profiles() -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert(BYTE_ENCODING.to_string(), BYTE_ENCODING.to_string());
    map
}
