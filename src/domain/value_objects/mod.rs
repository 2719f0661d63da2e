//! Value Objects for store sync

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a record in the remote platform's id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(i64);

impl RemoteId {
    /// Remote platforms use `0` for "no reference".
    pub fn new(value: i64) -> Option<Self> {
        if value > 0 { Some(Self(value)) } else { None }
    }
    pub fn value(&self) -> i64 { self.0 }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// URL slug: lowercase alphanumeric words joined by single dashes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn from_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut dash = false;
        for c in name.trim().chars() {
            if c.is_alphanumeric() {
                out.extend(c.to_lowercase());
                dash = false;
            } else if !dash && !out.is_empty() {
                out.push('-');
                dash = true;
            }
        }
        while out.ends_with('-') { out.pop(); }
        Self(out)
    }

    /// Keeps a remote slug when present, otherwise derives one from the name.
    pub fn or_from_name(slug: Option<&str>, name: &str) -> Self {
        match slug.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Self(s.to_string()),
            None => Self::from_name(name),
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Parses the string amounts remote platforms send ("19.99", "", "0").
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let value = value.trim();
    if value.is_empty() { return None; }
    Decimal::from_str(value).ok().map(|d| d.normalize())
}

/// Formats an amount the way remote platforms expect it back.
pub fn format_amount(value: Option<Decimal>) -> String {
    value.map(|d| d.normalize().to_string()).unwrap_or_default()
}

/// Empty or whitespace-only text becomes `None`.
pub fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}
