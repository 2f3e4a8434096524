//! Type-safe, efficient identifiers for transit entities.
//!
//! Every graph entity is keyed by an [`AgencyAndId`]: the agency namespace plus
//! the agency-local id. Both halves use `Arc<str>` for cheap cloning.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::models::types::TransitError;

/// Separator used by the string form `"{agency}_{id}"`.
pub const ID_SEPARATOR: char = '_';

/// Composite id of a graph entity.
#[derive(Clone, Debug, PartialOrd, Ord)]
pub struct AgencyAndId {
    agency_id: Arc<str>,
    id: Arc<str>,
}

impl AgencyAndId {
    pub fn new(agency_id: impl AsRef<str>, id: impl AsRef<str>) -> Self {
        Self {
            agency_id: agency_id.as_ref().into(),
            id: id.as_ref().into(),
        }
    }

    pub fn agency_id(&self) -> &str {
        &self.agency_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parse `"{agency}_{id}"`, splitting on the first separator.
    ///
    /// Returns `None` when the string carries no separator.
    pub fn parse(value: &str) -> Option<Self> {
        let (agency_id, id) = value.split_once(ID_SEPARATOR)?;
        Some(Self::new(agency_id, id))
    }

    /// Same local id under another agency.
    pub fn with_agency(&self, agency_id: impl AsRef<str>) -> Self {
        Self {
            agency_id: agency_id.as_ref().into(),
            id: self.id.clone(),
        }
    }
}

impl PartialEq for AgencyAndId {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.agency_id, &other.agency_id) || self.agency_id == other.agency_id)
            && (Arc::ptr_eq(&self.id, &other.id) || self.id == other.id)
    }
}

impl Eq for AgencyAndId {}

impl Hash for AgencyAndId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.agency_id.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for AgencyAndId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.agency_id, ID_SEPARATOR, self.id)
    }
}

impl FromStr for AgencyAndId {
    type Err = TransitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| TransitError::InvalidId(s.to_owned()))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AgencyAndId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for AgencyAndId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_equality() {
        let id1 = AgencyAndId::new("1", "stop_123");
        let id2 = AgencyAndId::new("1", "stop_123");
        let id3 = id1.clone();

        assert_eq!(id1, id2);
        assert_eq!(id1, id3);
        assert!(Arc::ptr_eq(&id1.id, &id3.id)); // Clone shares Arc
        assert_ne!(id1, AgencyAndId::new("2", "stop_123"));
    }

    #[test]
    fn test_identifier_hash() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(AgencyAndId::new("MTA", "test"), 42);

        assert_eq!(map.get(&AgencyAndId::new("MTA", "test")), Some(&42));
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let id: AgencyAndId = "CA_G8-Weekday-096000_MISC_545".parse().unwrap();
        assert_eq!(id.agency_id(), "CA");
        assert_eq!(id.id(), "G8-Weekday-096000_MISC_545");
        assert_eq!(id.to_string(), "CA_G8-Weekday-096000_MISC_545");
    }

    #[test]
    fn test_parse_without_separator() {
        assert!(AgencyAndId::parse("R10").is_none());
        assert!("R10".parse::<AgencyAndId>().is_err());
    }

    #[test]
    fn test_with_agency() {
        let id = AgencyAndId::new("1", "tripA").with_agency("2");
        assert_eq!(id, AgencyAndId::new("2", "tripA"));
    }
}
