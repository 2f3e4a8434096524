//! GTFS-Sometimes service change records.
//!
//! Field names follow the JSON feed so adapters can decode straight into
//! these types.

use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Table {
    Stops,
    Routes,
    Trips,
    StopTimes,
    Shapes,
    Transfers,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceChangeType {
    Add,
    Alter,
    Delete,
}

/// Either a single `date` or an inclusive `from`..`to` range.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DateDescriptor {
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateDescriptor {
    pub fn single(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn range(from: NaiveDate, to: Option<NaiveDate>) -> Self {
        Self {
            from: Some(from),
            to,
            ..Self::default()
        }
    }
}

/// Identifies an existing entity by its bare feed ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EntityDescriptor {
    pub agency_id: Option<String>,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
    pub stop_id: Option<String>,
    pub stop_sequence: Option<u32>,
    pub shape_id: Option<String>,
    pub service_id: Option<String>,
}

impl EntityDescriptor {
    pub fn stop_time(trip_id: impl Into<String>, stop_id: impl Into<String>) -> Self {
        Self {
            trip_id: Some(trip_id.into()),
            stop_id: Some(stop_id.into()),
            ..Self::default()
        }
    }
}

/// Column values of an added or altered row. Which fields are meaningful
/// depends on the change's table.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldDescriptor {
    // stop_times
    pub trip_id: Option<String>,
    pub stop_id: Option<String>,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub stop_sequence: Option<u32>,
    pub shape_dist_traveled: Option<f64>,

    // trips
    pub route_id: Option<String>,
    pub service_id: Option<String>,
    pub trip_headsign: Option<String>,
    pub direction_id: Option<String>,
    pub block_id: Option<String>,

    // stops
    pub stop_name: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,

    // shapes
    pub shape_id: Option<String>,
    pub shape_pt_lat: Option<f64>,
    pub shape_pt_lon: Option<f64>,
    pub shape_pt_sequence: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ServiceChange {
    pub table: Table,
    #[serde(rename = "service_change_type")]
    pub change_type: ServiceChangeType,
    #[serde(default, rename = "affected_entity")]
    pub affected_entities: Vec<EntityDescriptor>,
    #[serde(default, rename = "affected_field")]
    pub affected_fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub affected_dates: Vec<DateDescriptor>,
}

impl ServiceChange {
    pub fn new(table: Table, change_type: ServiceChangeType) -> Self {
        Self {
            table,
            change_type,
            affected_entities: Vec::new(),
            affected_fields: Vec::new(),
            affected_dates: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.affected_entities.push(entity);
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.affected_fields.push(field);
        self
    }

    pub fn with_date(mut self, date: DateDescriptor) -> Self {
        self.affected_dates.push(date);
        self
    }
}

/// GTFS-Sometimes feed envelope.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceChangeFeed {
    pub timestamp: i64,
    pub service_changes: Vec<ServiceChange>,
}
