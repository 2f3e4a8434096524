//! Rider-facing descriptive text, kept apart from structural graph data.

use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TripNarrative {
    pub headsign: Option<Arc<str>>,
    pub route_short_name: Option<Arc<str>>,
    pub trip_short_name: Option<Arc<str>>,
}

impl TripNarrative {
    pub fn with_headsign(headsign: impl AsRef<str>) -> Self {
        Self {
            headsign: Some(headsign.as_ref().into()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopNarrative {
    pub name: Arc<str>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteCollectionNarrative {
    pub short_name: Option<Arc<str>>,
    pub long_name: Option<Arc<str>>,
    pub color: Option<Arc<str>>,
}
