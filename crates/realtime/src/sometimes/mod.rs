//! GTFS-Sometimes schedule patching.

pub mod changesets;
pub mod patcher;
pub mod records;
pub mod time;

pub use changesets::{ModifyTrip, ShapeChangeSet, StopChange, StopChangeSet, TripChangeSet};
pub use patcher::{
    date_is_applicable, validate_service_change, ChangeOperation, PatchReport,
    ScheduleChangePatcher,
};
pub use records::{
    DateDescriptor, EntityDescriptor, FieldDescriptor, ServiceChange, ServiceChangeFeed,
    ServiceChangeType, Table,
};
pub use time::{FixedTimeService, SystemTimeService, TimeService};
