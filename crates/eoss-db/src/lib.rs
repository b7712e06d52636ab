//! Metadata Driver: a thin transactional wrapper over the object catalog.

mod driver;
mod migrations;
mod models;

pub use driver::{MetadataDriver, Session, StatsRow};
pub use migrations::ensure_schema;
pub use models::{Row, State};
