//! Activity configuration: schema checks, record storage and the
//! save/validate/publish state transitions.

pub mod repository;
pub mod schema;
pub mod store;

pub use repository::{ActivityRepository, InMemoryActivityRepository};
pub use schema::SchemaRules;
pub use store::ActivityConfigStore;
