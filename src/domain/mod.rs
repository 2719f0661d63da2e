//! Domain model: local records, stores, value objects and sync events.
pub mod aggregates;
pub mod events;
pub mod value_objects;
