//! Core domain types for marathon-group.

pub mod app;
pub mod group;
pub mod volume;

pub use app::App;
pub use group::Group;
pub use volume::ExternalVolumeRef;
