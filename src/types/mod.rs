//! Core types for the codebase.

pub mod registry_type;
pub mod link;
pub mod code;
pub mod registry;

pub use registry_type::RegistryType;
pub use link::LinkTo;
pub use code::{
    Code, CodeStatus, Deprecation, UseDate, Reference,
    fill_if_empty, STATUS_VALID, STATUS_DEPRECATED,
};
pub use registry::Registry;
