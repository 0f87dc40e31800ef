//! # codebase-reconcile
//!
//! Reconciliation of vaccine code registries against CDC source feeds.
//!
//! The engine answers one question:
//!
//! > Given the current registries and today's feeds, what must change so that
//! > every code is up to date and every link is mutual?
//!
//! ## Core Contract
//!
//! 1. Fold each feed (NDC, vaccine group, CVX, CPT, VIS, MVX, trade name) into
//!    its registry without ever dropping curated content
//! 2. Close the link graph: every link has a reciprocal, no link dangles, no
//!    link is duplicated
//! 3. Write back exactly the registries that changed, sorted by value
//!
//! ## Architecture
//!
//! ```text
//! SourceFeeds → UpdateRun → close_cross_links → Codebase::persist
//!                  ↓                                  ↓
//!              Codebase  ←──── RegistryStore (XML files or memory)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same registries + same feeds + same processing date → identical files
//! - A second run over its own output changes nothing and saves nothing
//! - Registries are visited in [`RegistryType::ALL`] order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod text;
pub mod store;
pub mod codebase;
pub mod merge;
pub mod lifecycle;
pub mod crosslink;
pub mod ndc;
pub mod sources;
pub mod update;
pub mod config;
pub mod compile;
pub mod canonical;

// Re-exports
pub use types::{Code, CodeStatus, Deprecation, LinkTo, Reference, Registry, RegistryType, UseDate};
pub use types::{STATUS_DEPRECATED, STATUS_VALID};
pub use store::{RegistryStore, InMemoryRegistryStore, XmlFileStore, CodesetDocument, StoreError};
pub use codebase::Codebase;
pub use merge::{merge_fact, FactAttributes, MergeError, MergeOutcome, MergeTally};
pub use lifecycle::{ExpiryWindow, format_date, parse_as_of};
pub use crosslink::{close_cross_links, dedupe_links, CrossLinkReport, LinkStats};
pub use ndc::{
    link_units, reconcile_products, LinkerTable, NdcError, NdcLink, NdcProduct,
    PackageLevel, ProductIndex, UnitLinkStats,
};
pub use sources::{SourceError, SourceFeeds, SourcePaths};
pub use update::{verify_lot_number_patterns, PatternReport, UpdateError, UpdateReport, UpdateRun};
pub use config::{ConfigError, UpdateConfig};
pub use compile::{compile_codesets, CompileError, CompileReport};
pub use canonical::{codebase_fingerprint, registry_fingerprint, Fingerprint};
