//! # Repository Module
//!
//! Typed access to the tables behind [`crate::Database`].
//!
//! ## Available Repositories
//!
//! - [`DocumentRepository`] - one keyed JSON collection per document type
//! - [`SettingsRepository`] - the flat settings map
//! - [`KvRepository`] - named slots outside the ledger (session)
//!
//! Snapshots live in [`crate::backup`].

pub mod documents;
pub mod kv;
pub mod settings;

pub use documents::DocumentRepository;
pub use kv::KvRepository;
pub use settings::SettingsRepository;
