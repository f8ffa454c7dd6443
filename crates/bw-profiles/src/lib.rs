//! blockwise Profiles
//!
//! Stateful side of the blocker: filter profiles backed by list files,
//! their updates over HTTP, and the registry combining them.
//!
//! # Modules
//!
//! - `profile`: One list with lazily built rules
//! - `updater`: Download, validation and storage of list updates
//! - `registry`: Profile discovery and combined queries
//! - `config`: Registry configuration
//! - `diagnostics`: Reporting of background failures

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod profile;
pub mod registry;
pub mod updater;

pub use config::RegistryConfig;
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink, LogSink, MemorySink};
pub use error::{ConfigError, ProfileError, RegistryError, UpdateError};
pub use profile::{FilterProfile, ProfileInfo};
pub use registry::BlockingRegistry;
pub use updater::{Fetch, FetchResponse, HttpFetcher, RefreshOutcome, UpdateFetcher};
