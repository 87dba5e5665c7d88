//! Bid record loading and normalization.
//!
//! This crate handles:
//! - Scoped reads of raw tables (multi-record market CSV, plain CSV, memory)
//! - Participant classification lookup
//! - Numeric coercion of band values (unparseable values become missing)
//! - Price/quantity loading, filtering and joining with diagnostics

pub mod loader;
pub mod parse;
pub mod participants;
pub mod source;

pub use loader::{load_bids, BidLoader, JoinDiagnostics, Joined, LoadDiagnostics, Loaded, LoadedBids};
pub use participants::{ParticipantInfo, ParticipantTable};
pub use source::{AemoCsvSource, MemorySource, PlainCsvSource, RawTable, TableSource};
