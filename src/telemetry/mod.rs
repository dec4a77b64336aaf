//! # Telemetry Module
//!
//! Journals every uplink handed to the radio as JSONL with rotation.
//!
//! This module handles:
//! - Recording the raw payload, its layout and the decoded values
//! - Formatting as JSONL (JSON Lines)
//! - Writing to rotating journal files (max N records per file)
//! - Retaining only the last M files

pub mod journal;

pub use journal::{JournalRecord, UplinkJournal};
