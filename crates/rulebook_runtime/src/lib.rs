//! Working-memory persistence and the command-line tool for Rulebook.
//!
//! This crate provides:
//! - [`Snapshot`] - Captured templates, facts, and globals
//! - `MessagePack` encoding of snapshots to bytes and files

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod snapshot;

pub use snapshot::{
    SNAPSHOT_VERSION, Snapshot, from_bytes, load_from_file, read_file, save_to_file, to_bytes,
};
