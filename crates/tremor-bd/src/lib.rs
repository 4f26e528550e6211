//! # tremor-bd
//!
//! Persistence for the canonical pair database.
//!
//! This crate provides:
//! - `PairsHeader`: canonical pairs, their geometry arrays and tolerances
//! - `GreenDatabase`: the keyed group of per-entry raw tensors and `t0`
//! - an exclusive writer lock and atomic JSON replacement
//!
//! Only the coordinator opens a database read-write. Workers open it
//! read-only and never write.
//!
//! ## Data model
//!
//! ```text
//! pairs.json (atomic replace)
//!     │  canonical keys + tolerances
//! tdata_dict.jsonl (append-only, last write wins)
//!     │  "<i>_t0" / "<i>_tdata"
//! GreenDatabase (offset index built on open)
//! ```

pub mod database;
pub mod error;
pub mod jsonl;
pub mod lock;
pub mod pairs;

pub use database::{AccessMode, GROUP_FILE, GreenDatabase, GroupRecord, t0_key, tdata_key};
pub use error::DatabaseError;
pub use jsonl::{read_json, write_json_atomic};
pub use lock::{DatabaseLockGuard, database_lock_path};
pub use pairs::{
    PAIRS_FILE, PAIRS_SCHEMA, PairsHeader, read_pairs, scenario_digest, write_pairs,
};
