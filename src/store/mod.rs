pub mod cached;
pub mod db;
mod files;
mod flags;
mod history;
pub mod models;
mod tables;

pub use cached::CachedStore;
pub use db::{Database, StoreError};
pub use files::FileUpdate;
pub use flags::{FlagOutcome, UnflagOutcome};
pub use tables::*;
