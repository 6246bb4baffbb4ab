pub mod collection;
pub mod db;
pub mod io;

pub use db::DexDb;

pub use collection::{CatchRecord, CollectionStore, ReleaseOutcome};
