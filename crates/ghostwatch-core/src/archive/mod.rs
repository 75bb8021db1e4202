/// Message archive: recently observed messages kept for revocation matching.
///
/// Memory-resident and intentionally lossy: bounded by capacity (least
/// recently stored goes first) and by a per-entry TTL. Entries are matched
/// at most once and evicted on match.
pub mod store;
pub mod types;

pub use store::MessageArchive;
pub use types::{ArchivedMedia, ArchivedMessage};
