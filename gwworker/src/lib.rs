//! The reference backend worker: a small single-tenant data store driven
//! over stdin/stdout line-delimited JSON. See spec.md §4.6 for the wire
//! contract this crate implements and §3's `WorkerSlot` for how `gwserver`
//! spawns and talks to it. The storage engine here is not part of that
//! contract -- spec.md §1 is explicit that a worker may store data however
//! it likes, so long as it answers one line per request line.

pub mod protocol;
pub mod store;
