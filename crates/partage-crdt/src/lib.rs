//! The encrypted CRDT ledger: a per-group replicated operation log holding
//! entry rows, member events, and settlement preferences, with deterministic
//! convergence across replicas regardless of delivery order.

pub mod document;
pub mod op;

pub use document::CrdtDocument;
pub use op::{CrdtOp, CrdtOpId, CrdtPayload, EntryRow, EntryRowStatus, MemberEventRow};
