//! Relay sync manager: pushes/pulls CRDT updates, queues offline pushes for
//! retry, and folds live updates into derived state (§4.9).

pub mod backoff;
pub mod manager;
pub mod relay;

pub use backoff::BackoffPolicy;
pub use manager::{SyncManager, SyncState};
pub use relay::{GroupSummary, InvitationRecord, JoinRequestEnvelope, JoinRequestStatus, RelayClient, UpdateEnvelope};
