//! The encrypted entry store: expenses and transfers layered over the CRDT
//! document's `entries` container, with group-key-version-aware encryption
//! and fallback decryption across historical key versions.

pub mod entry;
pub mod keyring;
pub mod store;

pub use entry::{Beneficiary, Entry, EntryKind, EntryStatus, ExpenseFields, Payer, SplitType, TransferFields};
pub use keyring::KeyRing;
pub use store::{
    create_entry, delete_entry, get_active_entries, get_all_entries, get_current_entries, get_entries_by_ids,
    get_entry, get_entry_ids, modify_entry, undelete_entry,
};
