//! The plaintext entry shapes that live inside entry ciphertext.

use partage_core::{EntryId, MemberId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitType {
    Shares,
    Exact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payer {
    pub member_id: MemberId,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub member_id: MemberId,
    pub split_type: SplitType,
    pub shares: Option<u32>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseFields {
    pub description: String,
    pub category: String,
    pub payers: Vec<Payer>,
    pub beneficiaries: Vec<Beneficiary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFields {
    pub from: MemberId,
    pub to: MemberId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    Expense(ExpenseFields),
    Transfer(TransferFields),
}

/// The full plaintext entry, as it exists buried inside ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub group_id: String,
    pub kind: EntryKind,
    pub version: u32,
    pub created_at: i64,
    pub created_by: MemberId,
    pub status: EntryStatus,
    pub previous_version_id: Option<EntryId>,
    pub modified_at: Option<i64>,
    pub modified_by: Option<MemberId>,
    pub deleted_at: Option<i64>,
    pub deleted_by: Option<MemberId>,
    pub deletion_reason: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub default_currency_amount: Option<f64>,
    pub date: i64,
    pub notes: Option<String>,
    pub key_version: u32,
}
