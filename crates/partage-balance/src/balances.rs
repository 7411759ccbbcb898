//! `calculate_balances`: net paid/owed per canonical member from the active
//! entry set.

use crate::splits::calculate_splits;
use partage_core::money::{from_cents, to_cents};
use partage_core::MemberId;
use partage_entries::{Entry, EntryKind, EntryStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub total_paid: f64,
    pub total_owed: f64,
    pub net_balance: f64,
}

fn resolve(id: &MemberId, canonical_id_map: &BTreeMap<MemberId, MemberId>) -> MemberId {
    canonical_id_map.get(id).cloned().unwrap_or_else(|| id.clone())
}

/// Signed balance delta applied by a single entry: kept separate from
/// mutating `Balance` in place so the incremental state manager (§4.8) can
/// apply and reverse the same delta for a superseded entry.
#[derive(Debug, Clone, Default)]
pub struct BalanceDelta(pub BTreeMap<MemberId, (i64, i64)>);

impl BalanceDelta {
    fn add_paid(&mut self, member: MemberId, cents: i64) {
        let entry = self.0.entry(member).or_insert((0, 0));
        entry.0 += cents;
    }

    fn add_owed(&mut self, member: MemberId, cents: i64) {
        let entry = self.0.entry(member).or_insert((0, 0));
        entry.1 += cents;
    }
}

/// Compute the `(paid, owed)` cent deltas a single active entry contributes,
/// already resolved to canonical member ids.
pub fn entry_delta(entry: &Entry, canonical_id_map: &BTreeMap<MemberId, MemberId>) -> BalanceDelta {
    let mut delta = BalanceDelta::default();
    let amount = entry.default_currency_amount.unwrap_or(entry.amount);
    let amount_cents = to_cents(amount);

    match &entry.kind {
        EntryKind::Expense(expense) => {
            let sum_native_payers: f64 = expense.payers.iter().map(|p| p.amount).sum();
            for payer in &expense.payers {
                let payer_default = if sum_native_payers != 0.0 { payer.amount * amount / sum_native_payers } else { 0.0 };
                delta.add_paid(resolve(&payer.member_id, canonical_id_map), to_cents(payer_default));
            }
            for (member, cents) in calculate_splits(&expense.beneficiaries, amount_cents, canonical_id_map) {
                delta.add_owed(member, cents);
            }
        }
        EntryKind::Transfer(transfer) => {
            delta.add_paid(resolve(&transfer.from, canonical_id_map), amount_cents);
            delta.add_owed(resolve(&transfer.to, canonical_id_map), amount_cents);
        }
    }

    delta
}

/// Apply (or, with `sign = -1`, reverse) a delta onto a balance map in
/// cents. The caller is responsible for converting to/from `f64` via
/// [`materialize_balances`] once all deltas for a recompute are folded in.
pub fn apply_delta(balances_cents: &mut BTreeMap<MemberId, (i64, i64)>, delta: &BalanceDelta, sign: i64) {
    for (member, (paid, owed)) in &delta.0 {
        let entry = balances_cents.entry(member.clone()).or_insert((0, 0));
        entry.0 += sign * paid;
        entry.1 += sign * owed;
    }
}

fn materialize_balances(balances_cents: BTreeMap<MemberId, (i64, i64)>) -> BTreeMap<MemberId, Balance> {
    balances_cents
        .into_iter()
        .map(|(member, (paid, owed))| {
            let total_paid = from_cents(paid);
            let total_owed = from_cents(owed);
            (member, Balance { total_paid, total_owed, net_balance: from_cents(paid - owed) })
        })
        .collect()
}

/// Full from-scratch recompute over every active entry, per §4.5.
pub fn calculate_balances(active_entries: &[Entry], canonical_id_map: &BTreeMap<MemberId, MemberId>) -> BTreeMap<MemberId, Balance> {
    let mut cents: BTreeMap<MemberId, (i64, i64)> = BTreeMap::new();
    for entry in active_entries {
        if entry.status != EntryStatus::Active {
            continue;
        }
        let delta = entry_delta(entry, canonical_id_map);
        apply_delta(&mut cents, &delta, 1);
    }
    materialize_balances(cents)
}

pub fn is_balance_settled(balance: &Balance) -> bool {
    balance.net_balance.abs() < 0.01
}

#[cfg(test)]
mod tests {
    use super::*;
    use partage_core::EntryId;
    use partage_entries::{Beneficiary, ExpenseFields, Payer, SplitType, TransferFields};

    fn expense(payer: &str, paid: f64, beneficiaries: Vec<Beneficiary>) -> Entry {
        Entry {
            id: EntryId::new(),
            group_id: "g1".into(),
            kind: EntryKind::Expense(ExpenseFields {
                description: "dinner".into(),
                category: "food".into(),
                payers: vec![Payer { member_id: MemberId::from_public_key_hash(payer), amount: paid }],
                beneficiaries,
            }),
            version: 1,
            created_at: 0,
            created_by: MemberId::from_public_key_hash(payer),
            status: EntryStatus::Active,
            previous_version_id: None,
            modified_at: None,
            modified_by: None,
            deleted_at: None,
            deleted_by: None,
            deletion_reason: None,
            amount: paid,
            currency: "USD".into(),
            default_currency_amount: None,
            date: 0,
            notes: None,
            key_version: 1,
        }
    }

    fn share(member: &str, shares: u32) -> Beneficiary {
        Beneficiary { member_id: MemberId::from_public_key_hash(member), split_type: SplitType::Shares, shares: Some(shares), amount: None }
    }

    #[test]
    fn simple_dinner_matches_the_seed_scenario() {
        let entries = vec![expense("a", 100.0, vec![share("a", 1), share("b", 1)])];
        let balances = calculate_balances(&entries, &BTreeMap::new());

        let a = balances[&MemberId::from_public_key_hash("a")];
        let b = balances[&MemberId::from_public_key_hash("b")];
        assert_eq!(a.total_paid, 100.0);
        assert_eq!(a.total_owed, 50.0);
        assert_eq!(a.net_balance, 50.0);
        assert_eq!(b.total_paid, 0.0);
        assert_eq!(b.total_owed, 50.0);
        assert_eq!(b.net_balance, -50.0);
    }

    #[test]
    fn exchange_rate_expense_uses_default_currency_amount() {
        let mut entry = expense("a", 100.0, vec![share("a", 1), share("b", 1)]);
        entry.default_currency_amount = Some(110.0);
        if let EntryKind::Expense(expense_fields) = &mut entry.kind {
            expense_fields.payers[0].amount = 100.0;
        }
        entry.currency = "EUR".into();

        let balances = calculate_balances(&[entry], &BTreeMap::new());
        let a = balances[&MemberId::from_public_key_hash("a")];
        assert!((a.total_paid - 110.0).abs() < 0.01);
        assert!((a.total_owed - 55.0).abs() < 0.01);
    }

    #[test]
    fn deleted_entries_do_not_contribute() {
        let mut entry = expense("a", 100.0, vec![share("a", 1), share("b", 1)]);
        entry.status = EntryStatus::Deleted;
        let balances = calculate_balances(&[entry], &BTreeMap::new());
        assert!(balances.is_empty());
    }

    #[test]
    fn transfer_moves_balance_from_sender_to_recipient() {
        let entry = Entry {
            id: EntryId::new(),
            group_id: "g1".into(),
            kind: EntryKind::Transfer(TransferFields { from: MemberId::from_public_key_hash("a"), to: MemberId::from_public_key_hash("b") }),
            version: 1,
            created_at: 0,
            created_by: MemberId::from_public_key_hash("a"),
            status: EntryStatus::Active,
            previous_version_id: None,
            modified_at: None,
            modified_by: None,
            deleted_at: None,
            deleted_by: None,
            deletion_reason: None,
            amount: 25.0,
            currency: "USD".into(),
            default_currency_amount: None,
            date: 0,
            notes: None,
            key_version: 1,
        };
        let balances = calculate_balances(&[entry], &BTreeMap::new());
        assert_eq!(balances[&MemberId::from_public_key_hash("a")].total_paid, 25.0);
        assert_eq!(balances[&MemberId::from_public_key_hash("b")].total_owed, 25.0);
    }

    #[test]
    fn balance_conservation_holds_across_active_entries() {
        let entries = vec![
            expense("a", 100.0, vec![share("a", 1), share("b", 1), share("c", 1)]),
            expense("b", 40.0, vec![share("a", 1), share("b", 1)]),
        ];
        let balances = calculate_balances(&entries, &BTreeMap::new());
        let sum_paid: f64 = balances.values().map(|b| b.total_paid).sum();
        let sum_owed: f64 = balances.values().map(|b| b.total_owed).sum();
        assert!((sum_paid - sum_owed).abs() < 0.001);
        assert!((sum_paid - 140.0).abs() < 0.001);
    }
}
