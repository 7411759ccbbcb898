//! `calculate_splits`: dividing an expense's beneficiary total into
//! per-member cent amounts with no rounding loss.

use partage_core::money::to_cents;
use partage_core::MemberId;
use partage_entries::{Beneficiary, SplitType};
use std::collections::BTreeMap;

/// Split `amount_cents` across `beneficiaries`, resolving each member id to
/// its canonical form. Exact-amount beneficiaries are assigned directly;
/// the remainder is divided by shares with any leftover cents handed out,
/// one at a time, to the lexicographically-first canonical ids until
/// exhausted. The returned totals always sum to exactly `amount_cents`.
pub fn calculate_splits(
    beneficiaries: &[Beneficiary],
    amount_cents: i64,
    canonical_id_map: &BTreeMap<MemberId, MemberId>,
) -> BTreeMap<MemberId, i64> {
    let resolve = |id: &MemberId| canonical_id_map.get(id).cloned().unwrap_or_else(|| id.clone());
    let mut splits: BTreeMap<MemberId, i64> = BTreeMap::new();

    let mut exact_total_cents: i64 = 0;
    let mut share_beneficiaries: Vec<(MemberId, u32)> = Vec::new();

    for beneficiary in beneficiaries {
        let canonical = resolve(&beneficiary.member_id);
        match beneficiary.split_type {
            SplitType::Exact => {
                let cents = to_cents(beneficiary.amount.unwrap_or(0.0));
                exact_total_cents += cents;
                *splits.entry(canonical).or_insert(0) += cents;
            }
            SplitType::Shares => {
                share_beneficiaries.push((canonical, beneficiary.shares.unwrap_or(0)));
            }
        }
    }

    let remaining_cents = amount_cents - exact_total_cents;
    let total_shares: u64 = share_beneficiaries.iter().map(|(_, shares)| *shares as u64).sum();

    if total_shares > 0 && remaining_cents != 0 {
        // `floor`, not truncation: with an exact-beneficiary overshoot
        // (negative `remaining_cents`), Rust's `/` truncates toward zero
        // while the spec's `floor` rounds toward negative infinity.
        // `div_euclid`/`rem_euclid` agree with `floor` here because
        // `total_shares` is always positive.
        let per_share = remaining_cents.div_euclid(total_shares as i64);
        let mut remainder = remaining_cents.rem_euclid(total_shares as i64);

        // Sorted by canonical id lexicographically, per the data model, so
        // the remainder distribution is identical across replicas.
        share_beneficiaries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        for (member_id, shares) in share_beneficiaries {
            let mut cents = per_share * shares as i64;
            if remainder != 0 {
                let extra = remainder.min(shares as i64);
                cents += extra;
                remainder -= extra;
            }
            *splits.entry(member_id).or_insert(0) += cents;
        }
    }

    splits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares(member: &str, shares: u32) -> Beneficiary {
        Beneficiary { member_id: MemberId::from_public_key_hash(member), split_type: SplitType::Shares, shares: Some(shares), amount: None }
    }

    fn exact(member: &str, amount: f64) -> Beneficiary {
        Beneficiary { member_id: MemberId::from_public_key_hash(member), split_type: SplitType::Exact, shares: None, amount: Some(amount) }
    }

    #[test]
    fn two_way_even_split_of_100() {
        let beneficiaries = vec![shares("a", 1), shares("b", 1)];
        let splits = calculate_splits(&beneficiaries, 10_000, &BTreeMap::new());
        assert_eq!(splits[&MemberId::from_public_key_hash("a")], 5_000);
        assert_eq!(splits[&MemberId::from_public_key_hash("b")], 5_000);
    }

    #[test]
    fn three_way_split_of_100_sums_exactly_with_remainder_to_first() {
        let beneficiaries = vec![shares("alice", 1), shares("bob", 1), shares("charlie", 1)];
        let splits = calculate_splits(&beneficiaries, 10_000, &BTreeMap::new());
        assert_eq!(splits[&MemberId::from_public_key_hash("alice")], 3_334);
        assert_eq!(splits[&MemberId::from_public_key_hash("bob")], 3_333);
        assert_eq!(splits[&MemberId::from_public_key_hash("charlie")], 3_333);
        let total: i64 = splits.values().sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn mixed_exact_and_shares_sums_to_total() {
        let beneficiaries = vec![exact("alice", 20.0), shares("bob", 1), shares("charlie", 1)];
        let splits = calculate_splits(&beneficiaries, 10_000, &BTreeMap::new());
        assert_eq!(splits[&MemberId::from_public_key_hash("alice")], 2_000);
        let total: i64 = splits.values().sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn exact_overshoot_floors_toward_negative_infinity() {
        // Exact beneficiaries (20.07) exceed the entry total (20.00), so the
        // shares pool must absorb remaining_cents = -7 over 2 shares:
        // floor(-7/2) = -4 per share, not truncation's -3.
        let beneficiaries = vec![exact("alice", 20.07), shares("bob", 1), shares("charlie", 1)];
        let splits = calculate_splits(&beneficiaries, 2_000, &BTreeMap::new());
        let total: i64 = splits.values().sum();
        assert_eq!(total, 2_000);
        assert_eq!(splits[&MemberId::from_public_key_hash("bob")], -3);
        assert_eq!(splits[&MemberId::from_public_key_hash("charlie")], -4);
    }

    #[test]
    fn replaced_member_contributions_land_on_canonical_id() {
        let mut canonical = BTreeMap::new();
        canonical.insert(MemberId::from_public_key_hash("old"), MemberId::from_public_key_hash("new"));
        let beneficiaries = vec![shares("old", 1)];
        let splits = calculate_splits(&beneficiaries, 5_000, &canonical);
        assert_eq!(splits[&MemberId::from_public_key_hash("new")], 5_000);
        assert!(!splits.contains_key(&MemberId::from_public_key_hash("old")));
    }
}
