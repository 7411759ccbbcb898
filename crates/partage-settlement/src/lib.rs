//! `generate_settlement_plan`: a two-pass greedy minimum-transaction plan,
//! honoring each debtor's preferred-creditor routing before falling back to
//! plain greedy matching (§4.6).

use partage_balance::Balance;
use partage_core::money::{from_cents, to_cents};
use partage_core::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EPSILON_CENTS: i64 = 1; // 0.01 in default-currency cents.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub transactions: Vec<Transaction>,
    pub total_transactions: usize,
}

struct Party {
    id: MemberId,
    remaining_cents: i64,
}

/// Greedy minimum-transaction settlement plan. `preferences` maps a debtor
/// to their ordered list of preferred creditors.
pub fn generate_settlement_plan(
    balances: &BTreeMap<MemberId, Balance>,
    preferences: &BTreeMap<MemberId, Vec<MemberId>>,
) -> SettlementPlan {
    let mut creditors: BTreeMap<MemberId, i64> = BTreeMap::new();
    let mut debtors: Vec<Party> = Vec::new();

    for (id, balance) in balances {
        let cents = to_cents(balance.net_balance);
        if cents > EPSILON_CENTS {
            creditors.insert(id.clone(), cents);
        } else if cents < -EPSILON_CENTS {
            debtors.push(Party { id: id.clone(), remaining_cents: -cents });
        }
    }

    let mut transactions: Vec<Transaction> = Vec::new();

    // Pass 1: preferred routing, preferred debtors sorted by debt ascending.
    let mut preferred_debtors: Vec<usize> =
        debtors.iter().enumerate().filter(|(_, d)| preferences.contains_key(&d.id)).map(|(i, _)| i).collect();
    preferred_debtors.sort_by_key(|&i| debtors[i].remaining_cents);

    for i in preferred_debtors {
        let debtor_id = debtors[i].id.clone();
        let Some(preferred) = preferences.get(&debtor_id) else { continue };
        for creditor_id in preferred {
            if debtors[i].remaining_cents <= EPSILON_CENTS {
                break;
            }
            let Some(credit_remaining) = creditors.get_mut(creditor_id) else { continue };
            if *credit_remaining <= EPSILON_CENTS {
                continue;
            }
            let amount_cents = debtors[i].remaining_cents.min(*credit_remaining);
            transactions.push(Transaction { from: debtor_id.clone(), to: creditor_id.clone(), amount: from_cents(amount_cents) });
            debtors[i].remaining_cents -= amount_cents;
            *credit_remaining -= amount_cents;
        }
    }

    // Pass 2: plain greedy over whatever debt/credit remains, largest first.
    let mut remaining_debtors: Vec<&mut Party> = debtors.iter_mut().filter(|d| d.remaining_cents > EPSILON_CENTS).collect();
    remaining_debtors.sort_by(|a, b| b.remaining_cents.cmp(&a.remaining_cents));

    let mut remaining_creditors: Vec<(MemberId, i64)> =
        creditors.into_iter().filter(|(_, cents)| *cents > EPSILON_CENTS).collect();
    remaining_creditors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut debtor_iter = remaining_debtors.into_iter();
    let mut creditor_iter = remaining_creditors.into_iter();

    let mut current_debtor = debtor_iter.next();
    let mut current_creditor = creditor_iter.next();

    while let (Some(debtor), Some((creditor_id, creditor_cents))) = (current_debtor.as_deref_mut(), current_creditor.as_mut()) {
        if debtor.remaining_cents <= EPSILON_CENTS {
            current_debtor = debtor_iter.next();
            continue;
        }
        if *creditor_cents <= EPSILON_CENTS {
            current_creditor = creditor_iter.next();
            continue;
        }
        let amount_cents = debtor.remaining_cents.min(*creditor_cents);
        transactions.push(Transaction { from: debtor.id.clone(), to: creditor_id.clone(), amount: from_cents(amount_cents) });
        debtor.remaining_cents -= amount_cents;
        *creditor_cents -= amount_cents;
    }

    let total_transactions = transactions.len();
    SettlementPlan { transactions, total_transactions }
}
