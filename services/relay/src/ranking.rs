//! Team balance ranking
//!
//! Pure derivation from a mirror snapshot: value descending, ties broken by
//! name ascending so the order never depends on map internals.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use types::leaderboard::TeamBalance;
use types::numeric::Amount;

/// Rank every entry of `snapshot`
pub fn compute(snapshot: &BTreeMap<String, Amount>) -> Vec<TeamBalance> {
    let mut ranked: Vec<TeamBalance> = snapshot
        .iter()
        .map(|(name, balance)| TeamBalance {
            name: name.clone(),
            balance: balance.clone(),
        })
        .collect();
    ranked.sort_by(rank_order);
    ranked
}

fn rank_order(a: &TeamBalance, b: &TeamBalance) -> Ordering {
    b.balance
        .total_cmp(&a.balance)
        .then_with(|| a.name.cmp(&b.name))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_ranking_sorted_permutation(entries in prop::collection::btree_map("[a-e]{1,3}", -500i64..500, 0..32)) {
            let snap: BTreeMap<String, Amount> =
                entries.into_iter().map(|(k, v)| (k, Amount::from(v))).collect();
            let ranked = compute(&snap);

            prop_assert_eq!(ranked.len(), snap.len());
            for pair in ranked.windows(2) {
                prop_assert_ne!(rank_order(&pair[0], &pair[1]), Ordering::Greater);
            }
            for entry in &ranked {
                prop_assert_eq!(snap.get(&entry.name), Some(&entry.balance));
            }
        }
    }
}
