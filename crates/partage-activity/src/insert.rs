//! Maintaining the activity feed sorted by `timestamp` descending, with
//! ties broken by activity id so ordering is deterministic across replicas.

use crate::types::Activity;

fn order(a: &Activity, b: &Activity) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id))
}

/// Insert `activity` into an already-sorted (descending) feed in O(log n)
/// time via binary search for the insertion point.
pub fn insert_activity(activities: &mut Vec<Activity>, activity: Activity) {
    let index = activities.partition_point(|existing| order(existing, &activity) != std::cmp::Ordering::Greater);
    activities.insert(index, activity);
}

pub fn sort_activities(activities: &mut [Activity]) {
    activities.sort_by(order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use partage_core::MemberId;
    use partage_core::EntryId;
    use crate::types::ActivityKind;

    fn activity(id: &str, timestamp: i64) -> Activity {
        Activity {
            id: id.to_string(),
            timestamp,
            actor_id: MemberId::from_public_key_hash("a"),
            kind: ActivityKind::EntryAdded { entry_id: EntryId::from("e") },
        }
    }

    #[test]
    fn insertion_keeps_descending_timestamp_order() {
        let mut activities = vec![activity("a", 30), activity("b", 20), activity("c", 10)];
        insert_activity(&mut activities, activity("d", 25));
        let timestamps: Vec<i64> = activities.iter().map(|a| a.timestamp).collect();
        assert_eq!(timestamps, vec![30, 25, 20, 10]);
    }

    #[test]
    fn ties_at_same_timestamp_break_by_id() {
        let mut activities = vec![activity("b", 10)];
        insert_activity(&mut activities, activity("a", 10));
        let ids: Vec<&str> = activities.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
