//! Read-side filters over an already-materialized activity feed.

use crate::types::Activity;
use partage_core::{EntryId, MemberId};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub types: Option<HashSet<&'static str>>,
    pub actors: Option<HashSet<MemberId>>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub entry_id: Option<EntryId>,
    pub member_id: Option<MemberId>,
}

impl ActivityFilter {
    fn matches(&self, activity: &Activity) -> bool {
        if let Some(types) = &self.types {
            if !types.contains(activity.kind.type_name()) {
                return false;
            }
        }
        if let Some(actors) = &self.actors {
            if !actors.contains(&activity.actor_id) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if activity.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if activity.timestamp > until {
                return false;
            }
        }
        if let Some(entry_id) = &self.entry_id {
            if activity.kind.entry_id() != Some(entry_id) {
                return false;
            }
        }
        if let Some(member_id) = &self.member_id {
            if activity.kind.member_id() != Some(member_id) {
                return false;
            }
        }
        true
    }
}

pub fn filter_activities<'a>(activities: &'a [Activity], filter: &ActivityFilter) -> Vec<&'a Activity> {
    activities.iter().filter(|a| filter.matches(a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityKind;

    fn activity(entry_id: &str, timestamp: i64) -> Activity {
        Activity {
            id: format!("act:{}", entry_id),
            timestamp,
            actor_id: MemberId::from_public_key_hash("a"),
            kind: ActivityKind::EntryAdded { entry_id: EntryId::from(entry_id) },
        }
    }

    #[test]
    fn date_range_filter_excludes_outside_window() {
        let activities = vec![activity("e1", 5), activity("e2", 15), activity("e3", 25)];
        let filter = ActivityFilter { since: Some(10), until: Some(20), ..Default::default() };
        let filtered = filter_activities(&activities, &filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].kind.entry_id(), Some(&EntryId::from("e2")));
    }

    #[test]
    fn entry_id_filter_matches_only_that_entry() {
        let activities = vec![activity("e1", 1), activity("e2", 2)];
        let filter = ActivityFilter { entry_id: Some(EntryId::from("e2")), ..Default::default() };
        let filtered = filter_activities(&activities, &filter);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn type_filter_matches_discriminant() {
        let activities = vec![activity("e1", 1)];
        let mut types = HashSet::new();
        types.insert("entry_added");
        let filter = ActivityFilter { types: Some(types), ..Default::default() };
        assert_eq!(filter_activities(&activities, &filter).len(), 1);

        let mut other_types = HashSet::new();
        other_types.insert("entry_deleted");
        let filter = ActivityFilter { types: Some(other_types), ..Default::default() };
        assert!(filter_activities(&activities, &filter).is_empty());
    }
}
