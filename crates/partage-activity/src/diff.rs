//! Field-level diff between two versions of an entry, used by
//! `entry_modified` activities.

use partage_entries::Entry;
use std::collections::BTreeMap;

/// Diff the content fields of `prev` and `current`, skipping bookkeeping
/// fields that always change between chain versions (`id`, `version`,
/// `previousVersionId`, and the modified/deleted-by/at trail).
pub fn diff_entries(prev: &Entry, current: &Entry) -> BTreeMap<String, (serde_json::Value, serde_json::Value)> {
    let prev_value = serde_json::to_value(prev).unwrap_or(serde_json::Value::Null);
    let current_value = serde_json::to_value(current).unwrap_or(serde_json::Value::Null);

    const IGNORED_FIELDS: &[&str] = &[
        "id",
        "version",
        "previous_version_id",
        "created_at",
        "created_by",
        "modified_at",
        "modified_by",
        "deleted_at",
        "deleted_by",
        "status",
    ];

    let mut changes = BTreeMap::new();
    if let (Some(prev_obj), Some(current_obj)) = (prev_value.as_object(), current_value.as_object()) {
        let mut fields: Vec<&String> = prev_obj.keys().chain(current_obj.keys()).collect();
        fields.sort();
        fields.dedup();

        for field in fields {
            if IGNORED_FIELDS.contains(&field.as_str()) {
                continue;
            }
            let prev_field = prev_obj.get(field).cloned().unwrap_or(serde_json::Value::Null);
            let current_field = current_obj.get(field).cloned().unwrap_or(serde_json::Value::Null);
            if prev_field != current_field {
                changes.insert(field.clone(), (prev_field, current_field));
            }
        }
    }
    changes
}
