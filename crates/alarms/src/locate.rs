use models::{Fragment, Resource};
use std::collections::BTreeMap;

/// Find all resources of `type_` within the fragment, keyed on logical ID.
/// An empty result means there's nothing to alarm on.
pub fn find<'a>(fragment: &'a Fragment, type_: &str) -> BTreeMap<&'a str, &'a Resource> {
    let found: BTreeMap<_, _> = fragment
        .resources
        .iter()
        .filter(|(_, resource)| resource.type_ == type_)
        .map(|(logical_id, resource)| (logical_id.as_str(), resource))
        .collect();

    if found.is_empty() {
        tracing::debug!(
            resource_type = type_,
            "no matching resources found, skipped creating alarms..."
        );
    } else {
        tracing::debug!(
            resource_type = type_,
            count = found.len(),
            logical_ids = ?found.keys().collect::<Vec<_>>(),
            "found matching resources",
        );
    }
    found
}

/// Find the first resource of `type_`, in logical ID order.
/// Used for resources which are expected to be unique within a fragment.
pub fn find_first<'a>(fragment: &'a Fragment, type_: &str) -> Option<(&'a str, &'a Resource)> {
    let mut found = fragment
        .resources
        .iter()
        .filter(|(_, resource)| resource.type_ == type_);

    let first = found.next();

    if let Some((logical_id, _)) = first {
        let others = found.count();
        if others != 0 {
            tracing::warn!(
                resource_type = type_,
                %logical_id,
                others,
                "found more than one resource, using the first"
            );
        }
    } else {
        tracing::debug!(resource_type = type_, "no matching resource found");
    }
    first.map(|(logical_id, resource)| (logical_id.as_str(), resource))
}
