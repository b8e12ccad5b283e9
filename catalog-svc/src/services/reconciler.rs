//! Specification reconciliation
//!
//! A category's `specifications` list is the canonical key set for every
//! product in it. Reconciling fixes a product's data to exactly those keys,
//! in the category's order, keeping supplied values for known keys.

use crate::models::SpecificationData;

/// Merge supplied product values onto a category's canonical keys.
///
/// Keys missing from `supplied` get an empty value; supplied keys the
/// category does not know are dropped. `supplied` is only read.
pub fn reconcile(category_specs: &[String], supplied: &SpecificationData) -> SpecificationData {
    category_specs
        .iter()
        .map(|key| {
            let value = supplied.get(key).cloned().unwrap_or_default();
            (key.clone(), value)
        })
        .collect()
}
