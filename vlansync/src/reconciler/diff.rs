//! Three-way diff between the stored inventory and the device snapshot.

use std::collections::BTreeSet;

use crate::record::VlanRecord;

/// Store mutations that make the inventory match the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_create: Vec<VlanRecord>,
    pub to_update: Vec<VlanRecord>,
    pub to_delete: BTreeSet<u16>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of store operations in the plan.
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Compute the plan that turns `store` into `observed`.
///
/// Both inputs are sorted by `vlan_id` and walked with two cursors. The
/// device wins every conflict: updates and creates carry the observed values.
pub fn diff(store: &[VlanRecord], observed: &[VlanRecord]) -> ReconciliationPlan {
    let mut store: Vec<&VlanRecord> = store.iter().collect();
    let mut observed: Vec<&VlanRecord> = observed.iter().collect();
    store.sort_unstable_by_key(|r| r.vlan_id);
    observed.sort_unstable_by_key(|r| r.vlan_id);

    let mut plan = ReconciliationPlan::default();
    let (mut i, mut j) = (0, 0);

    while i < store.len() && j < observed.len() {
        let (stored, seen) = (store[i], observed[j]);
        match stored.vlan_id.cmp(&seen.vlan_id) {
            std::cmp::Ordering::Equal => {
                if !stored.same_fields(seen) {
                    plan.to_update.push(seen.clone());
                }
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                plan.to_delete.insert(stored.vlan_id);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                plan.to_create.push(seen.clone());
                j += 1;
            }
        }
    }

    plan.to_delete.extend(store[i..].iter().map(|r| r.vlan_id));
    plan.to_create.extend(observed[j..].iter().map(|r| (*r).clone()));

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn rec(id: u16, name: &str, desc: Option<&str>) -> VlanRecord {
        VlanRecord::new(id, name, desc)
    }

    /// What the store holds after a plan is applied to it.
    fn applied(store: &[VlanRecord], plan: &ReconciliationPlan) -> Vec<VlanRecord> {
        let mut rows: BTreeMap<u16, VlanRecord> =
            store.iter().map(|r| (r.vlan_id, r.clone())).collect();
        for r in plan.to_create.iter().chain(&plan.to_update) {
            rows.insert(r.vlan_id, r.clone());
        }
        for id in &plan.to_delete {
            rows.remove(id);
        }
        rows.into_values().collect()
    }

    #[test]
    fn test_changed_name_is_updated_from_device() {
        let plan = diff(&[rec(1, "v1", Some(""))], &[rec(1, "v1-new", Some(""))]);
        assert_eq!(plan.to_update, vec![rec(1, "v1-new", Some(""))]);
        assert!(plan.to_create.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_empty_store_creates_everything() {
        let plan = diff(&[], &[rec(5, "eng", None)]);
        assert_eq!(plan.to_create, vec![rec(5, "eng", None)]);
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_empty_device_deletes_everything() {
        let plan = diff(&[rec(7, "x", None)], &[]);
        assert_eq!(plan.to_delete, BTreeSet::from([7]));
        assert!(plan.to_create.is_empty());
        assert!(plan.to_update.is_empty());
    }

    #[test]
    fn test_overlapping_sets() {
        let store = [rec(1, "a", None), rec(2, "b", None)];
        let observed = [rec(2, "b", None), rec(3, "c", None)];
        let plan = diff(&store, &observed);
        assert_eq!(plan.to_create, vec![rec(3, "c", None)]);
        assert_eq!(plan.to_delete, BTreeSet::from([1]));
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_description_change_is_an_update() {
        let plan = diff(&[rec(4, "a", Some("old"))], &[rec(4, "a", None)]);
        assert_eq!(plan.to_update, vec![rec(4, "a", None)]);
    }

    #[test]
    fn test_partitions_by_key_class() {
        // A: store only, B: device only, C: both with different fields, D: both identical
        let store = [
            rec(10, "a10", None),
            rec(11, "a11", None),
            rec(30, "c30", None),
            rec(31, "c31", Some("x")),
            rec(40, "d40", None),
            rec(41, "d41", Some("same")),
        ];
        let observed = [
            rec(41, "d41", Some("same")),
            rec(31, "c31", Some("y")),
            rec(21, "b21", None),
            rec(40, "d40", None),
            rec(30, "c30-new", None),
            rec(20, "b20", Some("new")),
        ];

        let plan = diff(&store, &observed);
        assert_eq!(plan.to_delete, BTreeSet::from([10, 11]));
        assert_eq!(
            plan.to_create.iter().map(|r| r.vlan_id).collect::<Vec<_>>(),
            vec![20, 21]
        );
        assert_eq!(
            plan.to_update.iter().map(|r| r.vlan_id).collect::<Vec<_>>(),
            vec![30, 31]
        );
    }

    #[test]
    fn test_partitions_disjoint_and_cover_inputs() {
        let store = [rec(1, "a", None), rec(3, "c", None), rec(5, "e", None)];
        let observed = [rec(2, "b", None), rec(3, "c2", None), rec(5, "e", None), rec(6, "f", None)];
        let plan = diff(&store, &observed);

        let create: BTreeSet<u16> = plan.to_create.iter().map(|r| r.vlan_id).collect();
        let update: BTreeSet<u16> = plan.to_update.iter().map(|r| r.vlan_id).collect();
        assert!(create.is_disjoint(&update));
        assert!(create.is_disjoint(&plan.to_delete));
        assert!(update.is_disjoint(&plan.to_delete));

        // every key of either input is either in the plan or identical on both sides
        let touched: BTreeSet<u16> = create
            .union(&update)
            .chain(plan.to_delete.iter())
            .copied()
            .collect();
        assert_eq!(touched, BTreeSet::from([1, 2, 3, 6]));
    }

    #[test]
    fn test_applied_plan_is_idempotent() {
        let store = [rec(1, "a", None), rec(2, "b", Some("old")), rec(9, "z", None)];
        let observed = [rec(2, "b", None), rec(3, "c", None), rec(1, "a", None)];

        let plan = diff(&store, &observed);
        let after = applied(&store, &plan);

        let mut expected = observed.to_vec();
        expected.sort_by_key(|r| r.vlan_id);
        assert_eq!(after, expected);
        assert!(diff(&after, &observed).is_empty());
    }

    #[test]
    fn test_result_independent_of_input_order() {
        let store = [rec(3, "c", None), rec(1, "a", None), rec(2, "b", None)];
        let observed = [rec(4, "d", None), rec(2, "b2", None), rec(1, "a", None)];
        let mut store_rev = store.to_vec();
        store_rev.reverse();
        let mut observed_rev = observed.to_vec();
        observed_rev.reverse();

        assert_eq!(diff(&store, &observed), diff(&store_rev, &observed_rev));
    }
}
