// ── List reconciliation ──
//
// Union-by-id merge used for "load more" and background refreshes, plus the
// small list edits applied after confirmed mutations.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::model::Identifiable;

/// Merge `incoming` into `current`.
///
/// Items present on both sides are replaced in place by the incoming
/// version, unless both carry a modification time and the incoming one is
/// strictly older. Incoming-only items are appended in incoming order;
/// current-only items are kept. Output ids are unique.
pub fn merge_lists<T>(current: &[T], incoming: Vec<T>) -> Vec<T>
where
    T: Identifiable + Clone,
{
    if incoming.is_empty() {
        return current.to_vec();
    }

    let mut merged: IndexMap<T::Id, T> = current
        .iter()
        .map(|item| (item.id(), item.clone()))
        .collect();

    for item in incoming {
        match merged.entry(item.id()) {
            Entry::Occupied(mut slot) => {
                let regresses = matches!(
                    (slot.get().modified_at(), item.modified_at()),
                    (Some(kept), Some(new)) if new < kept
                );
                if !regresses {
                    slot.insert(item);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
        }
    }

    merged.into_values().collect()
}

/// Put `item` at the front, dropping any older copy with the same id.
pub fn prepend<T>(current: &[T], item: T) -> Vec<T>
where
    T: Identifiable + Clone,
{
    let id = item.id();
    std::iter::once(item)
        .chain(current.iter().filter(|other| other.id() != id).cloned())
        .collect()
}

/// Replace the item with `item`'s id in place. Unknown ids leave the list
/// unchanged.
pub fn replace_by_id<T>(current: &[T], item: &T) -> Vec<T>
where
    T: Identifiable + Clone,
{
    let id = item.id();
    current
        .iter()
        .map(|other| {
            if other.id() == id {
                item.clone()
            } else {
                other.clone()
            }
        })
        .collect()
}

pub fn remove_by_id<T>(current: &[T], id: &T::Id) -> Vec<T>
where
    T: Identifiable + Clone,
{
    current
        .iter()
        .filter(|other| other.id() != *id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        label: &'static str,
        modified: Option<DateTime<Utc>>,
    }

    impl Identifiable for Item {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn modified_at(&self) -> Option<DateTime<Utc>> {
            self.modified
        }
    }

    fn item(id: u32, label: &'static str) -> Item {
        Item {
            id,
            label,
            modified: None,
        }
    }

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 6, 15, hour, 0, 0).single()
    }

    #[test]
    fn merging_a_list_with_itself_is_identity() {
        let list = vec![item(1, "a"), item(2, "b"), item(3, "c")];
        assert_eq!(merge_lists(&list, list.clone()), list);
    }

    #[test]
    fn disjoint_lists_are_concatenated() {
        let current = vec![item(1, "a"), item(2, "b")];
        let incoming = vec![item(3, "c"), item(4, "d")];
        let ids: Vec<u32> = merge_lists(&current, incoming).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn overlap_takes_incoming_values_in_place() {
        let current = vec![item(1, "old"), item(2, "b")];
        let incoming = vec![item(3, "c"), item(1, "new")];
        assert_eq!(
            merge_lists(&current, incoming),
            vec![item(1, "new"), item(2, "b"), item(3, "c")]
        );
    }

    #[test]
    fn empty_incoming_keeps_current() {
        let current = vec![item(1, "a")];
        assert_eq!(merge_lists(&current, Vec::new()), current);
    }

    #[test]
    fn older_incoming_version_does_not_regress() {
        let fresh = Item {
            id: 1,
            label: "confirmed",
            modified: at(12),
        };
        let stale = Item {
            id: 1,
            label: "stale",
            modified: at(11),
        };
        assert_eq!(merge_lists(&[fresh.clone()], vec![stale]), vec![fresh]);
    }

    #[test]
    fn newer_incoming_version_wins() {
        let old = Item {
            id: 1,
            label: "old",
            modified: at(11),
        };
        let new = Item {
            id: 1,
            label: "new",
            modified: at(12),
        };
        assert_eq!(merge_lists(&[old], vec![new.clone()]), vec![new]);
    }

    #[test]
    fn prepend_dedupes() {
        let current = vec![item(1, "a"), item(2, "b")];
        let ids: Vec<u32> = prepend(&current, item(2, "b2")).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn replace_and_remove_by_id() {
        let current = vec![item(1, "a"), item(2, "b")];
        assert_eq!(
            replace_by_id(&current, &item(2, "B")),
            vec![item(1, "a"), item(2, "B")]
        );
        assert_eq!(remove_by_id(&current, &1), vec![item(2, "b")]);
        assert_eq!(remove_by_id(&current, &9), current);
    }
}
