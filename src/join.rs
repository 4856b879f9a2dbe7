//! Cross-strategy joins keyed on the movie id.
//!
//! Records without an id never match anything and are left out of both the
//! join and the union.

use crate::record::MovieRecord;
use std::collections::HashSet;

/// Inner join on `id`, rows taken from the first set.
pub fn join_by_id(sets: &[Vec<MovieRecord>]) -> Vec<MovieRecord> {
    join_by_id_preferring(sets, 0)
}

/// Inner join on `id` with rows taken from `sets[preferred]`, in that set's
/// order. Only the first occurrence of each id is kept.
pub fn join_by_id_preferring(sets: &[Vec<MovieRecord>], preferred: usize) -> Vec<MovieRecord> {
    let Some(base) = sets.get(preferred) else {
        return Vec::new();
    };

    let others: Vec<HashSet<i64>> = sets
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != preferred)
        .map(|(_, set)| set.iter().filter_map(|r| r.id).collect())
        .collect();

    let mut emitted = HashSet::new();
    base.iter()
        .filter(|record| {
            record.id.is_some_and(|id| {
                others.iter().all(|ids| ids.contains(&id)) && emitted.insert(id)
            })
        })
        .cloned()
        .collect()
}

/// Every distinct id across all sets, first occurrence wins.
pub fn union_distinct(sets: &[Vec<MovieRecord>]) -> Vec<MovieRecord> {
    let mut seen = HashSet::new();
    sets.iter()
        .flatten()
        .filter(|record| record.id.is_some_and(|id| seen.insert(id)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{RawMovie, canonicalize};

    fn set(ids: &[Option<i64>], method: &str) -> Vec<MovieRecord> {
        ids.iter()
            .map(|&id| {
                canonicalize(
                    RawMovie {
                        id,
                        ..RawMovie::default()
                    },
                    method,
                )
            })
            .collect()
    }

    fn ids(records: &[MovieRecord]) -> Vec<i64> {
        records.iter().filter_map(|r| r.id).collect()
    }

    #[test]
    fn three_way_join_keeps_only_shared_ids() {
        let sets = vec![
            set(&[Some(1), Some(2), Some(3)], "API"),
            set(&[Some(2), Some(3), Some(4)], "BS4"),
            set(&[Some(3), Some(4), Some(5)], "Selenium"),
        ];
        let joined = join_by_id(&sets);
        assert_eq!(ids(&joined), vec![3]);
        assert_eq!(joined[0].method, "API");
    }

    #[test]
    fn preferred_source_supplies_rows() {
        let sets = vec![
            set(&[Some(1), Some(2)], "API"),
            set(&[Some(2), Some(1)], "BS4"),
        ];
        let joined = join_by_id_preferring(&sets, 1);
        assert_eq!(ids(&joined), vec![2, 1]);
        assert!(joined.iter().all(|r| r.method == "BS4"));
    }

    #[test]
    fn join_is_bounded_by_smallest_set() {
        let sets = vec![
            set(&[Some(1), Some(2), Some(3), Some(4)], "API"),
            set(&[Some(4), Some(1)], "BS4"),
        ];
        let joined = join_by_id(&sets);
        assert!(joined.len() <= 2);
        assert_eq!(ids(&joined), vec![1, 4]);
    }

    #[test]
    fn missing_ids_and_duplicates_are_dropped() {
        let sets = vec![
            set(&[None, Some(1), Some(1)], "API"),
            set(&[None, Some(1)], "BS4"),
        ];
        assert_eq!(ids(&join_by_id(&sets)), vec![1]);
        assert_eq!(join_by_id(&sets).len(), 1);

        let union = union_distinct(&sets);
        assert_eq!(union.len(), 1);
        assert_eq!(union[0].method, "API");
    }

    #[test]
    fn union_keeps_first_seen() {
        let sets = vec![
            set(&[Some(1), Some(2)], "API"),
            set(&[Some(3), Some(2)], "BS4"),
        ];
        let union = union_distinct(&sets);
        assert_eq!(ids(&union), vec![1, 2, 3]);
        assert_eq!(union[1].method, "API");
    }

    #[test]
    fn empty_inputs() {
        assert!(join_by_id(&[]).is_empty());
        assert!(join_by_id(&[set(&[Some(1)], "API"), Vec::new()]).is_empty());
        assert!(join_by_id_preferring(&[set(&[Some(1)], "API")], 4).is_empty());
        assert!(union_distinct(&[]).is_empty());
    }
}
