use std::collections::BTreeMap;

use super::merge::EntryExtent;
use super::references::{DatasetReferences, References};

/// Rewrite per-entry references into indices of the merged dataset table.
///
/// Entries are walked in merge order; each entry's indices are shifted by the total
/// width of the entries merged before it. Every name in `names` gets one list per
/// sample, empty where the sample never mentions it.
pub fn unify_references(
    local: &DatasetReferences,
    extents: &[Vec<EntryExtent>],
    names: &[String],
) -> References {
    let mut unified: BTreeMap<String, Vec<Vec<usize>>> = names
        .iter()
        .map(|name| (name.clone(), vec![Vec::new(); extents.len()]))
        .collect();

    let mut offset = 0;
    for (j, (sample_refs, sample_extents)) in local.iter().zip(extents).enumerate() {
        for (reference, extent) in sample_refs.iter().zip(sample_extents) {
            for (name, indices) in reference {
                if let Some(samples) = unified.get_mut(name) {
                    samples[j].extend(indices.iter().map(|index| index + offset));
                }
            }
            offset += extent.columns;
        }
    }

    References::new(unified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::references::EntryReferences;

    fn reference(pairs: &[(&str, &[usize])]) -> EntryReferences {
        pairs
            .iter()
            .map(|(name, indices)| (name.to_string(), indices.to_vec()))
            .collect()
    }

    fn extent(columns: usize) -> EntryExtent {
        EntryExtent { columns, rows: 1 }
    }

    #[test]
    fn test_offsets_follow_merge_order() {
        let local = vec![
            vec![
                reference(&[("x", &[0]), ("calc", &[3, 4])]),
                reference(&[("x", &[1]), ("calc", &[2, 3])]),
                reference(&[("sum", &[0])]),
            ],
            vec![reference(&[("x", &[0]), ("calc", &[2, 3])])],
        ];
        // widths include the spacer columns injected before merging
        let extents = vec![vec![extent(6), extent(5), extent(2)], vec![extent(4)]];
        let names = vec!["x".to_string(), "calc".to_string(), "sum".to_string()];

        let unified = unify_references(&local, &extents, &names);

        assert_eq!(unified.get("x").unwrap(), &[vec![0, 7], vec![13]]);
        assert_eq!(unified.get("calc").unwrap(), &[vec![3, 4, 8, 9], vec![15, 16]]);
        assert_eq!(unified.get("sum").unwrap(), &[vec![11], vec![]]);
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let local = vec![vec![reference(&[("extra", &[0])])]];
        let unified = unify_references(&local, &[vec![extent(1)]], &["x".to_string()]);
        assert_eq!(unified.get("x").unwrap(), &[Vec::<usize>::new()]);
        assert!(unified.get("extra").is_none());
    }
}
