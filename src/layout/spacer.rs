use crate::data::model::{Column, Dataset};
use crate::source::Separation;

/// Append blank columns: `separation.entry` after every entry but the last of its
/// sample, `separation.sample` after the last one. Spacers carry no references.
pub fn inject_spacers(dataset: Dataset, separation: Separation) -> Dataset {
    dataset
        .into_iter()
        .map(|sample| {
            let last = sample.len().saturating_sub(1);
            sample
                .into_iter()
                .enumerate()
                .map(|(k, mut entry)| {
                    let count = if k == last {
                        separation.sample
                    } else {
                        separation.entry
                    };
                    let rows = entry.rows();
                    for _ in 0..count {
                        entry.push(Column::blank(rows));
                    }
                    entry
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Table, Value};

    fn entry(width: usize) -> Table {
        Table::new((0..width).map(|_| Column::from_f64([1.0, 2.0])).collect())
    }

    #[test]
    fn test_entry_and_sample_separation() {
        let dataset = vec![vec![entry(3), entry(2)], vec![entry(1)]];
        let separation = Separation { entry: 1, sample: 2 };
        let dataset = inject_spacers(dataset, separation);

        assert_eq!(dataset[0][0].width(), 4);
        assert_eq!(dataset[0][1].width(), 4);
        assert_eq!(dataset[1][0].width(), 3);
        assert!(dataset[0][0].column(3).values.iter().all(|v| *v == Value::Null));
        assert_eq!(dataset[0][0].column(3).len(), 2);
    }
}
