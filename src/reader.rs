//! Read-only columnar feature tables consumed by training and inference.
//!
//! A [`FeatureReader`] is an instances × attributes view with one designated
//! class column. The packed backings store pixel-derived values as fixed-width
//! unsigned integers: [`ByteReader`] for 8-bit data, [`ShortReader`] for
//! 16-bit data. Readers are immutable after construction and safe to share
//! read-only across worker threads.

/// Read-only tabular access over instances × attributes.
///
/// Index arguments are a caller contract: out-of-range instance or attribute
/// indices are a programming error, not a recoverable condition.
pub trait FeatureReader {
    /// Number of instances (rows).
    fn num_instances(&self) -> usize;

    /// Number of attribute columns, including the class column.
    fn num_features(&self) -> usize;

    /// Index of the class column.
    fn class_index(&self) -> usize;

    /// Number of distinct classes (highest class label + 1).
    fn num_classes(&self) -> usize;

    /// Value of one attribute for one instance.
    fn value(&self, instance: usize, attribute: usize) -> f64;

    /// Class label of one instance.
    fn class_value(&self, instance: usize) -> usize;

    /// Instance weight. Backings without weights report 1.0.
    fn weight(&self, _instance: usize) -> f64 {
        1.0
    }

    /// Return `instance_indices` reordered ascending by the attribute's value.
    ///
    /// The sort is stable: instances with equal attribute values keep their
    /// order from `instance_indices`. Split-point search relies on this for
    /// reproducible thresholds at repeated values.
    fn sorted_indices(&self, attribute: usize, instance_indices: &[usize]) -> Vec<usize> {
        let mut sorted = instance_indices.to_vec();
        sorted.sort_by(|&a, &b| self.value(a, attribute).total_cmp(&self.value(b, attribute)));
        sorted
    }
}

/// Highest label in a class column, plus one.
fn count_classes(class_column: &[usize]) -> usize {
    class_column.iter().max().map_or(0, |&max| max + 1)
}

/// Select the requested attribute columns and re-append the class column last.
///
/// The class index and any out-of-range request are dropped rather than
/// duplicated, so the class column appears exactly once, as the final column.
fn select_columns<T: Copy>(columns: &[Vec<T>], class_index: usize, indices: &[usize]) -> Vec<Vec<T>> {
    let mut selected: Vec<Vec<T>> = indices
        .iter()
        .filter(|&&index| index != class_index && index < columns.len())
        .map(|&index| columns[index].clone())
        .collect();
    selected.push(columns[class_index].clone());
    selected
}

/// Packed 8-bit columnar feature table.
///
/// Values are stored column-major as raw bytes and read back as unsigned
/// 0..=255.
#[derive(Debug, Clone)]
pub struct ByteReader {
    columns: Vec<Vec<u8>>,
    class_index: usize,
    class_column: Vec<usize>,
    num_classes: usize,
}

impl ByteReader {
    /// Create a reader over column-major 8-bit data.
    ///
    /// # Panics
    ///
    /// Panics when `columns` is empty, when columns have unequal lengths, or
    /// when `class_index` is out of range — all caller contract violations.
    #[must_use]
    pub fn new(columns: Vec<Vec<u8>>, class_index: usize) -> Self {
        assert!(!columns.is_empty(), "feature table must have at least one column");
        assert!(class_index < columns.len(), "class index {class_index} out of range");
        let num_instances = columns[0].len();
        assert!(
            columns.iter().all(|c| c.len() == num_instances),
            "all columns must have the same length"
        );

        let class_column: Vec<usize> = columns[class_index].iter().map(|&v| v as usize).collect();
        let num_classes = count_classes(&class_column);
        Self {
            columns,
            class_index,
            class_column,
            num_classes,
        }
    }

    /// Derive a reduced table over a subset or reordering of attributes.
    ///
    /// The class column is always the last column of the derived table.
    #[must_use]
    pub fn with_features(&self, indices: &[usize]) -> ByteReader {
        let selected = select_columns(&self.columns, self.class_index, indices);
        let class_index = selected.len() - 1;
        ByteReader::new(selected, class_index)
    }
}

impl FeatureReader for ByteReader {
    fn num_instances(&self) -> usize {
        self.class_column.len()
    }

    fn num_features(&self) -> usize {
        self.columns.len()
    }

    fn class_index(&self) -> usize {
        self.class_index
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn value(&self, instance: usize, attribute: usize) -> f64 {
        // u8 widens unsigned: 0..=255 by construction.
        f64::from(self.columns[attribute][instance])
    }

    fn class_value(&self, instance: usize) -> usize {
        self.class_column[instance]
    }

    fn sorted_indices(&self, attribute: usize, instance_indices: &[usize]) -> Vec<usize> {
        let column = &self.columns[attribute];
        let mut sorted = instance_indices.to_vec();
        sorted.sort_by_key(|&instance| column[instance]);
        sorted
    }
}

/// Packed 16-bit columnar feature table.
///
/// Values are stored column-major and read back as unsigned 0..=65535.
#[derive(Debug, Clone)]
pub struct ShortReader {
    columns: Vec<Vec<u16>>,
    class_index: usize,
    class_column: Vec<usize>,
    num_classes: usize,
}

impl ShortReader {
    /// Create a reader over column-major 16-bit data.
    ///
    /// # Panics
    ///
    /// Panics when `columns` is empty, when columns have unequal lengths, or
    /// when `class_index` is out of range — all caller contract violations.
    #[must_use]
    pub fn new(columns: Vec<Vec<u16>>, class_index: usize) -> Self {
        assert!(!columns.is_empty(), "feature table must have at least one column");
        assert!(class_index < columns.len(), "class index {class_index} out of range");
        let num_instances = columns[0].len();
        assert!(
            columns.iter().all(|c| c.len() == num_instances),
            "all columns must have the same length"
        );

        let class_column: Vec<usize> = columns[class_index].iter().map(|&v| v as usize).collect();
        let num_classes = count_classes(&class_column);
        Self {
            columns,
            class_index,
            class_column,
            num_classes,
        }
    }

    /// Derive a reduced table over a subset or reordering of attributes.
    ///
    /// The class column is always the last column of the derived table.
    #[must_use]
    pub fn with_features(&self, indices: &[usize]) -> ShortReader {
        let selected = select_columns(&self.columns, self.class_index, indices);
        let class_index = selected.len() - 1;
        ShortReader::new(selected, class_index)
    }
}

impl FeatureReader for ShortReader {
    fn num_instances(&self) -> usize {
        self.class_column.len()
    }

    fn num_features(&self) -> usize {
        self.columns.len()
    }

    fn class_index(&self) -> usize {
        self.class_index
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn value(&self, instance: usize, attribute: usize) -> f64 {
        // u16 widens unsigned: 0..=65535 by construction.
        f64::from(self.columns[attribute][instance])
    }

    fn class_value(&self, instance: usize) -> usize {
        self.class_column[instance]
    }

    fn sorted_indices(&self, attribute: usize, instance_indices: &[usize]) -> Vec<usize> {
        let column = &self.columns[attribute];
        let mut sorted = instance_indices.to_vec();
        sorted.sort_by_key(|&instance| column[instance]);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteReader, FeatureReader, ShortReader};

    fn byte_table() -> ByteReader {
        // Two attributes plus a class column.
        ByteReader::new(
            vec![vec![5, 3, 9, 1], vec![200, 255, 0, 128], vec![0, 1, 1, 0]],
            2,
        )
    }

    #[test]
    fn byte_values_read_unsigned() {
        let reader = byte_table();
        // 255 and 200 must not wrap negative.
        assert_eq!(reader.value(1, 1), 255.0);
        assert_eq!(reader.value(0, 1), 200.0);
    }

    #[test]
    fn short_values_read_unsigned() {
        let reader = ShortReader::new(vec![vec![65_535, 40_000, 0], vec![0, 1, 2]], 1);
        assert_eq!(reader.value(0, 0), 65_535.0);
        assert_eq!(reader.value(1, 0), 40_000.0);
    }

    #[test]
    fn class_values_and_counts() {
        let reader = byte_table();
        assert_eq!(reader.num_instances(), 4);
        assert_eq!(reader.num_features(), 3);
        assert_eq!(reader.class_index(), 2);
        assert_eq!(reader.num_classes(), 2);
        assert_eq!(reader.class_value(2), 1);
    }

    #[test]
    fn default_weight_is_one() {
        let reader = byte_table();
        assert_eq!(reader.weight(0), 1.0);
    }

    #[test]
    fn sorted_indices_ascending() {
        let reader = byte_table();
        let sorted = reader.sorted_indices(0, &[0, 1, 2, 3]);
        assert_eq!(sorted, vec![3, 1, 0, 2]);
    }

    #[test]
    fn sorted_indices_restricted_subset() {
        let reader = byte_table();
        let sorted = reader.sorted_indices(0, &[0, 2]);
        assert_eq!(sorted, vec![0, 2]);
    }

    #[test]
    fn sorted_indices_stable_on_ties() {
        let reader = ByteReader::new(vec![vec![7, 7, 7, 2], vec![0, 0, 1, 1]], 1);
        // Equal values keep the supplied order.
        assert_eq!(reader.sorted_indices(0, &[2, 0, 1, 3]), vec![3, 2, 0, 1]);
    }

    #[test]
    fn with_features_class_column_last() {
        let reader = byte_table();
        let reduced = reader.with_features(&[1]);
        assert_eq!(reduced.num_features(), 2);
        assert_eq!(reduced.class_index(), 1);
        assert_eq!(reduced.value(1, 0), 255.0);
        assert_eq!(reduced.class_value(1), 1);
    }

    #[test]
    fn with_features_drops_class_index_from_request() {
        let reader = byte_table();
        // Requesting the class column must not duplicate it.
        let reduced = reader.with_features(&[0, 2]);
        assert_eq!(reduced.num_features(), 2);
        assert_eq!(reduced.class_index(), 1);
        assert_eq!(reduced.value(0, 0), 5.0);
    }

    #[test]
    fn with_features_roundtrip_preserves_values() {
        let reader = byte_table();
        let reduced = reader.with_features(&[1, 0]);
        // Column 1 first, then column 0, then class.
        for instance in 0..reader.num_instances() {
            assert_eq!(reduced.value(instance, 0), reader.value(instance, 1));
            assert_eq!(reduced.value(instance, 1), reader.value(instance, 0));
            assert_eq!(reduced.class_value(instance), reader.class_value(instance));
        }
    }

    #[test]
    #[should_panic(expected = "class index")]
    fn class_index_out_of_range_panics() {
        let _ = ByteReader::new(vec![vec![1, 2]], 3);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn ragged_columns_panic() {
        let _ = ByteReader::new(vec![vec![1, 2], vec![1]], 0);
    }
}
