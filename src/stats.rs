//! Entropy and small-vector statistics over class-count contingency tables.

use std::sync::LazyLock;

/// The small deviation allowed in double comparisons.
pub const SMALL: f64 = 1e-6;

/// Cache size for the `x * ln(x)` table (exclusive upper bound).
const MAX_INT_FOR_CACHE: usize = 10_000;

/// Cached `n * ln(n)` for integer `n` in `0..MAX_INT_FOR_CACHE`.
///
/// Class-count tables are dominated by small integer weights, so the cache
/// services nearly every lookup during split search.
static INT_N_LOG_N_CACHE: LazyLock<Vec<f64>> = LazyLock::new(|| {
    (0..MAX_INT_FOR_CACHE)
        .map(|n| {
            let d = n as f64;
            if n == 0 { 0.0 } else { d * d.ln() }
        })
        .collect()
});

/// Test if `a` is equal to `b` within [`SMALL`].
#[must_use]
pub fn eq(a: f64, b: f64) -> bool {
    a == b || (a - b < SMALL && b - a < SMALL)
}

/// Test if `a` is greater than `b` by more than [`SMALL`].
#[must_use]
pub fn gr(a: f64, b: f64) -> bool {
    a - b > SMALL
}

/// Compute `x * ln(x)`, defined as 0.0 for `x <= 0`.
///
/// Integer arguments below 10 000 are served from a precomputed table.
#[must_use]
pub fn ln_func(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x < MAX_INT_FOR_CACHE as f64 {
        let n = x as usize;
        if n as f64 == x {
            return INT_N_LOG_N_CACHE[n];
        }
    }
    x * x.ln()
}

/// Sum the elements of a vector of doubles.
#[must_use]
pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Normalize the values in place by their sum.
///
/// # Panics
///
/// Panics when the sum is zero or NaN — callers must check with [`eq`]
/// against 0.0 first when a zero-sum vector is a legal state.
pub fn normalize(values: &mut [f64]) {
    let total = sum(values);
    assert!(!total.is_nan(), "cannot normalize: sum is NaN");
    assert!(total != 0.0, "cannot normalize: sum is zero");
    for v in values.iter_mut() {
        *v /= total;
    }
}

/// Return the index of the maximum element. The first maximum wins.
#[must_use]
pub fn max_index(values: &[f64]) -> usize {
    let mut maximum = 0.0;
    let mut index = 0;
    for (i, &v) in values.iter().enumerate() {
        if i == 0 || v > maximum {
            maximum = v;
            index = i;
        }
    }
    index
}

/// Entropy of the column totals of a contingency table, in bits.
///
/// This is the class entropy of the table before any split. Returns 0.0
/// for an all-zero table.
#[must_use]
pub fn entropy_over_columns(matrix: &[Vec<f64>]) -> f64 {
    let num_columns = matrix.first().map_or(0, Vec::len);
    let mut value = 0.0;
    let mut total = 0.0;

    for j in 0..num_columns {
        let column_sum: f64 = matrix.iter().map(|row| row[j]).sum();
        value -= ln_func(column_sum);
        total += column_sum;
    }
    if eq(total, 0.0) {
        0.0
    } else {
        (value + ln_func(total)) / (total * std::f64::consts::LN_2)
    }
}

/// Conditional entropy of the columns given the rows, in bits.
///
/// This is the weight-averaged class entropy of the split sides (one row
/// per side). Returns 0.0 for an all-zero table.
#[must_use]
pub fn entropy_conditioned_on_rows(matrix: &[Vec<f64>]) -> f64 {
    let mut value = 0.0;
    let mut total = 0.0;

    for row in matrix {
        let mut row_sum = 0.0;
        for &cell in row {
            value += ln_func(cell);
            row_sum += cell;
        }
        value -= ln_func(row_sum);
        total += row_sum;
    }
    if eq(total, 0.0) {
        0.0
    } else {
        -value / (total * std::f64::consts::LN_2)
    }
}
