/// Median of a non-empty slice, taken as the middle element after a partial
/// sort (the upper median for even lengths, matching the shift estimator used
/// when emitting chained overlaps).
pub fn median_i32(values: &mut [i32]) -> i32 {
    assert!(!values.is_empty(), "median of empty slice");
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable(mid);
    *m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        let mut v = vec![5, 1, 9];
        assert_eq!(median_i32(&mut v), 5);
    }

    #[test]
    fn test_median_even_takes_upper() {
        let mut v = vec![4, 1, 3, 2];
        assert_eq!(median_i32(&mut v), 3);
    }

    #[test]
    fn test_median_single() {
        let mut v = vec![-7];
        assert_eq!(median_i32(&mut v), -7);
    }
}
