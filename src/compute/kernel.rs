use wide::f64x4;

const LANES: usize = 4;

/// Divides every element of `values` by `divisor`.
///
/// Dense matrices are column-major, so one column is a contiguous slice and
/// normalizing a column is a single call.
#[inline]
pub fn divide_scalar(values: &mut [f64], divisor: f64) {
    let d = f64x4::splat(divisor);
    let mut chunks = values.chunks_exact_mut(LANES);
    for chunk in &mut chunks {
        let v = f64x4::from([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(v / d).to_array());
    }
    for x in chunks.into_remainder() {
        *x /= divisor;
    }
}

/// `values[i] /= divisors[i]`. Slices must have equal length.
#[inline]
pub fn divide_elementwise(values: &mut [f64], divisors: &[f64]) {
    debug_assert_eq!(values.len(), divisors.len());
    let mut chunks = values.chunks_exact_mut(LANES);
    let mut div_chunks = divisors.chunks_exact(LANES);
    for (chunk, div) in (&mut chunks).zip(&mut div_chunks) {
        let v = f64x4::from([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let d = f64x4::from([div[0], div[1], div[2], div[3]]);
        chunk.copy_from_slice(&(v / d).to_array());
    }
    for (x, d) in chunks.into_remainder().iter_mut().zip(div_chunks.remainder()) {
        *x /= *d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(4)]
    #[case(9)]
    fn test_divide_scalar_matches_scalar_loop(#[case] len: usize) {
        let mut v: Vec<f64> = (0..len).map(|i| i as f64 * 1.5).collect();
        let expected: Vec<f64> = v.iter().map(|x| x / 3.0).collect();
        divide_scalar(&mut v, 3.0);
        assert_eq!(v, expected);
    }

    #[test]
    fn test_divide_elementwise_with_tail() {
        let mut v = vec![2.0, 4.0, 9.0, 8.0, 10.0, 1.0];
        divide_elementwise(&mut v, &[2.0, 2.0, 3.0, 4.0, 5.0, 4.0]);
        assert_eq!(v, vec![1.0, 2.0, 3.0, 2.0, 2.0, 0.25]);
    }
}
