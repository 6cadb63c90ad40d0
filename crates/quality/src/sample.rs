/// Thin `sorted` to at most `max` items by an even stride.
///
/// Callers sort by id first, so the same input always yields the same
/// sample regardless of the order it arrived in.
pub(crate) fn even_stride<T: Copy>(sorted: &[T], max: usize) -> Vec<T> {
    let n = sorted.len();
    if n <= max {
        return sorted.to_vec();
    }
    (0..max).map(|i| sorted[i * n / max]).collect()
}

/// Cosine similarity in `f64`. Zero vectors score 0.
pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f64 {
    // identical inputs score exactly 1 regardless of rounding
    if a == b && a.iter().any(|v| *v != 0.0) {
        return 1.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na * nb).sqrt()).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_keeps_small_inputs_whole() {
        assert_eq!(even_stride(&[1, 2, 3], 5), vec![1, 2, 3]);
    }

    #[test]
    fn stride_spreads_over_input() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(even_stride(&items, 5), vec![0, 2, 4, 6, 8]);
        assert_eq!(even_stride(&items, 3), vec![0, 3, 6]);
    }

    #[test]
    fn cosine_cases() {
        let v = [0.6f32, 0.8];
        assert_eq!(cosine(&v, &v), 1.0);
        assert!((cosine(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-12);
        assert!((cosine(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-12);
        assert_eq!(cosine(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }
}
