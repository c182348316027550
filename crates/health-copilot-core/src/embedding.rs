//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helpers for normalization and inner products.
//!
//! Concrete providers (OpenAI, Ollama, fastembed, hashing) live in the
//! `health-copilot` app crate.

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-MiniLM-L6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
}

/// Scale `vec` to unit length in place.
///
/// Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((dot(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dot_of_unit_vectors_is_bounded() {
        let mut a = vec![1.0, 2.0, 3.0];
        let mut b = vec![-2.0, 0.5, 1.0];
        l2_normalize(&mut a);
        l2_normalize(&mut b);
        let d = dot(&a, &b);
        assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&d));
        assert!((dot(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot_opposite() {
        assert!((dot(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }
}
