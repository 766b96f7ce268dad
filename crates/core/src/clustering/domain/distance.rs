use std::fmt;
use std::str::FromStr;

/// A face embedding: a fixed-length feature vector.
pub type Embedding = Vec<f32>;

/// Distance metric used to compare embeddings.
///
/// Every metric is symmetric, non-negative and returns 0 for identical
/// vectors. The tolerance passed to the clustering engine is interpreted in
/// the units of the selected metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Straight-line distance, as used by dlib-style 128-d encodings.
    #[default]
    Euclidean,
    /// `1 - cosine similarity`, in `[0, 2]`.
    Cosine,
}

impl Metric {
    pub const ALL: &[Metric] = &[Metric::Euclidean, Metric::Cosine];

    /// Distance between two vectors of equal length.
    ///
    /// Callers are responsible for length checks; extra components of the
    /// longer slice are ignored.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            Metric::Euclidean => euclidean_distance(a, b),
            Metric::Cosine => cosine_distance(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Cosine => write!(f, "cosine"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "cosine" => Ok(Metric::Cosine),
            other => Err(format!(
                "Metric must be 'euclidean' or 'cosine', got '{other}'"
            )),
        }
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Zero vectors have no direction; they are treated as maximally distant
/// from everything except another zero vector.
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a * norm_b).sqrt();
    if denom < f64::EPSILON {
        return if norm_a < f64::EPSILON && norm_b < f64::EPSILON {
            0.0
        } else {
            1.0
        };
    }

    (1.0 - dot / denom).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Metric::Euclidean)]
    #[case(Metric::Cosine)]
    fn test_distance_to_self_is_zero(#[case] metric: Metric) {
        let v = vec![0.3, -0.2, 0.9];
        assert_relative_eq!(metric.distance(&v, &v), 0.0, epsilon = 1e-9);
    }

    #[rstest]
    #[case(Metric::Euclidean)]
    #[case(Metric::Cosine)]
    fn test_distance_is_symmetric(#[case] metric: Metric) {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, 0.5, 2.0];
        assert_relative_eq!(metric.distance(&a, &b), metric.distance(&b, &a));
    }

    #[test]
    fn test_euclidean_3_4_5() {
        assert_relative_eq!(Metric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }

    #[test]
    fn test_cosine_orthogonal_is_one() {
        assert_relative_eq!(Metric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]), 1.0);
    }

    #[test]
    fn test_cosine_opposite_is_two() {
        assert_relative_eq!(Metric::Cosine.distance(&[1.0, 0.0], &[-1.0, 0.0]), 2.0);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let d = Metric::Cosine.distance(&[1.0, 1.0], &[5.0, 5.0]);
        assert_relative_eq!(d, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_relative_eq!(Metric::Cosine.distance(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_relative_eq!(Metric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[rstest]
    #[case("euclidean", Metric::Euclidean)]
    #[case("L2", Metric::Euclidean)]
    #[case("Cosine", Metric::Cosine)]
    fn test_parse_metric(#[case] input: &str, #[case] expected: Metric) {
        assert_eq!(input.parse::<Metric>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_metric_fails() {
        assert!("manhattan".parse::<Metric>().is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for metric in Metric::ALL {
            assert_eq!(metric.to_string().parse::<Metric>().unwrap(), *metric);
        }
    }

    #[test]
    fn test_default_is_euclidean() {
        assert_eq!(Metric::default(), Metric::Euclidean);
    }
}
