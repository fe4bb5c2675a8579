//! Vector similarity

/// Cosine of the angle between `a` and `b`.
///
/// Returns `None` when the vectors differ in length or are empty, and
/// `Some(0.0)` when either has zero magnitude or the result is not finite
/// (NaN or infinite components).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    // Accumulate in f64 so squares of large f32 components cannot overflow.
    let mut dot_product = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    let score = (dot_product / (norm_a * norm_b)) as f32;
    Some(if score.is_finite() { score } else { 0.0 })
}
