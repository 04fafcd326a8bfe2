const DENOM_EPSILON: f64 = 1e-8;

/// Angle at vertex `b` between the rays `b -> a` and `b -> c`, in degrees.
///
/// Always lands in `[0, 180]`. Coincident points do not fail: the epsilon in
/// the denominator turns a zero-length edge into a zero cosine.
pub fn angle_between(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    let ba = sub(a, b);
    let bc = sub(c, b);
    let denom = length(ba) * length(bc) + DENOM_EPSILON;
    let cosine = (dot(ba, bc) / denom).clamp(-1.0, 1.0);
    cosine.acos().to_degrees() as f32
}

fn sub(a: (f32, f32), b: (f32, f32)) -> (f64, f64) {
    (f64::from(a.0) - f64::from(b.0), f64::from(a.1) - f64::from(b.1))
}

fn dot(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.0 + a.1 * b.1
}

fn length(v: (f64, f64)) -> f64 {
    (v.0 * v.0 + v.1 * v.1).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Pixel-space inputs; the epsilon only matters for near-zero edges.
    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn collinear_with_vertex_between_is_straight() {
        for scale in [1.0, 37.5, 640.0, 4096.0] {
            let angle = angle_between((0.0, 0.0), (scale, scale), (2.0 * scale, 2.0 * scale));
            assert!(approx(angle, 180.0), "scale {scale}: {angle}");
        }
    }

    #[test]
    fn perpendicular_is_right_angle() {
        for scale in [1.0, 37.5, 480.0, 4096.0] {
            let angle = angle_between((scale, 0.0), (0.0, 0.0), (0.0, scale));
            assert!(approx(angle, 90.0), "scale {scale}: {angle}");
        }
    }

    #[test]
    fn same_direction_is_zero() {
        let angle = angle_between((200.0, 0.0), (0.0, 0.0), (500.0, 0.0));
        assert!(approx(angle, 0.0), "{angle}");
    }

    #[test]
    fn forty_five_degrees() {
        let angle = angle_between((100.0, 0.0), (0.0, 0.0), (100.0, 100.0));
        assert!(approx(angle, 45.0), "{angle}");
    }

    #[test]
    fn coincident_points_stay_defined() {
        let angle = angle_between((1.0, 1.0), (1.0, 1.0), (1.0, 1.0));
        assert!(angle.is_finite());
        assert!((0.0..=180.0).contains(&angle));
    }
}
