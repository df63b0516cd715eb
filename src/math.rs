use glam::Vec2;

/// Normalisation helper the kernels share on top of glam's `Vec2`.
pub trait Vec2Ext {
    /// Divides by an already known length; zero-length vectors stay zero.
    fn normalise_with_length(self, length: f32) -> Vec2;
}

impl Vec2Ext for Vec2 {
    #[inline]
    fn normalise_with_length(self, length: f32) -> Vec2 {
        if length != 0.0 {
            self / length
        } else {
            Vec2::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_normalise_with_length() {
        let v = Vec2::new(3.0, 4.0);
        let n = v.normalise_with_length(v.length());
        assert_relative_eq!(n.x, 0.6);
        assert_relative_eq!(n.y, 0.8);
    }

    #[test]
    fn test_zero_length_normalises_to_zero() {
        assert_eq!(Vec2::ZERO.normalise_with_length(0.0), Vec2::ZERO);
        assert_eq!(Vec2::new(1.0, 1.0).normalise_with_length(0.0), Vec2::ZERO);
    }
}
