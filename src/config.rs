use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical-frame constants shared by alignment and warping.
///
/// After translation and norm removal, a sample's point cloud sits on the
/// unit sphere. `scale` stretches it into a fixed pixel-sized frame and
/// `offset` shifts it away from the origin, so triangulation and warping see
/// comparable magnitudes regardless of the source image resolution:
///
/// ```text
/// canonical = point / (norm / scale) + offset
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Canonical-frame scale constant.
    pub scale: f32,
    /// Canonical-frame origin offset, applied to both coordinates.
    pub offset: f32,
}

impl FrameConfig {
    pub const DEFAULT_SCALE: f32 = 150.0;
    pub const DEFAULT_OFFSET: f32 = 50.0;

    pub fn new(scale: f32, offset: f32) -> Result<Self> {
        let config = Self { scale, offset };
        config.validate()?;
        Ok(config)
    }

    /// Check the constants once, at construction.
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "scale must be finite and positive, got {}",
                self.scale
            )));
        }
        if !self.offset.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "offset must be finite, got {}",
                self.offset
            )));
        }
        Ok(())
    }

    /// Map a centered point into the canonical frame.
    pub fn to_canonical(&self, p: crate::types::Point, norm: f32) -> crate::types::Point {
        crate::types::Point::new(
            p.x / (norm / self.scale) + self.offset,
            p.y / (norm / self.scale) + self.offset,
        )
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            scale: Self::DEFAULT_SCALE,
            offset: Self::DEFAULT_OFFSET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn defaults() {
        let config = FrameConfig::default();
        assert_eq!(config.scale, 150.0);
        assert_eq!(config.offset, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_constants() {
        assert!(FrameConfig::new(0.0, 50.0).is_err());
        assert!(FrameConfig::new(-1.0, 50.0).is_err());
        assert!(FrameConfig::new(f32::NAN, 50.0).is_err());
        assert!(FrameConfig::new(150.0, f32::INFINITY).is_err());
        assert!(FrameConfig::new(150.0, 0.0).is_ok());
    }

    #[test]
    fn canonical_mapping() {
        let config = FrameConfig::new(150.0, 50.0).unwrap();
        // norm == scale leaves magnitudes unchanged apart from the offset
        let p = config.to_canonical(Point::new(10.0, -10.0), 150.0);
        assert!((p.x - 60.0).abs() < 1e-5);
        assert!((p.y - 40.0).abs() < 1e-5);
    }
}
