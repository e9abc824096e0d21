//! Aspect-ratio classification of a video's primary stream.

use std::fmt;

const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;
const PORTRAIT_RATIO: f64 = 9.0 / 16.0;

/// Absolute difference allowed between a stream's ratio and the reference
/// ratio. Not a percentage.
pub const RATIO_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    /// Classify a `width / height` ratio.
    pub fn from_ratio(ratio: f64) -> Self {
        if (ratio - LANDSCAPE_RATIO).abs() < RATIO_TOLERANCE {
            Orientation::Landscape
        } else if (ratio - PORTRAIT_RATIO).abs() < RATIO_TOLERANCE {
            Orientation::Portrait
        } else {
            Orientation::Other
        }
    }

    /// Classify pixel dimensions. A zero height never matches a known ratio.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if height == 0 {
            return Orientation::Other;
        }
        Self::from_ratio(width as f64 / height as f64)
    }

    /// Human-readable aspect label (`16:9`, `9:16`, `other`).
    pub fn aspect_label(self) -> &'static str {
        match self {
            Orientation::Landscape => "16:9",
            Orientation::Portrait => "9:16",
            Orientation::Other => "other",
        }
    }

    /// Namespace segment used as the storage key prefix.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Other => "other",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.aspect_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ratios() {
        assert_eq!(Orientation::from_ratio(16.0 / 9.0), Orientation::Landscape);
        assert_eq!(Orientation::from_ratio(9.0 / 16.0), Orientation::Portrait);
        assert_eq!(Orientation::from_ratio(1.0), Orientation::Other);
    }

    #[test]
    fn tolerance_is_absolute() {
        assert_eq!(Orientation::from_ratio(1.786), Orientation::Landscape);
        assert_eq!(Orientation::from_ratio(16.0 / 9.0 + 0.1), Orientation::Other);
        assert_eq!(Orientation::from_ratio(16.0 / 9.0 - 0.1), Orientation::Other);
    }

    #[test]
    fn common_resolutions() {
        assert_eq!(Orientation::from_dimensions(1920, 1080), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(1080, 1920), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(1920, 1061), Orientation::Other);
        assert_eq!(Orientation::from_dimensions(640, 480), Orientation::Other);
        assert_eq!(Orientation::from_dimensions(1920, 0), Orientation::Other);
    }

    #[test]
    fn labels() {
        assert_eq!(Orientation::Landscape.to_string(), "16:9");
        assert_eq!(Orientation::Portrait.aspect_label(), "9:16");
        assert_eq!(Orientation::Other.key_prefix(), "other");
    }
}
