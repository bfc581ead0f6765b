//! Common geometry types shared by the prediction pipeline

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use thiserror::Error;

/// Default rounding grid, in pixels
pub const DEFAULT_GRID: NonZeroU32 = match NonZeroU32::new(10) {
    Some(grid) => grid,
    None => panic!("grid must be non-zero"),
};

/// Geometry errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Non-finite coordinate in box {0:?}")]
    NonFinite([f64; 4]),

    #[error("Inverted box {0:?}: expected x0 <= x1 and y0 <= y1")]
    Inverted([f64; 4]),

    #[error("Polygon needs an even number of at least 4 values, got {0}")]
    InvalidPolygon(usize),
}

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Axis a leveling pass operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Get human-readable axis name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

/// Axis-aligned bounding box in image pixel space.
///
/// Serialized as `[x0, y0, x1, y1]` (top-left X, top-left Y, bottom-right X,
/// bottom-right Y). Construction goes through [`BBox::new`], so every value of
/// this type satisfies `0 <= x0 <= x1` and `0 <= y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl BBox {
    /// Create a box, clipping negative coordinates to 0.
    ///
    /// Rejects non-finite values and boxes whose corners are inverted.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self> {
        let raw = [x0, y0, x1, y1];
        if raw.iter().any(|c| !c.is_finite()) {
            return Err(GeometryError::NonFinite(raw));
        }
        if x0 > x1 || y0 > y1 {
            return Err(GeometryError::Inverted(raw));
        }
        Ok(Self {
            x0: x0.max(0.0),
            y0: y0.max(0.0),
            x1: x1.max(0.0),
            y1: y1.max(0.0),
        })
    }

    /// Smallest box enclosing a flat `[x, y, x, y, ...]` polygon
    pub fn from_polygon(points: &[f64]) -> Result<Self> {
        if points.len() < 4 || points.len() % 2 != 0 {
            return Err(GeometryError::InvalidPolygon(points.len()));
        }
        let xs = points.iter().step_by(2).copied();
        let ys = points.iter().skip(1).step_by(2).copied();
        let (x0, x1) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
        let (y0, y1) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });
        Self::new(x0, y0, x1, y1)
    }

    #[must_use]
    pub fn x0(&self) -> f64 {
        self.x0
    }

    #[must_use]
    pub fn y0(&self) -> f64 {
        self.y0
    }

    #[must_use]
    pub fn x1(&self) -> f64 {
        self.x1
    }

    #[must_use]
    pub fn y1(&self) -> f64 {
        self.y1
    }

    /// `[x0, y0, x1, y1]`
    #[must_use]
    pub fn coordinates(&self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    /// Start and end of the box along an axis
    #[must_use]
    pub fn span(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::X => (self.x0, self.x1),
            Axis::Y => (self.y0, self.y1),
        }
    }

    /// Snap every coordinate to the nearest multiple of `grid`.
    ///
    /// Halves round away from zero. Rounding is idempotent and monotonic, so
    /// the result is still a valid box.
    #[must_use]
    pub fn rounded(&self, grid: NonZeroU32) -> Self {
        Self {
            x0: round_to_grid(self.x0, grid),
            y0: round_to_grid(self.y0, grid),
            x1: round_to_grid(self.x1, grid),
            y1: round_to_grid(self.y1, grid),
        }
    }

    /// Copy of the box slid back along `axis` so its start edge is exactly
    /// `start`, keeping its extent.
    ///
    /// The end edge moves by the same distance as the start edge, but never
    /// past the new start.
    #[must_use]
    pub fn aligned_to(&self, axis: Axis, start: f64) -> Self {
        let mut moved = *self;
        let (current_start, current_end) = self.span(axis);
        let end = (current_end - (current_start - start)).max(start);
        match axis {
            Axis::X => {
                moved.x0 = start;
                moved.x1 = end;
            }
            Axis::Y => {
                moved.y0 = start;
                moved.y1 = end;
            }
        }
        moved
    }
}

impl TryFrom<[f64; 4]> for BBox {
    type Error = GeometryError;

    fn try_from(value: [f64; 4]) -> Result<Self> {
        let [x0, y0, x1, y1] = value;
        Self::new(x0, y0, x1, y1)
    }
}

impl From<BBox> for [f64; 4] {
    fn from(bbox: BBox) -> Self {
        bbox.coordinates()
    }
}

/// A shape found by the object detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    /// Detector class, e.g. "input", "checkbox", "button"
    pub class: String,
    #[serde(rename = "coordinates")]
    pub bbox: BBox,
}

/// A line of text found by OCR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub text: String,
    #[serde(rename = "coordinates")]
    pub bbox: BBox,
}

/// Snap a single coordinate to the nearest multiple of `grid`
#[must_use]
pub fn round_to_grid(value: f64, grid: NonZeroU32) -> f64 {
    let grid = f64::from(grid.get());
    (value / grid).round() * grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(g: u32) -> NonZeroU32 {
        NonZeroU32::new(g).unwrap()
    }

    #[test]
    fn test_round_to_grid_half_away_from_zero() {
        assert_eq!(round_to_grid(205.0, grid(10)), 210.0);
        assert_eq!(round_to_grid(204.9, grid(10)), 200.0);
        assert_eq!(round_to_grid(-5.0, grid(10)), -10.0);
        assert_eq!(round_to_grid(7.0, grid(5)), 5.0);
    }

    #[test]
    fn test_rounding_is_idempotent() {
        let samples = [
            [0.0, 0.0, 0.0, 0.0],
            [1.4, 5.0, 14.99, 15.0],
            [100.0, 205.0, 260.0, 225.0],
            [333.3, 444.4, 555.5, 666.6],
        ];
        for g in [1, 3, 10, 25] {
            for sample in samples {
                let bbox = BBox::try_from(sample).unwrap();
                let once = bbox.rounded(grid(g));
                assert_eq!(once.rounded(grid(g)), once, "grid {g}, box {sample:?}");
            }
        }
    }

    #[test]
    fn test_new_rejects_inverted_box() {
        assert_eq!(
            BBox::new(10.0, 0.0, 5.0, 10.0),
            Err(GeometryError::Inverted([10.0, 0.0, 5.0, 10.0]))
        );
        assert!(BBox::new(0.0, 10.0, 5.0, 5.0).is_err());
    }

    #[test]
    fn test_new_rejects_non_finite() {
        assert!(matches!(
            BBox::new(f64::NAN, 0.0, 1.0, 1.0),
            Err(GeometryError::NonFinite(_))
        ));
        assert!(BBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_new_clips_negative_coordinates() {
        let bbox = BBox::new(-4.0, -2.0, 10.0, 20.0).unwrap();
        assert_eq!(bbox.coordinates(), [0.0, 0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_from_polygon() {
        let polygon = [140.0, 207.0, 258.0, 205.0, 260.0, 225.0, 141.0, 224.0];
        let bbox = BBox::from_polygon(&polygon).unwrap();
        assert_eq!(bbox.coordinates(), [140.0, 205.0, 260.0, 225.0]);

        assert_eq!(
            BBox::from_polygon(&[1.0, 2.0, 3.0]),
            Err(GeometryError::InvalidPolygon(3))
        );
    }

    #[test]
    fn test_aligned_to_preserves_extent() {
        let bbox = BBox::new(140.0, 210.0, 260.0, 230.0).unwrap();
        let moved = bbox.aligned_to(Axis::Y, 200.0);
        assert_eq!(moved.coordinates(), [140.0, 200.0, 260.0, 220.0]);

        let moved = bbox.aligned_to(Axis::X, 100.0);
        assert_eq!(moved.coordinates(), [100.0, 210.0, 220.0, 230.0]);
    }

    #[test]
    fn test_aligned_to_lands_exactly_on_start() {
        let bbox = BBox::new(0.0, 0.81, 10.0, 0.81).unwrap();
        let moved = bbox.aligned_to(Axis::Y, 0.1);
        assert_eq!(moved.y0(), 0.1);
        assert!(moved.y1() >= moved.y0());
    }

    #[test]
    fn test_serializes_as_coordinate_array() {
        let bbox = BBox::new(100.0, 200.0, 130.0, 230.0).unwrap();
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[100.0,200.0,130.0,230.0]");

        let parsed: BBox = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(parsed.coordinates(), [1.0, 2.0, 3.0, 4.0]);

        let inverted: std::result::Result<BBox, _> = serde_json::from_str("[5, 2, 3, 4]");
        assert!(inverted.is_err());
    }

    #[test]
    fn test_detection_wire_format() {
        let detection: ObjectDetection =
            serde_json::from_str(r#"{"class": "checkbox", "coordinates": [100, 200, 130, 230]}"#)
                .unwrap();
        assert_eq!(detection.class, "checkbox");
        assert_eq!(detection.bbox.y1(), 230.0);

        let text = TextDetection {
            text: "Remember me".to_string(),
            bbox: BBox::new(140.0, 205.0, 260.0, 225.0).unwrap(),
        };
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["coordinates"][1], 205.0);
    }

    #[test]
    fn test_axis_name() {
        assert_eq!(Axis::X.name(), "x");
        assert_eq!(Axis::Y.name(), "y");
    }
}
