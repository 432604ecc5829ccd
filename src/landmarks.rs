//! Landmark extraction
//!
//! Converts a [`Frame`] into a [`LandmarkSet`] plus an optional face crop for
//! the emotion classifier. Landmark inference itself is delegated to a
//! [`LandmarkModel`]; frames that already carry client-side landmarks skip it.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScreeningError;
use crate::types::{Frame, FramePayload};

/// Number of face mesh points without iris refinement
pub const FACE_MESH_POINTS: usize = 468;
/// Number of face mesh points with iris refinement
pub const FACE_MESH_POINTS_WITH_IRIS: usize = 478;
/// Number of hand landmarks
pub const HAND_POINTS: usize = 21;
/// Number of body pose landmarks
pub const POSE_POINTS: usize = 33;

/// Face crop padding as a fraction of the landmark bounding box
const FACE_CROP_PADDING: f64 = 0.10;

/// A normalized landmark coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// 2D Euclidean distance, optionally scaled to pixel space
    pub fn distance(&self, other: &Point, image_size: Option<(u32, u32)>) -> f64 {
        let (sx, sy) = match image_size {
            Some((w, h)) => (w as f64, h as f64),
            None => (1.0, 1.0),
        };
        let dx = (self.x - other.x) * sx;
        let dy = (self.y - other.y) * sy;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Face mesh landmarks (MediaPipe topology)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub points: Vec<Point>,
}

impl FaceLandmarks {
    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Whether iris refinement points are present
    pub fn has_iris(&self) -> bool {
        self.points.len() >= FACE_MESH_POINTS_WITH_IRIS
    }

    pub fn centroid(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    /// Bounding box as (min_x, min_y, max_x, max_y)
    pub fn bounding_box(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.points.first()?;
        let init = (first.x, first.y, first.x, first.y);
        Some(self.points.iter().fold(init, |(x0, y0, x1, y1), p| {
            (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
        }))
    }
}

/// Which hand a set of hand landmarks belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
}

/// Hand landmarks (21 points, wrist at index 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    pub handedness: Handedness,
    pub points: Vec<Point>,
}

impl HandLandmarks {
    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn wrist(&self) -> Option<Point> {
        self.point(0)
    }
}

/// Body pose landmarks (33 points)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmarks {
    pub points: Vec<Point>,
}

impl PoseLandmarks {
    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }
}

/// All landmarks detected in a single frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    #[serde(default)]
    pub face: Option<FaceLandmarks>,
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
    #[serde(default)]
    pub pose: Option<PoseLandmarks>,
    /// Source image size (width, height) used to scale distances
    #[serde(default)]
    pub image_size: Option<(u32, u32)>,
}

impl LandmarkSet {
    pub fn has_face(&self) -> bool {
        self.face.as_ref().is_some_and(|f| !f.points.is_empty())
    }

    pub fn face_point(&self, index: usize) -> Option<Point> {
        self.face.as_ref().and_then(|f| f.point(index))
    }

    pub fn pose_point(&self, index: usize) -> Option<Point> {
        self.pose.as_ref().and_then(|p| p.point(index))
    }

    pub fn hand(&self, handedness: Handedness) -> Option<&HandLandmarks> {
        self.hands.iter().find(|h| h.handedness == handedness)
    }
}

/// A pretrained face/hand/body landmark model
pub trait LandmarkModel: Send + Sync {
    /// Detect landmarks in a decoded image. `Ok(None)` means nothing was found.
    fn detect(&self, image: &DynamicImage) -> Result<Option<LandmarkSet>, ScreeningError>;

    fn name(&self) -> &str;
}

/// Landmarks and face crop for one frame
#[derive(Debug, Clone)]
pub struct Extraction {
    pub landmarks: LandmarkSet,
    /// JPEG-encoded face crop for the emotion classifier
    pub face_crop: Option<Vec<u8>>,
}

/// Turns frames into landmark sets
#[derive(Clone, Default)]
pub struct LandmarkExtractor {
    model: Option<Arc<dyn LandmarkModel>>,
}

impl std::fmt::Debug for LandmarkExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandmarkExtractor")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

impl LandmarkExtractor {
    /// Extractor that only accepts frames with precomputed landmarks
    pub fn precomputed_only() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: Arc<dyn LandmarkModel>) -> Self {
        Self { model: Some(model) }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Extract landmarks from a frame.
    ///
    /// Returns `MalformedFrame` for undecodable payloads and `MissingFace` when
    /// no face is found.
    pub fn extract(&self, frame: &Frame) -> Result<Extraction, ScreeningError> {
        match &frame.payload {
            FramePayload::Landmarks {
                landmarks,
                face_crop,
            } => {
                let landmarks = landmarks.clone().ok_or(ScreeningError::MissingFace)?;
                if !landmarks.has_face() {
                    return Err(ScreeningError::MissingFace);
                }
                Ok(Extraction {
                    landmarks,
                    face_crop: face_crop.clone(),
                })
            }
            FramePayload::Encoded(bytes) => {
                let model = self.model.as_ref().ok_or_else(|| {
                    ScreeningError::MalformedFrame(
                        "encoded frame received but no landmark model is configured".to_string(),
                    )
                })?;
                let image = image::load_from_memory(bytes)
                    .map_err(|e| ScreeningError::MalformedFrame(e.to_string()))?;

                let mut landmarks = model.detect(&image)?.ok_or(ScreeningError::MissingFace)?;
                if !landmarks.has_face() {
                    return Err(ScreeningError::MissingFace);
                }
                landmarks.image_size = Some((image.width(), image.height()));

                let face_crop = landmarks
                    .face
                    .as_ref()
                    .and_then(|face| crop_face(&image, face));
                Ok(Extraction {
                    landmarks,
                    face_crop,
                })
            }
        }
    }
}

/// Crop the padded face bounding box and encode it as JPEG
pub fn crop_face(image: &DynamicImage, face: &FaceLandmarks) -> Option<Vec<u8>> {
    let (x0, y0, x1, y1) = face.bounding_box()?;
    let pad_x = (x1 - x0) * FACE_CROP_PADDING;
    let pad_y = (y1 - y0) * FACE_CROP_PADDING;

    let (w, h) = (image.width() as f64, image.height() as f64);
    let left = ((x0 - pad_x).clamp(0.0, 1.0) * w).floor() as u32;
    let top = ((y0 - pad_y).clamp(0.0, 1.0) * h).floor() as u32;
    let right = ((x1 + pad_x).clamp(0.0, 1.0) * w).ceil() as u32;
    let bottom = ((y1 + pad_y).clamp(0.0, 1.0) * h).ceil() as u32;

    if right <= left || bottom <= top {
        return None;
    }

    let cropped = image.crop_imm(left, top, right - left, bottom - top);
    let rgb = DynamicImage::ImageRgb8(cropped.to_rgb8());
    let mut buf = Vec::new();
    match rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg) {
        Ok(()) => Some(buf),
        Err(e) => {
            debug!(error = %e, "Failed to encode face crop");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_test_landmarks;
    use image::{Rgb, RgbImage};

    struct FixedModel(Option<LandmarkSet>);

    impl LandmarkModel for FixedModel {
        fn detect(&self, _image: &DynamicImage) -> Result<Option<LandmarkSet>, ScreeningError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn make_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 90, 60]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_missing_index_is_none() {
        let set = LandmarkSet::default();
        assert!(set.face_point(1).is_none());
        assert!(set.pose_point(15).is_none());
        assert!(set.hand(Handedness::Left).is_none());
    }

    #[test]
    fn test_precomputed_without_face_is_missing_face() {
        let extractor = LandmarkExtractor::precomputed_only();
        let frame = Frame::with_landmarks(0.0, LandmarkSet::default());
        assert!(matches!(
            extractor.extract(&frame),
            Err(ScreeningError::MissingFace)
        ));
    }

    #[test]
    fn test_encoded_without_model_is_malformed() {
        let extractor = LandmarkExtractor::precomputed_only();
        let frame = Frame::encoded(0.0, make_test_png(8, 8));
        assert!(matches!(
            extractor.extract(&frame),
            Err(ScreeningError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_undecodable_bytes_are_malformed() {
        let extractor =
            LandmarkExtractor::with_model(Arc::new(FixedModel(Some(make_test_landmarks()))));
        let frame = Frame::encoded(0.0, vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(
            extractor.extract(&frame),
            Err(ScreeningError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_model_detects_nothing() {
        let extractor = LandmarkExtractor::with_model(Arc::new(FixedModel(None)));
        let frame = Frame::encoded(0.0, make_test_png(16, 16));
        assert!(matches!(
            extractor.extract(&frame),
            Err(ScreeningError::MissingFace)
        ));
    }

    #[test]
    fn test_encoded_frame_produces_crop_and_size() {
        let extractor =
            LandmarkExtractor::with_model(Arc::new(FixedModel(Some(make_test_landmarks()))));
        let frame = Frame::encoded(0.0, make_test_png(64, 48));
        let extraction = extractor.extract(&frame).unwrap();

        assert_eq!(extraction.landmarks.image_size, Some((64, 48)));
        let crop = extraction.face_crop.expect("face crop");
        let decoded = image::load_from_memory(&crop).unwrap();
        assert!(decoded.width() > 0 && decoded.width() <= 64);
    }

    #[test]
    fn test_distance_scales_to_pixels() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.1, 0.0);
        assert!((a.distance(&b, None) - 0.1).abs() < 1e-9);
        assert!((a.distance(&b, Some((640, 480))) - 64.0).abs() < 1e-9);
    }
}
