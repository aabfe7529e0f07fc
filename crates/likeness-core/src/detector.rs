//! Face and landmark detection via ONNX Runtime.
//!
//! Drives an anchor-free, three-stride detection model that emits scored
//! boxes plus five landmark points per face. The model is an opaque
//! collaborator: this module only owns preprocessing, output decoding,
//! and non-maximum suppression.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::types::BoundingBox;

const DETECT_INPUT_SIZE: usize = 640;
const DETECT_MEAN: f32 = 127.5;
const DETECT_STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;
/// score/box/landmark tensor per stride.
const EXPECTED_OUTPUTS: usize = STRIDES.len() * 3;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied by the letterbox resize, kept to map
/// detections back into original image coordinates.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// ONNX face/landmark detector.
#[derive(Debug)]
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the detection model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        if num_outputs != EXPECTED_OUTPUTS {
            return Err(DetectorError::InferenceFailed(format!(
                "detection model must have {EXPECTED_OUTPUTS} outputs \
                 (3 strides × score/box/landmark), got {num_outputs}"
            )));
        }

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded detection model"
        );

        Ok(Self { session })
    }

    /// Detect faces in an RGB image.
    ///
    /// Returns suppressed detections in original image coordinates, sorted
    /// by confidence descending. Output tensors are taken positionally:
    /// `[0..3]` scores, `[3..6]` boxes, `[6..9]` landmarks, strides
    /// 8/16/32 within each group.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let (input, letterbox) = preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (stride_pos, &stride) in STRIDES.iter().enumerate() {
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| {
                        DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}"))
                    })
            };
            let scores = extract(stride_pos, "scores")?;
            let boxes = extract(STRIDES.len() + stride_pos, "boxes")?;
            let landmarks = extract(2 * STRIDES.len() + stride_pos, "landmarks")?;

            decode_stride(scores, boxes, landmarks, stride, &letterbox, &mut detections);
        }

        Ok(nms(detections, NMS_IOU_THRESHOLD))
    }
}

/// The detection with the largest bounding-box area, if any.
///
/// The pipeline keys on the dominant face in the frame, not the highest
/// scoring one.
pub fn largest_face(faces: &[BoundingBox]) -> Option<&BoundingBox> {
    faces.iter().max_by(|a, b| a.area().total_cmp(&b.area()))
}

/// Letterbox-resize an RGB image into the model's square input tensor.
///
/// The image is scaled to fit, centered, and normalized; padding stays at
/// the zero point of the normalization.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let scale = (DETECT_INPUT_SIZE as f32 / width as f32)
        .min(DETECT_INPUT_SIZE as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as usize).max(1);
    let new_h = ((height as f32 * scale).round() as usize).max(1);
    let pad_x = (DETECT_INPUT_SIZE - new_w) / 2;
    let pad_y = (DETECT_INPUT_SIZE - new_h) / 2;

    let resized = image::imageops::resize(image, new_w as u32, new_h as u32, FilterType::Triangle);

    // Zeros are already the normalized value of DETECT_MEAN, so only the
    // image region needs filling.
    let mut tensor =
        Array4::<f32>::zeros((1, 3, DETECT_INPUT_SIZE, DETECT_INPUT_SIZE));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (pad_x + x as usize, pad_y + y as usize);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel[c] as f32 - DETECT_MEAN) / DETECT_STD;
        }
    }

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    };
    (tensor, letterbox)
}

/// Decode one stride level into `out`.
///
/// Boxes are center-anchored distance offsets in stride units; landmarks
/// are per-point offsets from the anchor center.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    landmarks: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    out: &mut Vec<BoundingBox>,
) {
    let grid_w = DETECT_INPUT_SIZE / stride;
    let grid_h = DETECT_INPUT_SIZE / stride;
    let num_anchors = grid_w * grid_h * ANCHORS_PER_CELL;

    for (idx, &score) in scores.iter().enumerate().take(num_anchors) {
        if score <= SCORE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = ((cell % grid_w) * stride) as f32;
        let anchor_cy = ((cell / grid_w) * stride) as f32;

        let box_off = idx * 4;
        let lm_off = idx * 10;
        if box_off + 4 > boxes.len() || lm_off + 10 > landmarks.len() {
            continue;
        }

        let (x1, y1) = letterbox.to_image(
            anchor_cx - boxes[box_off] * stride as f32,
            anchor_cy - boxes[box_off + 1] * stride as f32,
        );
        let (x2, y2) = letterbox.to_image(
            anchor_cx + boxes[box_off + 2] * stride as f32,
            anchor_cy + boxes[box_off + 3] * stride as f32,
        );

        let points: [(f32, f32); 5] = std::array::from_fn(|i| {
            letterbox.to_image(
                anchor_cx + landmarks[lm_off + 2 * i] * stride as f32,
                anchor_cy + landmarks[lm_off + 2 * i + 1] * stride as f32,
            )
        });

        out.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks: points,
        });
    }
}

/// Non-maximum suppression: greedily keep the highest-confidence boxes,
/// discarding any later box overlapping a kept one beyond the threshold.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| iou(k, &det) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
            landmarks: [(0.0, 0.0); 5],
        }
    }

    #[test]
    fn test_load_missing_model_errors() {
        let err = FaceDetector::load(Path::new("/nonexistent/det.onnx")).unwrap_err();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }

    #[test]
    fn test_iou_identical() {
        let a = make_box(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = make_box(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_box(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = make_box(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_box(5.0, 0.0, 10.0, 10.0, 1.0);
        // Overlap 50, union 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            make_box(0.0, 0.0, 100.0, 100.0, 0.9),
            make_box(5.0, 5.0, 100.0, 100.0, 0.8),
            make_box(300.0, 300.0, 50.0, 50.0, 0.7),
        ];
        let kept = nms(detections, 0.4);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_largest_face_ignores_confidence() {
        let faces = vec![
            make_box(0.0, 0.0, 10.0, 10.0, 0.99),
            make_box(50.0, 50.0, 80.0, 80.0, 0.6),
        ];
        let best = largest_face(&faces).unwrap();
        assert!((best.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_largest_face_empty() {
        assert!(largest_face(&[]).is_none());
    }

    #[test]
    fn test_preprocess_shape_and_letterbox() {
        let image = RgbImage::from_pixel(320, 240, image::Rgb([255, 255, 255]));
        let (tensor, letterbox) = preprocess(&image);
        assert_eq!(
            tensor.shape(),
            &[1, 3, DETECT_INPUT_SIZE, DETECT_INPUT_SIZE]
        );

        // 320x240 scales by 2 to 640x480, padded to 640 vertically.
        assert!((letterbox.scale - 2.0).abs() < 1e-6);
        assert!((letterbox.pad_x - 0.0).abs() < 1e-6);
        assert!((letterbox.pad_y - 80.0).abs() < 1e-6);

        // Padding rows stay at the normalized zero point.
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        // Image rows carry the normalized white value.
        let white = (255.0 - DETECT_MEAN) / DETECT_STD;
        assert!((tensor[[0, 0, 100, 0]] - white).abs() < 1e-5);
    }

    #[test]
    fn test_letterbox_roundtrip() {
        let letterbox = Letterbox {
            scale: 2.0,
            pad_x: 0.0,
            pad_y: 80.0,
        };
        let (x, y) = letterbox.to_image(100.0 * 2.0 + 0.0, 50.0 * 2.0 + 80.0);
        assert!((x - 100.0).abs() < 1e-4);
        assert!((y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_stride_below_threshold_skipped() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let grid = DETECT_INPUT_SIZE / 32;
        let anchors = grid * grid * ANCHORS_PER_CELL;
        let scores = vec![0.1f32; anchors];
        let boxes = vec![1.0f32; anchors * 4];
        let landmarks = vec![0.0f32; anchors * 10];

        let mut out = Vec::new();
        decode_stride(&scores, &boxes, &landmarks, 32, &letterbox, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_decode_stride_box_geometry() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let stride = 32;
        let grid = DETECT_INPUT_SIZE / stride;
        let anchors = grid * grid * ANCHORS_PER_CELL;

        // One confident anchor at cell (2, 1) (both anchors of a cell share
        // the center; use the first).
        let cell = grid + 2;
        let idx = cell * ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        scores[idx] = 0.9;
        // Offsets of one stride unit in every direction.
        let boxes = vec![1.0f32; anchors * 4];
        let landmarks = vec![0.5f32; anchors * 10];

        let mut out = Vec::new();
        decode_stride(&scores, &boxes, &landmarks, stride, &letterbox, &mut out);
        assert_eq!(out.len(), 1);

        let det = &out[0];
        let (cx, cy) = ((2 * stride) as f32, stride as f32);
        assert!((det.x - (cx - 32.0)).abs() < 1e-4);
        assert!((det.y - (cy - 32.0)).abs() < 1e-4);
        assert!((det.width - 64.0).abs() < 1e-4);
        assert!((det.height - 64.0).abs() < 1e-4);
        assert!((det.landmarks[0].0 - (cx + 16.0)).abs() < 1e-4);
        assert!((det.landmarks[4].1 - (cy + 16.0)).abs() < 1e-4);
    }
}
