//! YOLO face detector using ONNX Runtime via `ort`.
//!
//! Letterboxes the photo to the model's square input, runs inference, drops
//! low-confidence rows and suppresses overlapping boxes. Boxes come back in
//! the coordinates of the image that was passed in.

use std::path::Path;

use image::RgbImage;

use crate::embedding::domain::face_detector::{FaceBox, FaceDetector};

use super::onnx_session;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Values per row before the keypoints: cx, cy, w, h, conf.
const BOX_VALUES: usize = 5;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model. The input resolution is read from the model's
    /// NCHW input shape, falling back to 640 when it is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = onnx_session::open_session(model_path)?;
        let input_size = onnx_session::input_side(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let (input_tensor, letterbox) = letterbox(image, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut raw = parse_rows(data, tensor.shape(), self.confidence, &letterbox)?;
        let kept = nms(&mut raw, NMS_IOU_THRESH);
        let faces: Vec<FaceBox> = kept
            .iter()
            .filter_map(|d| d.to_face_box(image.width(), image.height()))
            .collect();
        log::trace!("detected {} face(s)", faces.len());
        Ok(faces)
    }
}

/// Mapping from letterboxed model coordinates back to the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_source(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize an image to `target_size` × `target_size`, 0..1 NCHW.
fn letterbox(image: &RgbImage, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let (w, h) = (image.width() as f64, image.height() as f64);
    let target = target_size as f64;

    let scale = (target / w).min(target / h);
    let new_w = ((w * scale).round() as u32).min(target_size);
    let new_h = ((h * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114/255 gray padding, YOLO convention
    let gray = 114.0f32 / 255.0;
    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), gray);

    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(image.height() - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(image.width() - 1);
            let pixel = image.get_pixel(src_x, src_y);
            let (ty, tx) = ((pad_y + y) as usize, (pad_x + x) as usize);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel.0[c] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn bbox(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Clamps to the image; `None` when nothing of the box is inside it.
    fn to_face_box(&self, width: u32, height: u32) -> Option<FaceBox> {
        let x1 = self.x1.max(0.0).floor() as u32;
        let y1 = self.y1.max(0.0).floor() as u32;
        let x2 = (self.x2.min(width as f64).ceil().max(0.0) as u32).min(width);
        let y2 = (self.y2.min(height as f64).ceil().max(0.0) as u32).min(height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: self.confidence,
        })
    }
}

/// Parses YOLO output rows `[cx, cy, w, h, conf, keypoints...]` above
/// `confidence`. Accepts `[1, features, detections]` (transposed) and
/// `[1, detections, features]` layouts.
fn parse_rows(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < BOX_VALUES || data.len() < num_dets * num_feats {
        return Err(format!("YOLO output too small for shape {shape:?}").into());
    }
    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut dets = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);
        dets.push(RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence: conf,
        });
    }
    Ok(dets)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        if keep
            .iter()
            .all(|k| bbox_iou(&k.bbox(), &det.bbox()) <= iou_thresh)
        {
            keep.push(det.clone());
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
