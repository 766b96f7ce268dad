//! Photo → face embedding: detect, crop the largest face, encode, normalise.
//!
//! Photos are shrunk to the thumbnail bound before detection. A photo in
//! which the detector finds no face yields `None`, as does a face whose
//! encoding has no length to normalise.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::clustering::domain::distance::Embedding;
use crate::embedding::domain::embedding_source::EmbeddingSource;
use crate::embedding::domain::face_detector::{FaceBox, FaceDetector};
use crate::embedding::domain::face_encoder::FaceEncoder;
use crate::input::photo_item::PhotoItem;
use crate::shared::constants::{FACE_CROP_MARGIN, THUMBNAIL_MAX_SIDE};

pub struct FaceEmbedder {
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn FaceEncoder>,
}

impl FaceEmbedder {
    pub fn new(detector: Box<dyn FaceDetector>, encoder: Box<dyn FaceEncoder>) -> Self {
        Self { detector, encoder }
    }

    /// Returns the encoder-sized crop of the largest face, if any.
    fn locate_face(
        &mut self,
        img: &DynamicImage,
    ) -> Result<Option<RgbImage>, Box<dyn std::error::Error>> {
        if img.width() == 0 || img.height() == 0 {
            return Ok(None);
        }
        // Shrink only; `thumbnail` would also enlarge small photos.
        let rgb = if img.width() > THUMBNAIL_MAX_SIDE || img.height() > THUMBNAIL_MAX_SIDE {
            img.thumbnail(THUMBNAIL_MAX_SIDE, THUMBNAIL_MAX_SIDE).to_rgb8()
        } else {
            img.to_rgb8()
        };
        let faces = self.detector.detect(&rgb)?;
        Ok(FaceBox::largest(&faces)
            .map(|face| crop_face(&rgb, face, self.encoder.input_size())))
    }
}

impl EmbeddingSource for FaceEmbedder {
    fn embed(&mut self, item: &PhotoItem) -> Result<Option<Embedding>, Box<dyn std::error::Error>> {
        let img = image::open(item.path())?;
        let Some(face) = self.locate_face(&img)? else {
            log::debug!("{}: no face detected", item.name());
            return Ok(None);
        };

        let mut embedding = self.encoder.encode(&face)?;
        if !l2_normalize(&mut embedding) {
            log::debug!("{}: degenerate embedding", item.name());
            return Ok(None);
        }
        Ok(Some(embedding))
    }
}

/// Square crop centred on `face`, widened by the crop margin and shifted to
/// stay inside the image, resized to `size`.
fn crop_face(img: &RgbImage, face: &FaceBox, size: u32) -> RgbImage {
    let wanted = (face.width.max(face.height) as f64 * FACE_CROP_MARGIN).round() as u32;
    let side = wanted.max(1).min(img.width()).min(img.height());
    let (cx, cy) = face.center();
    let x = cx.saturating_sub(side / 2).min(img.width() - side);
    let y = cy.saturating_sub(side / 2).min(img.height() - side);
    let square = image::imageops::crop_imm(img, x, y, side, side).to_image();
    image::imageops::resize(&square, size, size, FilterType::Triangle)
}

/// Scales `v` to unit length. Returns `false` (leaving `v` untouched) when
/// the vector has no length to normalise.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= 0.0 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::domain::distance::Metric;
    use crate::pipeline::cancellation::CancellationToken;
    use crate::pipeline::classify_photos_use_case::ClassifyPhotosUseCase;
    use crate::pipeline::task_event::TaskEvent;
    use crate::routing::infrastructure::recording_routing_sink::RecordingRoutingSink;
    use approx::assert_relative_eq;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns the same boxes for every image.
    struct FixedDetector(Vec<FaceBox>);

    impl FaceDetector for FixedDetector {
        fn detect(
            &mut self,
            _image: &RgbImage,
        ) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(
            &mut self,
            _image: &RgbImage,
        ) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            Err("detector crashed".into())
        }
    }

    /// Encodes a crop as its mean colour and counts calls.
    struct MeanColourEncoder {
        calls: Arc<AtomicUsize>,
    }

    impl FaceEncoder for MeanColourEncoder {
        fn input_size(&self) -> u32 {
            16
        }

        fn encode(&mut self, face: &RgbImage) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(face.dimensions(), (16, 16));
            let n = (face.width() * face.height()) as f32;
            let mut mean = vec![0.0f32; 3];
            for pixel in face.pixels() {
                for c in 0..3 {
                    mean[c] += pixel.0[c] as f32 / n;
                }
            }
            Ok(mean)
        }
    }

    fn face(x: u32, y: u32, width: u32, height: u32) -> FaceBox {
        FaceBox {
            x,
            y,
            width,
            height,
            confidence: 0.9,
        }
    }

    fn embedder(faces: Vec<FaceBox>) -> (FaceEmbedder, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let encoder = MeanColourEncoder {
            calls: calls.clone(),
        };
        (
            FaceEmbedder::new(Box::new(FixedDetector(faces)), Box::new(encoder)),
            calls,
        )
    }

    fn save(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    /// Uniform image with no face in it.
    fn landscape() -> RgbImage {
        RgbImage::from_pixel(800, 600, image::Rgb([90, 140, 200]))
    }

    #[test]
    fn test_faceless_photo_yields_none_without_encoding() {
        let tmp = tempfile::tempdir().unwrap();
        let path = save(tmp.path(), "landscape.png", &landscape());
        let (mut e, calls) = embedder(vec![]);

        assert_eq!(e.embed(&PhotoItem::new(path)).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_faceless_photo_is_reported_as_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = save(tmp.path(), "landscape.png", &landscape());
        let (e, _) = embedder(vec![]);
        let sink = RecordingRoutingSink::new();
        let routed = sink.log();
        let mut use_case =
            ClassifyPhotosUseCase::new(Box::new(e), Box::new(sink), 0.4, Metric::Euclidean);
        let (tx, rx) = crossbeam_channel::unbounded();

        let summary = use_case.execute(
            &vec![PhotoItem::new(path.clone())],
            &tx,
            &CancellationToken::new(),
        );

        let events: Vec<TaskEvent> = rx.try_iter().collect();
        assert!(events.contains(&TaskEvent::Skipped {
            item: PhotoItem::new(path)
        }));
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.clusters, 0);
        assert!(summary.assignments.is_empty());
        assert!(routed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_detected_face_is_encoded_and_normalised() {
        let tmp = tempfile::tempdir().unwrap();
        let path = save(tmp.path(), "portrait.png", &landscape());
        let (mut e, calls) = embedder(vec![face(100, 100, 200, 200)]);

        let v = e.embed(&PhotoItem::new(path)).unwrap().unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_largest_face_is_encoded() {
        // Small red face on the left, large green face on the right.
        let mut img = RgbImage::from_pixel(400, 200, image::Rgb([0, 0, 0]));
        for (x, y, p) in img.enumerate_pixels_mut() {
            if (20..60).contains(&x) && (20..60).contains(&y) {
                *p = image::Rgb([255, 0, 0]);
            }
            if (200..380).contains(&x) && (10..190).contains(&y) {
                *p = image::Rgb([0, 255, 0]);
            }
        }
        let tmp = tempfile::tempdir().unwrap();
        let path = save(tmp.path(), "two.png", &img);
        let (mut e, _) = embedder(vec![face(20, 20, 40, 40), face(200, 10, 180, 180)]);

        let v = e.embed(&PhotoItem::new(path)).unwrap().unwrap();
        assert!(v[1] > v[0], "expected the green face, got {v:?}");
    }

    #[test]
    fn test_black_face_has_degenerate_embedding() {
        let tmp = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(100, 100, image::Rgb([0, 0, 0]));
        let path = save(tmp.path(), "dark.png", &img);
        let (mut e, calls) = embedder(vec![face(10, 10, 50, 50)]);

        assert_eq!(e.embed(&PhotoItem::new(path)).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unreadable_photo_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let (mut e, _) = embedder(vec![face(0, 0, 10, 10)]);

        assert!(e.embed(&PhotoItem::new(path)).is_err());
    }

    #[test]
    fn test_detector_failure_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = save(tmp.path(), "a.png", &landscape());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut e = FaceEmbedder::new(
            Box::new(FailingDetector),
            Box::new(MeanColourEncoder { calls }),
        );

        assert!(e.embed(&PhotoItem::new(path)).is_err());
    }

    #[test]
    fn test_crop_face_output_size() {
        let img = RgbImage::from_pixel(300, 200, image::Rgb([1, 2, 3]));
        let crop = crop_face(&img, &face(100, 50, 60, 80), 112);
        assert_eq!(crop.dimensions(), (112, 112));
    }

    #[test]
    fn test_crop_face_stays_inside_image_at_edges() {
        // Face hugging the bottom-right corner; margin would overflow.
        let mut img = RgbImage::from_pixel(100, 100, image::Rgb([0, 0, 255]));
        for (x, y, p) in img.enumerate_pixels_mut() {
            if x >= 70 && y >= 70 {
                *p = image::Rgb([255, 0, 0]);
            }
        }
        let crop = crop_face(&img, &face(70, 70, 30, 30), 16);
        let [r, _, b] = crop.get_pixel(15, 15).0;
        assert!(r > 200 && b < 50);
    }

    #[test]
    fn test_crop_face_larger_than_image_uses_whole_short_side() {
        let img = RgbImage::from_pixel(50, 30, image::Rgb([9, 9, 9]));
        let crop = crop_face(&img, &face(0, 0, 50, 30), 20);
        assert_eq!(crop.dimensions(), (20, 20));
    }

    #[test]
    fn test_l2_normalize_unit_vector() {
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_reports_failure() {
        let mut v = vec![0.0, 0.0, 0.0];
        assert!(!l2_normalize(&mut v));
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_l2_normalize_nan_reports_failure() {
        let mut v = vec![f32::NAN, 1.0];
        assert!(!l2_normalize(&mut v));
    }
}
