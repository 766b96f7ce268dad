use image::RgbImage;

/// Detected face, in pixel coordinates of the image passed to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f64,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Largest face; the earliest one wins on equal area.
    pub fn largest(faces: &[FaceBox]) -> Option<&FaceBox> {
        faces
            .iter()
            .fold(None, |best: Option<&FaceBox>, face| match best {
                Some(b) if b.area() >= face.area() => Some(b),
                _ => Some(face),
            })
    }
}

/// Domain interface for face localisation.
///
/// An empty result means the image holds no face.
pub trait FaceDetector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;
}
