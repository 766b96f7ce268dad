use image::RgbImage;

/// Domain interface for turning a face crop into a raw feature vector.
pub trait FaceEncoder: Send {
    /// Side length of the square crop `encode` expects.
    fn input_size(&self) -> u32;

    fn encode(&mut self, face: &RgbImage) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
