//! ArcFace feature extractor using ONNX Runtime.
//!
//! Takes a 112x112 face crop, normalises pixels to `[-1, 1]` in NCHW layout
//! and returns the raw 512-d model output. Normalising the vector is left to
//! the caller.

use std::path::Path;

use image::RgbImage;

use crate::embedding::domain::face_encoder::FaceEncoder;

use super::onnx_session;

const INPUT_SIZE: u32 = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct ArcFaceEncoder {
    session: ort::session::Session,
}

impl ArcFaceEncoder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: onnx_session::open_session(model_path)?,
        })
    }
}

impl FaceEncoder for ArcFaceEncoder {
    fn input_size(&self) -> u32 {
        INPUT_SIZE
    }

    fn encode(&mut self, face: &RgbImage) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(to_tensor(face))?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;
        Ok(embedding_slice.to_vec())
    }
}

/// Normalise to [-1, 1], NCHW layout. Pixels outside the input square are
/// ignored and missing ones stay zero.
fn to_tensor(face: &RgbImage) -> ndarray::Array4<f32> {
    let size = INPUT_SIZE as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in face.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel.0[c] as f32 - NORM_MEAN) / NORM_STD;
        }
    }
    tensor
}
