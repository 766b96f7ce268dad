pub mod embedding_source;
pub mod face_detector;
pub mod face_encoder;
