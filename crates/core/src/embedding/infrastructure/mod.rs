pub mod arcface_encoder;
pub mod face_embedder;
pub mod onnx_session;
pub mod onnx_yolo_detector;
