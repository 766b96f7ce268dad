pub const DETECTION_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTION_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Images are shrunk to fit this bound before embedding.
pub const THUMBNAIL_MAX_SIDE: u32 = 500;

/// Face crops are this many times the detected box's longer side.
pub const FACE_CROP_MARGIN: f64 = 1.2;

/// Prefix of every per-person output folder: `person_1`, `person_2`, ...
pub const BUCKET_PREFIX: &str = "person_";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const APP_DIR_NAME: &str = "FaceSort";
