use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Directory annotated group photos are archived under.
    pub archive_dir: PathBuf,
    /// Cosine similarity threshold for a positive identification.
    pub similarity_threshold: f32,
    /// Largest accepted enrollment batch.
    pub max_enroll_images: usize,
    /// Uploads are downscaled so their largest dimension is at most this.
    pub max_image_dim: u32,
    /// Whether annotated copies of group photos are written to disk.
    pub archive_enabled: bool,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("identities.db"));

        let archive_dir = std::env::var("ROLLCALL_ARCHIVE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("annotated"));

        Self {
            db_path,
            model_dir,
            archive_dir,
            similarity_threshold: env_f32("ROLLCALL_SIMILARITY_THRESHOLD", 0.40),
            max_enroll_images: env_usize("ROLLCALL_MAX_ENROLL_IMAGES", 16),
            max_image_dim: env_u32("ROLLCALL_MAX_IMAGE_DIM", rollcall_codec::MAX_IMAGE_DIM),
            archive_enabled: std::env::var("ROLLCALL_ARCHIVE_ENABLED")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }

    /// Path to the UltraFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace embedding model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
