use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum VaultError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("gallery {id} not found")]
    GalleryNotFound { id: u64 },
    #[error("image {image_id} not found in gallery {gallery_id}")]
    ImageNotFound { gallery_id: u64, image_id: String },
}
