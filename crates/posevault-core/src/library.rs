use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Image {
    /// Local source path or URL. Unique within a gallery.
    pub id: String,
    pub pose_name: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub is_cover: bool,
    pub date_added: Option<String>,
    /// Backend object path used to find the remote metadata row.
    pub remote_key: Option<String>,
    pub is_sample_image: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Gallery {
    pub id: u64,
    pub name: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub is_private: bool,
    pub images: Vec<Image>,
}

impl Gallery {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn cover(&self) -> Option<&Image> {
        self.images.iter().find(|img| img.is_cover)
    }

    pub fn image_mut(&mut self, image_id: &str) -> Option<&mut Image> {
        self.images.iter_mut().find(|img| img.id == image_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    pub galleries: Vec<Gallery>,
}

impl Library {
    /// Reads the library document. A missing file is an empty library.
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        match fs::read(path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|source| VaultError::Json {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(VaultError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), VaultError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| VaultError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let data = serde_json::to_vec_pretty(self).map_err(|source| VaultError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, data).map_err(|source| VaultError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn gallery(&self, id: u64) -> Option<&Gallery> {
        self.galleries.iter().find(|g| g.id == id)
    }

    pub fn gallery_mut(&mut self, id: u64) -> Option<&mut Gallery> {
        self.galleries.iter_mut().find(|g| g.id == id)
    }

    pub fn require_gallery_mut(&mut self, id: u64) -> Result<&mut Gallery, VaultError> {
        self.gallery_mut(id).ok_or(VaultError::GalleryNotFound { id })
    }

    pub fn next_gallery_id(&self) -> u64 {
        self.galleries.iter().map(|g| g.id).max().map_or(1, |id| id + 1)
    }

    /// Appends the gallery under a fresh id and returns that id.
    pub fn add_gallery(&mut self, mut gallery: Gallery) -> u64 {
        let id = self.next_gallery_id();
        gallery.id = id;
        self.galleries.push(gallery);
        id
    }

    pub fn remove_gallery(&mut self, id: u64) -> Option<Gallery> {
        let idx = self.galleries.iter().position(|g| g.id == id)?;
        Some(self.galleries.remove(idx))
    }

    pub fn remove_image(&mut self, gallery_id: u64, image_id: &str) -> Result<Image, VaultError> {
        let gallery = self.require_gallery_mut(gallery_id)?;
        let idx = gallery
            .images
            .iter()
            .position(|img| img.id == image_id)
            .ok_or_else(|| VaultError::ImageNotFound {
                gallery_id,
                image_id: image_id.to_string(),
            })?;
        Ok(gallery.images.remove(idx))
    }
}
