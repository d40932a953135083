use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use walkdir::WalkDir;

use crate::error::VaultError;
use crate::library::{Gallery, Image};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "heic", "avif"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportProgress {
    pub current: usize,
    pub total: usize,
}

impl ImportProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let ratio = self.current.min(self.total) as f64 / self.total as f64;
        (ratio * 100.0).round() as u8
    }
}

pub trait ImportObserver {
    fn progress(&self, progress: ImportProgress);
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub skipped: Vec<PathBuf>,
}

/// Appends every image file under `dir` to `gallery`, in path order. Files
/// whose id is already in the gallery are skipped. With `key_prefix`, each
/// new image gets the remote key `<prefix>/<file name>`.
pub fn import_directory(
    gallery: &mut Gallery,
    dir: &Path,
    key_prefix: Option<&str>,
    observer: Option<&dyn ImportObserver>,
) -> Result<ImportReport, VaultError> {
    let files = collect_image_files(dir)?;
    let total = files.len();
    let mut known: HashSet<String> = gallery.images.iter().map(|img| img.id.clone()).collect();
    let mut report = ImportReport::default();

    for (idx, path) in files.into_iter().enumerate() {
        let id = path.to_string_lossy().into_owned();
        if known.insert(id.clone()) {
            let metadata = fs::metadata(&path).map_err(|source| VaultError::Io {
                path: path.clone(),
                source,
            })?;
            let date_added = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let file_name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            gallery.images.push(Image {
                id: id.clone(),
                pose_name: pose_name_from_path(&path),
                date_added: Some(date_added.to_rfc3339_opts(SecondsFormat::Millis, true)),
                remote_key: key_prefix
                    .map(|prefix| format!("{}/{}", prefix.trim_end_matches('/'), file_name)),
                ..Image::default()
            });
            report.added.push(id);
        } else {
            report.skipped.push(path);
        }

        if let Some(observer) = observer {
            observer.progress(ImportProgress {
                current: idx + 1,
                total,
            });
        }
    }

    Ok(report)
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_image_files(dir: &Path) -> Result<Vec<PathBuf>, VaultError> {
    if !dir.is_dir() {
        return Err(VaultError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_image_file(path))
        .collect();
    files.sort();
    Ok(files)
}

fn pose_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace(['-', '_'], " "))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use super::{import_directory, is_image_file, ImportObserver, ImportProgress};
    use crate::library::Gallery;

    struct Recorder {
        seen: RefCell<Vec<ImportProgress>>,
    }

    impl ImportObserver for Recorder {
        fn progress(&self, progress: ImportProgress) {
            self.seen.borrow_mut().push(progress);
        }
    }

    #[test]
    fn percent_rounds_and_handles_empty_totals() {
        assert_eq!(ImportProgress { current: 1, total: 3 }.percent(), 33);
        assert_eq!(ImportProgress { current: 2, total: 3 }.percent(), 67);
        assert_eq!(ImportProgress { current: 0, total: 0 }.percent(), 0);
        assert_eq!(ImportProgress { current: 4, total: 4 }.percent(), 100);
    }

    #[test]
    fn recognizes_image_extensions_case_insensitively() {
        assert!(is_image_file("a/B.JPG".as_ref()));
        assert!(is_image_file("pose.webp".as_ref()));
        assert!(!is_image_file("notes.txt".as_ref()));
        assert!(!is_image_file("noext".as_ref()));
    }

    #[test]
    fn import_adds_new_images_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b-pose.png"), b"x").unwrap();
        fs::write(dir.path().join("a_pose.jpg"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("c.webp"), b"x").unwrap();
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let mut gallery = Gallery::new(1, "Imported");
        let recorder = Recorder {
            seen: RefCell::new(Vec::new()),
        };
        let observer: &dyn ImportObserver = &recorder;
        let report =
            import_directory(&mut gallery, dir.path(), Some("users/u1/"), Some(observer)).unwrap();

        assert_eq!(report.added.len(), 3);
        assert_eq!(gallery.images[0].pose_name, "a pose");
        assert_eq!(gallery.images[1].pose_name, "b pose");
        assert_eq!(
            gallery.images[2].remote_key.as_deref(),
            Some("users/u1/c.webp")
        );
        assert!(gallery.images.iter().all(|img| img.date_added.is_some()));
        assert_eq!(
            recorder.seen.borrow().last().copied(),
            Some(ImportProgress { current: 3, total: 3 })
        );

        let again = import_directory(&mut gallery, dir.path(), None, None).unwrap();
        assert!(again.added.is_empty());
        assert_eq!(again.skipped.len(), 3);
        assert_eq!(gallery.images.len(), 3);
    }

    #[test]
    fn import_rejects_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut gallery = Gallery::new(1, "x");
        assert!(import_directory(&mut gallery, &dir.path().join("nope"), None, None).is_err());
    }
}
