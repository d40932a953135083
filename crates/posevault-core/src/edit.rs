use std::collections::HashSet;

use crate::library::{Image, Library};
use crate::sync::ImageMetadata;

#[derive(Clone, Debug, Default)]
pub struct ImageEdit {
    pub pose_name: Option<String>,
    pub notes: Option<String>,
    pub favorite: Option<bool>,
    pub set_tags: Option<Vec<String>>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub clear_tags: bool,
}

impl ImageEdit {
    pub fn touches_tags(&self) -> bool {
        self.clear_tags
            || self.set_tags.is_some()
            || !self.add_tags.is_empty()
            || !self.remove_tags.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.pose_name.is_none() && self.notes.is_none() && self.favorite.is_none() && !self.touches_tags()
    }

    pub fn apply(&self, image: &mut Image) {
        if let Some(name) = &self.pose_name {
            image.pose_name = name.clone();
        }
        if let Some(notes) = &self.notes {
            image.notes = notes.clone();
        }
        if let Some(favorite) = self.favorite {
            image.is_favorite = favorite;
        }
        edit_tags(
            &mut image.tags,
            self.clear_tags,
            self.set_tags.clone(),
            &self.add_tags,
            &self.remove_tags,
        );
    }

    /// The metadata to push after this edit was applied to `image`.
    pub fn metadata_for(&self, image: &Image) -> ImageMetadata {
        ImageMetadata {
            pose_name: self.pose_name.as_ref().map(|_| image.pose_name.clone()),
            notes: self.notes.as_ref().map(|_| image.notes.clone()),
            is_favorite: self.favorite.map(|_| image.is_favorite),
            tags: self.touches_tags().then(|| image.tags.clone()),
        }
    }
}

/// Changes applied to many galleries at once.
#[derive(Clone, Debug, Default)]
pub struct BulkGalleryEdit {
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub favorite: Option<bool>,
    pub private: Option<bool>,
}

impl BulkGalleryEdit {
    /// Applies the edit to every listed gallery and returns how many changed.
    pub fn apply(&self, library: &mut Library, gallery_ids: &[u64]) -> usize {
        let mut changed = 0;
        for gallery in library
            .galleries
            .iter_mut()
            .filter(|g| gallery_ids.contains(&g.id))
        {
            let before = gallery.clone();
            edit_tags(&mut gallery.tags, false, None, &self.add_tags, &self.remove_tags);
            if let Some(favorite) = self.favorite {
                gallery.is_favorite = favorite;
            }
            if let Some(private) = self.private {
                gallery.is_private = private;
            }
            if *gallery != before {
                changed += 1;
            }
        }
        changed
    }
}

fn edit_tags(
    tags: &mut Vec<String>,
    clear: bool,
    set: Option<Vec<String>>,
    add: &[String],
    remove: &[String],
) {
    if clear {
        tags.clear();
    }
    if let Some(set) = set {
        *tags = normalize_tags(set);
    }
    let mut seen: HashSet<String> = tags.iter().cloned().collect();
    for tag in normalize_tags(add.to_vec()) {
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    if !remove.is_empty() {
        let remove_set: HashSet<String> = normalize_tags(remove.to_vec()).into_iter().collect();
        tags.retain(|tag| !remove_set.contains(tag));
    }
}

/// Trims tags, drops empty ones and removes duplicates, keeping first occurrence.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized = Vec::new();
    let mut seen = HashSet::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.to_string()) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}
