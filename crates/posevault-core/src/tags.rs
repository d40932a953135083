use std::collections::BTreeSet;

use crate::library::Gallery;

/// Every tag used by a gallery or by any of its images, sorted.
pub fn all_tags(galleries: &[Gallery]) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for gallery in galleries {
        for image in &gallery.images {
            tags.extend(image.tags.iter().cloned());
        }
        tags.extend(gallery.tags.iter().cloned());
    }
    tags.into_iter().collect()
}

/// Tags assigned directly to galleries; image tags are not included.
pub fn gallery_own_tags(galleries: &[Gallery]) -> Vec<String> {
    galleries
        .iter()
        .flat_map(|gallery| gallery.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn image_tags_of_gallery(galleries: &[Gallery], gallery_id: u64) -> Vec<String> {
    let Some(gallery) = galleries.iter().find(|g| g.id == gallery_id) else {
        return Vec::new();
    };
    gallery
        .images
        .iter()
        .flat_map(|image| image.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
