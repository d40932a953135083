//! The "Sample Family Gallery" given to new users for the tutorial.
//!
//! Images provided courtesy of Arthur AG @Creative Prints Shelf
//! <https://www.etsy.com/shop/CreativePrintsShelf>

use chrono::{DateTime, SecondsFormat, Utc};

use crate::library::{Gallery, Image};

pub const SAMPLE_GALLERY_NAME: &str = "Sample Family Gallery";

const ATTRIBUTION_NOTE: &str = "This is a sample Family Pose image. Photo provided courtesy of Arthur AG @Creative Prints Shelf - https://www.etsy.com/shop/CreativePrintsShelf";

const GALLERY_ATTRIBUTION: &str = "This is a sample gallery of Family Poses. Cover photo provided courtesy of Arthur AG @Creative Prints Shelf - https://www.etsy.com/shop/CreativePrintsShelf";

const COVER_PATH: &str = "/sample-gallery/cover.webp";
const COVER_TAGS: &[&str] = &["sample", "family", "group", "man", "woman", "children", "baby"];

const POSES: &[(&str, &str, &[&str])] = &[
    (
        "/sample-gallery/pose-01.webp",
        "Sample Family Pose - 01",
        &["sample", "family", "group", "man", "woman", "children", "half-body"],
    ),
    (
        "/sample-gallery/pose-02.webp",
        "Sample Family Pose - 02",
        &["sample", "family", "group", "man", "woman", "child", "baby", "sitting", "full-body"],
    ),
    (
        "/sample-gallery/pose-03.webp",
        "Sample Family Pose - 03",
        &["sample", "family", "group", "man", "woman", "child", "kneeling", "full-body", "kissing"],
    ),
    (
        "/sample-gallery/pose-04.webp",
        "Sample Family Pose - 04",
        &["sample", "family", "man", "child", "kneeling", "full-body"],
    ),
    (
        "/sample-gallery/pose-05.webp",
        "Sample Family Pose - 05",
        &["sample", "family", "group", "man", "woman", "children", "half-body"],
    ),
];

/// Builds the sample gallery. Its images are served as static files, carry
/// no remote key and are flagged so they are never synced.
pub fn sample_gallery(now: DateTime<Utc>) -> Gallery {
    let date_added = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut images = Vec::with_capacity(POSES.len() + 1);
    images.push(Image {
        id: COVER_PATH.to_string(),
        tags: to_strings(COVER_TAGS),
        is_cover: true,
        date_added: Some(date_added.clone()),
        is_sample_image: true,
        ..Image::default()
    });
    images.extend(POSES.iter().map(|(path, pose_name, tags)| Image {
        id: path.to_string(),
        pose_name: pose_name.to_string(),
        notes: ATTRIBUTION_NOTE.to_string(),
        tags: to_strings(tags),
        date_added: Some(date_added.clone()),
        is_sample_image: true,
        ..Image::default()
    }));

    Gallery {
        id: 0,
        name: SAMPLE_GALLERY_NAME.to_string(),
        notes: GALLERY_ATTRIBUTION.to_string(),
        tags: to_strings(&["sample", "family"]),
        is_favorite: false,
        is_private: false,
        images,
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
