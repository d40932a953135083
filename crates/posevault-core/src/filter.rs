use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::library::{Gallery, Image};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagFilterMode {
    /// Drop items carrying any selected tag.
    Exclude,
    /// Keep items carrying every selected tag. Unknown modes fall back here.
    #[default]
    #[serde(other)]
    Include,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Favorites,
    Name,
    NameDesc,
    DateAdded,
    DateAddedOldest,
    /// Any unrecognized key. Leaves items in their filtered order.
    #[serde(other)]
    Unsorted,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSortConfig {
    #[serde(deserialize_with = "null_as_default")]
    pub selected_tag_filters: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tag_filter_mode: TagFilterMode,
    #[serde(deserialize_with = "null_as_default")]
    pub show_favorites_only: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub search_term: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sort_by: SortBy,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FilterSortConfig {
    pub fn favorites_only(show: bool) -> Self {
        Self {
            show_favorites_only: show,
            ..Self::default()
        }
    }

    fn normalized_search(&self) -> Option<String> {
        let trimmed = self.search_term.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }
}

/// Gallery display options: the older boolean "favorites only" switch or a
/// full configuration. Both deserialize from the same JSON field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayOptions {
    FavoritesOnly(bool),
    Config(FilterSortConfig),
}

impl DisplayOptions {
    pub fn into_config(self) -> FilterSortConfig {
        match self {
            DisplayOptions::FavoritesOnly(show) => FilterSortConfig::favorites_only(show),
            DisplayOptions::Config(config) => config,
        }
    }
}

impl From<bool> for DisplayOptions {
    fn from(show: bool) -> Self {
        DisplayOptions::FavoritesOnly(show)
    }
}

impl From<FilterSortConfig> for DisplayOptions {
    fn from(config: FilterSortConfig) -> Self {
        DisplayOptions::Config(config)
    }
}

impl From<&FilterSortConfig> for DisplayOptions {
    fn from(config: &FilterSortConfig) -> Self {
        DisplayOptions::Config(config.clone())
    }
}

/// Fields shared by galleries and images that the filter stages look at.
trait Filterable {
    fn title(&self) -> &str;
    fn notes(&self) -> &str;
    fn tags(&self) -> &[String];
    fn is_favorite(&self) -> bool;
}

impl Filterable for Gallery {
    fn title(&self) -> &str {
        &self.name
    }
    fn notes(&self) -> &str {
        &self.notes
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn is_favorite(&self) -> bool {
        self.is_favorite
    }
}

impl Filterable for Image {
    fn title(&self) -> &str {
        &self.pose_name
    }
    fn notes(&self) -> &str {
        &self.notes
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn is_favorite(&self) -> bool {
        self.is_favorite
    }
}

pub fn display_galleries<'a>(
    galleries: &'a [Gallery],
    options: impl Into<DisplayOptions>,
) -> Vec<&'a Gallery> {
    let config = options.into().into_config();
    let mut shown = apply_filters(galleries.iter().collect::<Vec<_>>(), &config);

    match config.sort_by {
        // Galleries carry no timestamp; dateAdded has always meant favorites-first here.
        SortBy::Favorites | SortBy::DateAdded => shown.sort_by(|a, b| favorites_first(*a, *b)),
        SortBy::Name => shown.sort_by(|a, b| locale_cmp(&a.name, &b.name)),
        SortBy::NameDesc => shown.sort_by(|a, b| locale_cmp(&b.name, &a.name)),
        SortBy::DateAddedOldest | SortBy::Unsorted => {}
    }
    shown
}

pub fn display_images<'a>(gallery: Option<&'a Gallery>, config: &FilterSortConfig) -> Vec<&'a Image> {
    let Some(gallery) = gallery else {
        return Vec::new();
    };
    let browsable: Vec<&Image> = gallery.images.iter().filter(|img| !img.is_cover).collect();
    let mut shown = apply_filters(browsable, config);

    match config.sort_by {
        SortBy::Favorites => shown.sort_by(|a, b| favorites_first(*a, *b)),
        SortBy::DateAdded => sort_by_date(&mut shown, true),
        SortBy::DateAddedOldest => sort_by_date(&mut shown, false),
        SortBy::Name | SortBy::NameDesc | SortBy::Unsorted => {}
    }
    shown
}

fn apply_filters<'a, T: Filterable>(mut items: Vec<&'a T>, config: &FilterSortConfig) -> Vec<&'a T> {
    if let Some(term) = config.normalized_search() {
        items.retain(|item| matches_search(*item, &term));
    }
    if !config.selected_tag_filters.is_empty() {
        items.retain(|item| {
            matches_tag_filter(item.tags(), &config.selected_tag_filters, config.tag_filter_mode)
        });
    }
    if config.show_favorites_only {
        items.retain(|item| item.is_favorite());
    }
    items
}

/// `term` must already be trimmed and lowercased.
fn matches_search<T: Filterable>(item: &T, term: &str) -> bool {
    item.title().to_lowercase().contains(term)
        || item
            .tags()
            .iter()
            .any(|tag| tag.to_lowercase().contains(term))
        || item.notes().to_lowercase().contains(term)
}

pub fn matches_tag_filter(tags: &[String], selected: &[String], mode: TagFilterMode) -> bool {
    match mode {
        TagFilterMode::Include => selected.iter().all(|tag| tags.contains(tag)),
        TagFilterMode::Exclude => !selected.iter().any(|tag| tags.contains(tag)),
    }
}

fn favorites_first<T: Filterable>(a: &T, b: &T) -> Ordering {
    b.is_favorite().cmp(&a.is_favorite())
}

/// Ordering on base letters, ignoring accents and case. Ties go to the
/// unaccented form, then to the lowercase form.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| b.cmp(a))
}

fn collation_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn sort_by_date(images: &mut Vec<&Image>, newest_first: bool) {
    let mut keyed: Vec<(Option<DateTime<Utc>>, &Image)> = images
        .iter()
        .map(|img| (img.date_added.as_deref().and_then(parse_date_added), *img))
        .collect();
    // None orders before every Some, so unparsable dates count as the earliest.
    if newest_first {
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
    } else {
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
    }
    *images = keyed.into_iter().map(|(_, img)| img).collect();
}

pub fn parse_date_added(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = raw.parse::<i64>() {
        return unix_timestamp(ts);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn unix_timestamp(ts: i64) -> Option<DateTime<Utc>> {
    let (seconds, nanos) = if ts.unsigned_abs() >= 1_000_000_000_000 {
        let seconds = ts.div_euclid(1000);
        let millis = ts.rem_euclid(1000) as u32;
        (seconds, millis * 1_000_000)
    } else {
        (ts, 0)
    };
    Utc.timestamp_opt(seconds, nanos).single()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        display_galleries, display_images, locale_cmp, parse_date_added, DisplayOptions,
        FilterSortConfig, SortBy, TagFilterMode,
    };
    use crate::library::{Gallery, Image};

    fn gallery(id: u64, name: &str, tags: &[&str], favorite: bool) -> Gallery {
        Gallery {
            id,
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_favorite: favorite,
            ..Gallery::default()
        }
    }

    fn image(id: &str, date: Option<&str>, favorite: bool) -> Image {
        Image {
            id: id.to_string(),
            pose_name: id.to_string(),
            date_added: date.map(str::to_string),
            is_favorite: favorite,
            ..Image::default()
        }
    }

    fn ids(galleries: &[&Gallery]) -> Vec<u64> {
        galleries.iter().map(|g| g.id).collect()
    }

    fn image_ids(images: &[&Image]) -> Vec<String> {
        images.iter().map(|img| img.id.clone()).collect()
    }

    fn tag_config(tags: &[&str], mode: TagFilterMode) -> FilterSortConfig {
        FilterSortConfig {
            selected_tag_filters: tags.iter().map(|t| t.to_string()).collect(),
            tag_filter_mode: mode,
            ..FilterSortConfig::default()
        }
    }

    #[test]
    fn include_mode_requires_every_selected_tag() {
        let galleries = vec![
            gallery(1, "abc", &["A", "B", "C"], false),
            gallery(2, "a", &["A"], false),
            gallery(3, "none", &[], false),
        ];
        let shown = display_galleries(&galleries, tag_config(&["A", "B"], TagFilterMode::Include));
        assert_eq!(ids(&shown), vec![1]);
    }

    #[test]
    fn exclude_mode_drops_any_selected_tag() {
        let galleries = vec![
            gallery(1, "a", &["A"], false),
            gallery(2, "c", &["C"], false),
            gallery(3, "none", &[], false),
        ];
        let shown = display_galleries(&galleries, tag_config(&["A", "B"], TagFilterMode::Exclude));
        assert_eq!(ids(&shown), vec![2, 3]);
    }

    #[test]
    fn tag_filters_are_case_sensitive() {
        let galleries = vec![gallery(1, "a", &["family"], false)];
        let shown = display_galleries(&galleries, tag_config(&["Family"], TagFilterMode::Include));
        assert!(shown.is_empty());
    }

    #[test]
    fn search_is_case_insensitive_across_name_tags_and_notes() {
        let mut by_notes = gallery(3, "Beach", &[], false);
        by_notes.notes = "Golden hour FAMILY shoot".to_string();
        let galleries = vec![
            gallery(1, "Family Gallery", &[], false),
            gallery(2, "Studio", &["families"], false),
            by_notes,
            gallery(4, "Solo", &["portrait"], false),
        ];
        let config = FilterSortConfig {
            search_term: "  fam ".to_string(),
            ..FilterSortConfig::default()
        };
        assert_eq!(ids(&display_galleries(&galleries, config)), vec![1, 2, 3]);
    }

    #[test]
    fn favorites_sort_is_stable_within_groups() {
        let galleries = vec![
            gallery(1, "a", &[], false),
            gallery(2, "b", &[], true),
            gallery(3, "c", &[], false),
            gallery(4, "d", &[], true),
        ];
        let shown = display_galleries(&galleries, FilterSortConfig::default());
        assert_eq!(ids(&shown), vec![2, 4, 1, 3]);

        let legacy_date = FilterSortConfig {
            sort_by: SortBy::DateAdded,
            ..FilterSortConfig::default()
        };
        assert_eq!(ids(&display_galleries(&galleries, legacy_date)), vec![2, 4, 1, 3]);
    }

    #[test]
    fn name_sorts_ignore_case() {
        let galleries = vec![
            gallery(1, "banana", &[], false),
            gallery(2, "Apple", &[], false),
            gallery(3, "cherry", &[], true),
        ];
        let asc = FilterSortConfig {
            sort_by: SortBy::Name,
            ..FilterSortConfig::default()
        };
        assert_eq!(ids(&display_galleries(&galleries, &asc)), vec![2, 1, 3]);

        let desc = FilterSortConfig {
            sort_by: SortBy::NameDesc,
            ..FilterSortConfig::default()
        };
        assert_eq!(ids(&display_galleries(&galleries, desc)), vec![3, 1, 2]);
    }

    #[test]
    fn locale_cmp_puts_lowercase_first_on_case_ties() {
        assert_eq!(locale_cmp("a", "A"), std::cmp::Ordering::Less);
        assert_eq!(locale_cmp("Zed", "alpha"), std::cmp::Ordering::Greater);
    }

    #[test]
    fn name_sort_places_accented_names_with_their_base_letter() {
        let galleries = vec![
            gallery(1, "Fam", &[], false),
            gallery(2, "Élan", &[], false),
            gallery(3, "Ember", &[], false),
        ];
        let asc = FilterSortConfig {
            sort_by: SortBy::Name,
            ..FilterSortConfig::default()
        };
        assert_eq!(ids(&display_galleries(&galleries, asc)), vec![2, 3, 1]);

        assert_eq!(locale_cmp("e", "é"), std::cmp::Ordering::Less);
        assert_eq!(locale_cmp("é", "É"), std::cmp::Ordering::Less);
        assert_eq!(locale_cmp("Zoë", "zoe"), std::cmp::Ordering::Greater);
    }

    #[test]
    fn legacy_boolean_matches_favorites_only_config() {
        let galleries = vec![
            gallery(1, "a", &[], false),
            gallery(2, "b", &[], true),
            gallery(3, "c", &[], true),
        ];
        let legacy = display_galleries(&galleries, true);
        let config = display_galleries(&galleries, FilterSortConfig::favorites_only(true));
        assert_eq!(ids(&legacy), vec![2, 3]);
        assert_eq!(legacy, config);
    }

    #[test]
    fn display_options_deserialize_from_bool_or_object() {
        let legacy: DisplayOptions = serde_json::from_str("true").unwrap();
        assert_eq!(legacy.into_config(), FilterSortConfig::favorites_only(true));

        let config: DisplayOptions = serde_json::from_str(
            r#"{"selectedTagFilters":["x"],"tagFilterMode":"exclude","sortBy":"nameDesc"}"#,
        )
        .unwrap();
        let config = config.into_config();
        assert_eq!(config.tag_filter_mode, TagFilterMode::Exclude);
        assert_eq!(config.sort_by, SortBy::NameDesc);
        assert!(!config.show_favorites_only);
    }

    #[test]
    fn unknown_sort_key_leaves_order_untouched() {
        let options: DisplayOptions = serde_json::from_str(r#"{"sortBy":"random"}"#).unwrap();
        let config = options.into_config();
        assert_eq!(config.sort_by, SortBy::Unsorted);

        let galleries = vec![
            gallery(1, "b", &[], false),
            gallery(2, "a", &[], true),
        ];
        assert_eq!(ids(&display_galleries(&galleries, &config)), vec![1, 2]);

        let g = Gallery {
            images: vec![
                image("old", Some("2023-01-01"), false),
                image("new", Some("2024-01-01"), true),
            ],
            ..Gallery::default()
        };
        assert_eq!(image_ids(&display_images(Some(&g), &config)), vec!["old", "new"]);
    }

    #[test]
    fn null_config_fields_fall_back_to_defaults() {
        let options: DisplayOptions = serde_json::from_str(
            r#"{"searchTerm":null,"selectedTagFilters":null,"tagFilterMode":null,"showFavoritesOnly":null,"sortBy":null}"#,
        )
        .unwrap();
        assert_eq!(options.into_config(), FilterSortConfig::default());

        let options: DisplayOptions =
            serde_json::from_str(r#"{"tagFilterMode":"sideways","searchTerm":"x"}"#).unwrap();
        let config = options.into_config();
        assert_eq!(config.tag_filter_mode, TagFilterMode::Include);
        assert_eq!(config.search_term, "x");
    }

    #[test]
    fn display_is_repeatable_and_leaves_input_untouched() {
        let galleries = vec![
            gallery(1, "b", &["x"], false),
            gallery(2, "a", &["x"], true),
        ];
        let before = galleries.clone();
        let config = FilterSortConfig {
            sort_by: SortBy::Name,
            ..FilterSortConfig::default()
        };
        let first = display_galleries(&galleries, &config);
        let second = display_galleries(&galleries, &config);
        assert_eq!(first, second);
        assert_eq!(galleries, before);
    }

    #[test]
    fn images_never_include_covers() {
        let mut cover = image("cover", Some("2024-01-01"), true);
        cover.is_cover = true;
        let g = Gallery {
            images: vec![cover, image("p1", None, false), image("p2", None, true)],
            ..Gallery::default()
        };
        for sort_by in [
            SortBy::Favorites,
            SortBy::Name,
            SortBy::NameDesc,
            SortBy::DateAdded,
            SortBy::DateAddedOldest,
        ] {
            let config = FilterSortConfig {
                sort_by,
                ..FilterSortConfig::default()
            };
            let shown = display_images(Some(&g), &config);
            assert!(shown.iter().all(|img| !img.is_cover));
            assert_eq!(shown.len(), 2);
        }
    }

    #[test]
    fn no_gallery_shows_no_images() {
        assert!(display_images(None, &FilterSortConfig::default()).is_empty());
    }

    #[test]
    fn date_sort_treats_invalid_dates_as_earliest() {
        let g = Gallery {
            images: vec![
                image("jan", Some("2024-01-01"), false),
                image("bad", Some("not a date"), false),
                image("jun", Some("2024-06-01"), false),
            ],
            ..Gallery::default()
        };
        let newest = FilterSortConfig {
            sort_by: SortBy::DateAdded,
            ..FilterSortConfig::default()
        };
        assert_eq!(image_ids(&display_images(Some(&g), &newest)), vec!["jun", "jan", "bad"]);

        let extreme = Gallery {
            images: vec![
                image("jan", Some("2024-01-01"), false),
                image("min", Some("-9223372036854775808"), false),
                image("max", Some("9223372036854775807"), false),
            ],
            ..Gallery::default()
        };
        assert_eq!(
            image_ids(&display_images(Some(&extreme), &newest)),
            vec!["jan", "min", "max"]
        );

        let oldest = FilterSortConfig {
            sort_by: SortBy::DateAddedOldest,
            ..FilterSortConfig::default()
        };
        assert_eq!(image_ids(&display_images(Some(&g), &oldest)), vec!["bad", "jan", "jun"]);
    }

    #[test]
    fn name_sort_keeps_image_order() {
        let g = Gallery {
            images: vec![image("b", None, false), image("a", None, true)],
            ..Gallery::default()
        };
        let config = FilterSortConfig {
            sort_by: SortBy::Name,
            ..FilterSortConfig::default()
        };
        assert_eq!(image_ids(&display_images(Some(&g), &config)), vec!["b", "a"]);
    }

    #[test]
    fn image_filters_run_before_sorting() {
        let mut tagged = image("tagged", Some("2024-03-01"), true);
        tagged.tags = vec!["sitting".to_string()];
        tagged.notes = "Mom holding baby".to_string();
        let mut other = image("other", Some("2024-04-01"), true);
        other.tags = vec!["standing".to_string()];
        let g = Gallery {
            images: vec![other, tagged, image("plain", Some("2024-05-01"), false)],
            ..Gallery::default()
        };
        let config = FilterSortConfig {
            selected_tag_filters: vec!["standing".to_string()],
            tag_filter_mode: TagFilterMode::Exclude,
            show_favorites_only: true,
            search_term: "BABY".to_string(),
            sort_by: SortBy::DateAdded,
        };
        assert_eq!(image_ids(&display_images(Some(&g), &config)), vec!["tagged"]);
    }

    #[test]
    fn parse_date_added_accepts_common_forms() {
        let midnight = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date_added("2024-06-01"), Some(midnight));
        assert_eq!(parse_date_added("2024-06-01T00:00:00.000Z"), Some(midnight));
        assert_eq!(parse_date_added("2024-06-01 00:00:00"), Some(midnight));
        assert_eq!(parse_date_added("1717200000"), Some(midnight));
        assert_eq!(parse_date_added("1717200000000"), Some(midnight));
        assert_eq!(parse_date_added("yesterday"), None);
        assert_eq!(parse_date_added("  "), None);
    }
}
