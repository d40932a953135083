pub mod config;
pub mod edit;
pub mod error;
pub mod filter;
pub mod import;
pub mod library;
pub mod sample;
pub mod sync;
pub mod tags;

pub use config::VaultConfig;
pub use edit::{normalize_tags, BulkGalleryEdit, ImageEdit};
pub use error::VaultError;
pub use filter::{
    display_galleries, display_images, parse_date_added, DisplayOptions, FilterSortConfig, SortBy,
    TagFilterMode,
};
pub use import::{import_directory, ImportObserver, ImportProgress, ImportReport};
pub use library::{Gallery, Image, Library};
pub use sample::{sample_gallery, SAMPLE_GALLERY_NAME};
pub use sync::{
    filename_key, BatchEntry, BatchItem, BatchReport, ImageMetadata, MemoryRowStore, RemoteRow,
    RowFilter, RowStore, RowUpdate, SqliteRowStore, StoreError, SyncClient, SyncError, SyncLog,
    SyncReceipt, TracingLog,
};
pub use tags::{all_tags, gallery_own_tags, image_tags_of_gallery};
