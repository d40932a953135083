use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use posevault_core::{
    all_tags, display_galleries, display_images, filename_key, gallery_own_tags,
    image_tags_of_gallery, import_directory, sample_gallery, BatchItem, BulkGalleryEdit,
    FilterSortConfig, Gallery, ImageEdit, ImageMetadata, ImportObserver, ImportProgress, Library,
    SortBy, SqliteRowStore, SyncClient, SyncError, TagFilterMode, VaultConfig,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "posevaultctl", version, about = "CLI tools for PoseVault")]
struct Cli {
    /// Library JSON file
    #[arg(long, short)]
    library: Option<PathBuf>,

    /// Local replica of the remote images table
    #[arg(long)]
    replica: Option<PathBuf>,

    /// Owner id for remote rows (defaults to $POSEVAULT_USER)
    #[arg(long, short)]
    user: Option<String>,

    /// Only log warnings and errors
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List galleries after search, tag and favorite filters
    Galleries {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the images of one gallery (cover excluded)
    Images {
        gallery: u64,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Show available tags
    Tags {
        /// Only image tags of this gallery
        #[arg(long, conflicts_with = "gallery_only")]
        gallery: Option<u64>,
        /// Only tags assigned to galleries themselves
        #[arg(long)]
        gallery_only: bool,
    },
    /// Create an empty gallery
    New {
        name: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        private: bool,
    },
    /// Add the sample family gallery
    Seed,
    /// Add image files from a directory to a gallery
    Import {
        gallery: u64,
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,
        /// Storage key prefix; enables sync for the imported images
        #[arg(long)]
        key_prefix: Option<String>,
    },
    /// Edit one image and push the change
    Edit {
        gallery: u64,
        image: String,
        #[arg(long)]
        pose_name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        favorite: Option<bool>,
        #[arg(long = "set-tag")]
        set_tags: Vec<String>,
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        #[arg(long = "remove-tag")]
        remove_tags: Vec<String>,
        #[arg(long)]
        clear_tags: bool,
        /// Keep the change local
        #[arg(long)]
        no_sync: bool,
    },
    /// Remove an image and soft-delete its remote row
    Delete {
        gallery: u64,
        image: String,
        #[arg(long)]
        no_sync: bool,
    },
    /// Edit several galleries at once
    Bulk {
        #[arg(required = true)]
        galleries: Vec<u64>,
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        #[arg(long = "remove-tag")]
        remove_tags: Vec<String>,
        #[arg(long)]
        favorite: Option<bool>,
        #[arg(long)]
        private: Option<bool>,
    },
    /// Push metadata of every syncable image
    Push {
        /// Limit to one gallery
        gallery: Option<u64>,
    },
    /// Generate shell completion script
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Case-insensitive substring of name, tags or notes
    #[arg(long, short)]
    search: Option<String>,
    /// Tag filter (can be repeated or comma separated)
    #[arg(long = "tag", short)]
    tags: Vec<String>,
    /// Drop items carrying any selected tag instead of requiring all
    #[arg(long)]
    exclude: bool,
    /// Only favorites
    #[arg(long, short)]
    favorites: bool,
    #[arg(long, value_enum, default_value = "favorites")]
    sort: SortArg,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum SortArg {
    #[default]
    Favorites,
    Name,
    NameDesc,
    DateAdded,
    DateAddedOldest,
}

impl FilterArgs {
    fn to_config(&self) -> FilterSortConfig {
        FilterSortConfig {
            selected_tag_filters: flatten_tag_args(self.tags.clone()),
            tag_filter_mode: if self.exclude {
                TagFilterMode::Exclude
            } else {
                TagFilterMode::Include
            },
            show_favorites_only: self.favorites,
            search_term: self.search.clone().unwrap_or_default(),
            sort_by: match self.sort {
                SortArg::Favorites => SortBy::Favorites,
                SortArg::Name => SortBy::Name,
                SortArg::NameDesc => SortBy::NameDesc,
                SortArg::DateAdded => SortBy::DateAdded,
                SortArg::DateAddedOldest => SortBy::DateAddedOldest,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let mut config = VaultConfig::default();
    if let Some(path) = cli.library.clone() {
        config = config.with_library(path);
    }
    if let Some(path) = cli.replica.clone() {
        config = config.with_replica(path);
    }
    if let Some(user) = cli.user.clone() {
        config = config.with_user(user);
    }

    match cli.command {
        Commands::Galleries { filters, json } => galleries_command(&config, &filters, json),
        Commands::Images {
            gallery,
            filters,
            json,
        } => images_command(&config, gallery, &filters, json),
        Commands::Tags {
            gallery,
            gallery_only,
        } => tags_command(&config, gallery, gallery_only),
        Commands::New {
            name,
            notes,
            tags,
            private,
        } => new_command(&config, name, notes, tags, private),
        Commands::Seed => seed_command(&config),
        Commands::Import {
            gallery,
            dir,
            key_prefix,
        } => import_command(&config, gallery, &dir, key_prefix, cli.quiet),
        Commands::Edit {
            gallery,
            image,
            pose_name,
            notes,
            favorite,
            set_tags,
            add_tags,
            remove_tags,
            clear_tags,
            no_sync,
        } => {
            let edit = ImageEdit {
                pose_name,
                notes,
                favorite,
                set_tags: normalize_tag_args(set_tags),
                add_tags: flatten_tag_args(add_tags),
                remove_tags: flatten_tag_args(remove_tags),
                clear_tags,
            };
            edit_command(&config, gallery, &image, edit, no_sync).await
        }
        Commands::Delete {
            gallery,
            image,
            no_sync,
        } => delete_command(&config, gallery, &image, no_sync).await,
        Commands::Bulk {
            galleries,
            add_tags,
            remove_tags,
            favorite,
            private,
        } => {
            let edit = BulkGalleryEdit {
                add_tags: flatten_tag_args(add_tags),
                remove_tags: flatten_tag_args(remove_tags),
                favorite,
                private,
            };
            bulk_command(&config, &galleries, edit)
        }
        Commands::Push { gallery } => push_command(&config, gallery, cli.quiet).await,
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn init_tracing(quiet: bool) {
    let fallback = if quiet {
        "warn"
    } else {
        "posevaultctl=info,posevault_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_library(config: &VaultConfig) -> Result<Library> {
    Library::load(&config.library_path)
        .with_context(|| format!("failed to load {}", config.library_path.display()))
}

fn save_library(config: &VaultConfig, library: &Library) -> Result<()> {
    library
        .save(&config.library_path)
        .with_context(|| format!("failed to save {}", config.library_path.display()))
}

fn galleries_command(config: &VaultConfig, filters: &FilterArgs, json: bool) -> Result<()> {
    let library = load_library(config)?;
    let shown = display_galleries(&library.galleries, filters.to_config());

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }
    if shown.is_empty() {
        println!("No galleries.");
        return Ok(());
    }
    for gallery in shown {
        println!("{}", gallery_line(gallery));
    }
    Ok(())
}

fn images_command(config: &VaultConfig, gallery_id: u64, filters: &FilterArgs, json: bool) -> Result<()> {
    let library = load_library(config)?;
    let gallery = library
        .gallery(gallery_id)
        .ok_or_else(|| anyhow!("gallery not found: {gallery_id}"))?;
    let shown = display_images(Some(gallery), &filters.to_config());

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }
    if shown.is_empty() {
        println!("No images.");
        return Ok(());
    }
    for image in shown {
        let marker = if image.is_favorite { "*" } else { " " };
        let name = if image.pose_name.is_empty() {
            "(untitled)"
        } else {
            image.pose_name.as_str()
        };
        println!(
            "{marker} {name}  [{}]  {}  {}",
            image.tags.join(" "),
            image.date_added.as_deref().unwrap_or("(no date)"),
            image.id
        );
    }
    Ok(())
}

fn tags_command(config: &VaultConfig, gallery: Option<u64>, gallery_only: bool) -> Result<()> {
    let library = load_library(config)?;
    let tags = match gallery {
        Some(id) => image_tags_of_gallery(&library.galleries, id),
        None if gallery_only => gallery_own_tags(&library.galleries),
        None => all_tags(&library.galleries),
    };
    if tags.is_empty() {
        println!("(none)");
    } else {
        for tag in tags {
            println!("{tag}");
        }
    }
    Ok(())
}

fn new_command(
    config: &VaultConfig,
    name: String,
    notes: String,
    tags: Vec<String>,
    private: bool,
) -> Result<()> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("gallery name must not be empty"));
    }
    let mut library = load_library(config)?;
    let mut gallery = Gallery::new(0, name);
    gallery.notes = notes;
    gallery.tags = flatten_tag_args(tags);
    gallery.is_private = private;
    let id = library.add_gallery(gallery);
    save_library(config, &library)?;
    println!("Created gallery {id}");
    Ok(())
}

fn seed_command(config: &VaultConfig) -> Result<()> {
    let mut library = load_library(config)?;
    let id = library.add_gallery(sample_gallery(Utc::now()));
    save_library(config, &library)?;
    info!(gallery = id, "added sample gallery");
    println!("Created gallery {id}");
    Ok(())
}

fn import_command(
    config: &VaultConfig,
    gallery_id: u64,
    dir: &Path,
    key_prefix: Option<String>,
    quiet: bool,
) -> Result<()> {
    let mut library = load_library(config)?;
    let gallery = library
        .gallery_mut(gallery_id)
        .ok_or_else(|| anyhow!("gallery not found: {gallery_id}"))?;

    let progress = if !quiet && std::io::stderr().is_terminal() {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")?
                .progress_chars("=>-"),
        );
        pb.set_message("importing");
        Some(ImportBar { pb })
    } else {
        None
    };

    let report = import_directory(
        gallery,
        dir,
        key_prefix.as_deref(),
        progress.as_ref().map(|bar| bar as &dyn ImportObserver),
    )
    .with_context(|| format!("failed to import {}", dir.display()))?;
    if let Some(bar) = &progress {
        bar.pb.finish_and_clear();
    }

    let new_keys: Vec<String> = gallery
        .images
        .iter()
        .filter(|img| report.added.contains(&img.id))
        .filter_map(|img| img.remote_key.clone())
        .collect();
    save_library(config, &library)?;

    if let Some(user_id) = &config.user_id {
        if !new_keys.is_empty() {
            let store = open_replica(config)?;
            for key in &new_keys {
                store
                    .insert_row(user_id, filename_key(key))
                    .with_context(|| format!("failed to register {key}"))?;
            }
            info!(rows = new_keys.len(), "registered imported images in replica");
        }
    }

    println!(
        "Added {} image(s), skipped {} already present.",
        report.added.len(),
        report.skipped.len()
    );
    Ok(())
}

async fn edit_command(
    config: &VaultConfig,
    gallery_id: u64,
    image_id: &str,
    edit: ImageEdit,
    no_sync: bool,
) -> Result<()> {
    if edit.is_empty() {
        return Err(anyhow!("nothing to edit"));
    }

    let mut library = load_library(config)?;
    let gallery = library.require_gallery_mut(gallery_id)?;
    let image = gallery
        .image_mut(image_id)
        .ok_or_else(|| anyhow!("image not found in gallery {gallery_id}: {image_id}"))?;
    edit.apply(image);
    let metadata = edit.metadata_for(image);
    let remote_key = syncable_key(image.remote_key.as_deref(), image.is_sample_image);
    save_library(config, &library)?;
    println!("Updated: {image_id}");

    if no_sync {
        return Ok(());
    }
    let (Some(key), Some(user_id)) = (remote_key, config.user_id.as_deref()) else {
        return Ok(());
    };
    let client = SyncClient::new(open_replica(config)?);
    report_sync(client.sync_metadata(&key, &metadata, user_id).await, &key);
    Ok(())
}

async fn delete_command(config: &VaultConfig, gallery_id: u64, image_id: &str, no_sync: bool) -> Result<()> {
    let mut library = load_library(config)?;
    let image = library.remove_image(gallery_id, image_id)?;
    save_library(config, &library)?;
    println!("Removed: {image_id}");

    if no_sync {
        return Ok(());
    }
    let remote_key = syncable_key(image.remote_key.as_deref(), image.is_sample_image);
    let (Some(key), Some(user_id)) = (remote_key, config.user_id.as_deref()) else {
        return Ok(());
    };
    let client = SyncClient::new(open_replica(config)?);
    report_sync(client.sync_deletion(&key, user_id).await, &key);
    Ok(())
}

fn bulk_command(config: &VaultConfig, gallery_ids: &[u64], edit: BulkGalleryEdit) -> Result<()> {
    let mut library = load_library(config)?;
    for id in gallery_ids {
        if library.gallery(*id).is_none() {
            return Err(anyhow!("gallery not found: {id}"));
        }
    }
    let changed = edit.apply(&mut library, gallery_ids);
    if changed > 0 {
        save_library(config, &library)?;
        println!("Updated {changed} gallery(ies).");
    } else {
        println!("No changes.");
    }
    Ok(())
}

async fn push_command(config: &VaultConfig, gallery: Option<u64>, quiet: bool) -> Result<()> {
    let user_id = config
        .user_id
        .as_deref()
        .ok_or_else(|| anyhow!("push requires --user or $POSEVAULT_USER"))?;
    let library = load_library(config)?;
    if let Some(id) = gallery {
        if library.gallery(id).is_none() {
            return Err(anyhow!("gallery not found: {id}"));
        }
    }

    let items: Vec<BatchItem> = library
        .galleries
        .iter()
        .filter(|g| gallery.map_or(true, |id| g.id == id))
        .flat_map(|g| g.images.iter())
        .filter_map(|img| {
            let key = syncable_key(img.remote_key.as_deref(), img.is_sample_image)?;
            Some(BatchItem {
                storage_key: key,
                metadata: ImageMetadata {
                    pose_name: Some(img.pose_name.clone()),
                    notes: Some(img.notes.clone()),
                    is_favorite: Some(img.is_favorite),
                    tags: None,
                },
            })
        })
        .collect();
    if items.is_empty() {
        println!("Nothing to push.");
        return Ok(());
    }

    let client = SyncClient::new(open_replica(config)?);
    let spinner = if !quiet && std::io::stderr().is_terminal() {
        let sp = ProgressBar::new_spinner();
        sp.set_message(format!("pushing {} image(s)", items.len()));
        sp.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(sp)
    } else {
        None
    };
    let report = client.batch_sync(&items, user_id).await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    let mut failed = 0;
    for entry in &report.results {
        if let Err(err) = &entry.result {
            failed += 1;
            eprintln!("warning: {}: {err}", entry.storage_key);
        }
    }
    println!("Pushed {} of {} image(s).", report.results.len() - failed, report.results.len());
    if !report.all_ok {
        return Err(anyhow!("{failed} image(s) failed to sync"));
    }
    Ok(())
}

fn open_replica(config: &VaultConfig) -> Result<SqliteRowStore> {
    SqliteRowStore::open(&config.replica_path)
        .with_context(|| format!("failed to open replica {}", config.replica_path.display()))
}

/// Sample images are served statically and have no remote row.
fn syncable_key(remote_key: Option<&str>, is_sample: bool) -> Option<String> {
    if is_sample {
        return None;
    }
    remote_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

/// Sync failures never fail a local edit.
fn report_sync<T>(result: Result<T, SyncError>, key: &str) {
    match result {
        Ok(_) => info!(key, "synced"),
        Err(SyncError::NoMatchingRow { filename }) => {
            warn!(key, "no remote row for {filename}; change kept locally")
        }
        Err(err) if err.is_retryable() => warn!(key, "sync failed, retry later: {err}"),
        Err(err) => warn!(key, "sync skipped: {err}"),
    }
}

fn gallery_line(gallery: &Gallery) -> String {
    let marker = if gallery.is_favorite { "*" } else { " " };
    let private = if gallery.is_private { " (private)" } else { "" };
    let count = gallery.images.iter().filter(|img| !img.is_cover).count();
    let tags = if gallery.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", gallery.tags.join(" "))
    };
    format!(
        "{marker} {:>4}  {}{private}  ({count} image(s)){tags}",
        gallery.id, gallery.name
    )
}

fn normalize_tag_args(tags: Vec<String>) -> Option<Vec<String>> {
    let tags = flatten_tag_args(tags);
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

fn flatten_tag_args(tags: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    for tag in tags {
        for part in tag.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                out.push(part.to_string());
            }
        }
    }
    out
}

struct ImportBar {
    pb: ProgressBar,
}

impl ImportObserver for ImportBar {
    fn progress(&self, progress: ImportProgress) {
        self.pb.set_length(progress.total as u64);
        self.pb.set_position(progress.current as u64);
    }
}
