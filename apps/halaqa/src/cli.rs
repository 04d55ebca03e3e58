//! # CLI Commands
//!
//! Command implementations behind the `halaqa` binary. Each `cmd_*`
//! function opens the database, runs one core operation and returns the
//! rendered output; `main.rs` only parses arguments and prints.

use halaqa_core::filter::{FilterSpec, FilterValue};
use halaqa_core::metric;
use halaqa_core::profile::{ProfileRegistry, ResourceProfile};
use halaqa_core::projection::{self, ListRequest};
use halaqa_core::store::RedbStore;
use halaqa_core::store::{EntityStore, SortKey};
use halaqa_core::{Entity, EntityId, RequestContext, actions, display};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

// =============================================================================
// ERRORS
// =============================================================================

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] halaqa_core::Error),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot render output: {0}")]
    Render(#[from] serde_json::Error),

    #[error("database already exists at {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("database not found at {0} (run `halaqa init` first)")]
    MissingDatabase(PathBuf),

    #[error("invalid filter `{0}`: expected key=value")]
    BadFilter(String),

    #[error("invalid sort `{0}`: expected field or -field")]
    BadSort(String),
}

pub type CliResult<T> = Result<T, CliError>;

// =============================================================================
// INPUT HELPERS
// =============================================================================

/// Dataset file layout accepted by `import`.
#[derive(Debug, Deserialize)]
struct Dataset {
    entities: Vec<Entity>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let content = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load resource profiles from a JSON array. No file means no profiles.
pub fn load_profiles(path: Option<&Path>) -> CliResult<ProfileRegistry> {
    let Some(path) = path else {
        return Ok(ProfileRegistry::new());
    };
    let profiles: Vec<ResourceProfile> = read_json(path)?;
    let registry: ProfileRegistry = profiles.into_iter().collect();
    debug!(path = %path.display(), count = registry.len(), "loaded profiles");
    Ok(registry)
}

/// Parse one `key=value` filter argument.
///
/// Values stay text; the filter definitions coerce them to dates, ids or
/// booleans.
pub fn parse_filter(raw: &str) -> CliResult<(String, FilterValue)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((
            key.trim().to_string(),
            FilterValue::Text(value.trim().to_string()),
        )),
        _ => Err(CliError::BadFilter(raw.to_string())),
    }
}

/// Collect repeated `--filter` arguments. Later keys override earlier ones.
pub fn parse_filters(raw: &[String]) -> CliResult<FilterSpec> {
    let mut spec = FilterSpec::new();
    for item in raw {
        let (key, value) = parse_filter(item)?;
        spec.insert(key, value);
    }
    Ok(spec)
}

fn open_store(db_path: &Path) -> CliResult<RedbStore> {
    if !db_path.exists() {
        return Err(CliError::MissingDatabase(db_path.to_path_buf()));
    }
    Ok(RedbStore::open(db_path)?)
}

// =============================================================================
// INIT / IMPORT
// =============================================================================

/// Create an empty database.
pub fn cmd_init(db_path: &Path, force: bool) -> CliResult<()> {
    if db_path.exists() {
        if !force {
            return Err(CliError::AlreadyExists(db_path.to_path_buf()));
        }
        fs::remove_file(db_path).map_err(|source| CliError::Io {
            path: db_path.to_path_buf(),
            source,
        })?;
    }
    RedbStore::create(db_path)?;
    info!(path = %db_path.display(), "database initialized");
    Ok(())
}

/// Import a `{ "entities": [...] }` dataset. Returns the number of records.
///
/// Records with id 0 are assigned the next free id. The dataset is written in
/// one transaction: an id that is already stored fails the whole import and
/// leaves the database untouched.
pub fn cmd_import(db_path: &Path, file: &Path) -> CliResult<usize> {
    let dataset: Dataset = read_json(file)?;
    let mut store = open_store(db_path)?;
    let ids = store.insert_all(dataset.entities)?;
    info!(file = %file.display(), count = ids.len(), "imported entities");
    Ok(ids.len())
}

// =============================================================================
// LIST
// =============================================================================

/// Arguments of the `list` command.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub kind: String,
    pub filters: Vec<String>,
    /// `field` or `-field`, stored field or metric name.
    pub sort: Option<String>,
    pub page: usize,
    pub per_page: Option<usize>,
    pub metrics: Vec<String>,
    /// Stored fields shown in text output.
    pub columns: Vec<String>,
    pub json: bool,
}

/// List one page of a kind.
pub fn cmd_list(
    db_path: &Path,
    profiles: &ProfileRegistry,
    args: &ListArgs,
    ctx: &RequestContext,
) -> CliResult<String> {
    let store = open_store(db_path)?;
    let profile = profiles.get_or_bare(&args.kind);

    let sort = match &args.sort {
        Some(raw) => Some(SortKey::parse(raw).ok_or_else(|| CliError::BadSort(raw.clone()))?),
        None => None,
    };
    let request = ListRequest {
        filters: parse_filters(&args.filters)?,
        sort,
        page: args.page,
        per_page: args.per_page,
        metrics: args.metrics.clone(),
    };

    let page = projection::list(&store, &profile, &request, ctx)?;
    info!(
        kind = %args.kind,
        page = page.page,
        rows = page.items.len(),
        total = page.total_count,
        "listed"
    );

    if args.json {
        Ok(serde_json::to_string_pretty(&page)?)
    } else {
        Ok(page.to_text(&profile, &args.columns))
    }
}

// =============================================================================
// METRIC / BADGE / TOGGLE
// =============================================================================

/// Evaluate one named metric for one entity.
pub fn cmd_metric(
    db_path: &Path,
    profiles: &ProfileRegistry,
    kind: &str,
    id: u64,
    name: &str,
    json: bool,
    ctx: &RequestContext,
) -> CliResult<String> {
    let store = open_store(db_path)?;
    let profile = profiles.get(kind)?;
    let spec = profile.metric_spec(name)?;
    let id = EntityId(id);
    let entity = store
        .find_by_id(id)?
        .filter(|entity| entity.kind == kind)
        .ok_or(halaqa_core::Error::NotFound(id))?;

    let value = metric::evaluate(&store, &entity, spec, ctx)?;
    if json {
        let body = serde_json::json!({ "id": id, "metric": name, "value": value });
        Ok(serde_json::to_string_pretty(&body)?)
    } else {
        Ok(format!("{name} for {kind} #{id}: {}", display::render_metric(spec, value)))
    }
}

/// Count entities for a navigation badge.
pub fn cmd_badge(
    db_path: &Path,
    profiles: &ProfileRegistry,
    kind: &str,
    filters: &[String],
    json: bool,
    ctx: &RequestContext,
) -> CliResult<String> {
    let store = open_store(db_path)?;
    let profile = profiles.get_or_bare(kind);
    let count = actions::badge_count(&store, &profile, &parse_filters(filters)?, ctx)?;
    if json {
        Ok(serde_json::to_string(&serde_json::json!({ "kind": kind, "count": count }))?)
    } else {
        Ok(count.to_string())
    }
}

/// Flip a boolean field on one entity.
pub fn cmd_toggle(
    db_path: &Path,
    id: u64,
    field: &str,
    json: bool,
    ctx: &RequestContext,
) -> CliResult<String> {
    let mut store = open_store(db_path)?;
    let entity = actions::toggle_flag(&mut store, EntityId(id), field, ctx)?;
    info!(id, field, "toggled");
    if json {
        Ok(serde_json::to_string_pretty(&entity)?)
    } else {
        let value = entity.value(field).unwrap_or(halaqa_core::FieldValue::Null);
        Ok(format!("#{id} {field} = {}", display::render_value(&value)))
    }
}
