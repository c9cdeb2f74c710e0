use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::scraper::Fetch;
use crate::types::SourceRecord;
use crate::update::{SeriesUpdater, UpdateError, UpdateOutcome};
use crate::utils::UpdateStats;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Failed to update {path}: {source}")]
    Update {
        path: PathBuf,
        #[source]
        source: UpdateError,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessOptions {
    /// Leave the file untouched; the rendered YAML is still returned.
    pub dry_run: bool,
    /// Write the in-memory record even when the update stopped part way.
    pub keep_partial: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// The file has no scrape target.
    Skipped,
    /// The file could not be read as a source record.
    Invalid,
    Updated { stats: UpdateStats, yaml: String },
}

/// A loaded source file. The parsed document is kept so that a rewrite lays
/// keys out in the order the file had them.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub record: SourceRecord,
    layout: Value,
}

pub fn load_source(path: &Path) -> Result<SourceDocument, SourceError> {
    let text = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let yaml_error = |source| SourceError::Yaml {
        path: path.to_path_buf(),
        source,
    };
    let layout: Value = serde_yaml::from_str(&text).map_err(yaml_error)?;
    let record = serde_yaml::from_value(layout.clone()).map_err(yaml_error)?;
    Ok(SourceDocument { record, layout })
}

pub fn render_source(path: &Path, document: &SourceDocument) -> Result<String, SourceError> {
    let yaml_error = |source| SourceError::Yaml {
        path: path.to_path_buf(),
        source,
    };
    let updated = serde_yaml::to_value(&document.record).map_err(yaml_error)?;
    serde_yaml::to_string(&keep_layout(&document.layout, updated)).map_err(yaml_error)
}

pub fn save_source(path: &Path, document: &SourceDocument) -> Result<String, SourceError> {
    let yaml = render_source(path, document)?;
    fs::write(path, &yaml).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(yaml)
}

/// Orders the keys of `updated` the way `layout` orders them. Keys new to
/// `layout` follow in their own order; keys `updated` lacks are dropped.
/// Sequences are matched by index, since stored events are only appended.
fn keep_layout(layout: &Value, updated: Value) -> Value {
    match (layout, updated) {
        (Value::Mapping(old), Value::Mapping(new)) => {
            let mut ordered = Mapping::with_capacity(new.len());
            for (key, old_value) in old {
                if let Some(value) = new.get(key) {
                    ordered.insert(key.clone(), keep_layout(old_value, value.clone()));
                }
            }
            for (key, value) in new {
                if !ordered.contains_key(&key) {
                    ordered.insert(key, value);
                }
            }
            Value::Mapping(ordered)
        }
        (Value::Sequence(old), Value::Sequence(new)) => Value::Sequence(
            new.into_iter()
                .enumerate()
                .map(|(i, value)| match old.get(i) {
                    Some(old_value) => keep_layout(old_value, value),
                    None => value,
                })
                .collect(),
        ),
        (_, updated) => updated,
    }
}

/// Loads, updates and writes back one source file. The file is written only
/// once the whole series has been processed.
pub async fn process_source_file<F: Fetch>(
    updater: &SeriesUpdater<F>,
    path: &Path,
    options: ProcessOptions,
) -> Result<FileOutcome, SourceError> {
    log::info!("Processing source file {}", path.display());

    let mut document = match load_source(path) {
        Ok(document) => document,
        Err(SourceError::Yaml { source, .. }) => {
            log::warn!(
                "Failed to load source file {} as YAML: {}",
                path.display(),
                source
            );
            return Ok(FileOutcome::Invalid);
        }
        Err(e) => return Err(e),
    };

    match updater.update_series(&mut document.record.series).await {
        Ok(UpdateOutcome::NoTarget) => Ok(FileOutcome::Skipped),
        Ok(UpdateOutcome::Updated(stats)) => {
            let yaml = if options.dry_run {
                render_source(path, &document)?
            } else {
                save_source(path, &document)?
            };
            Ok(FileOutcome::Updated { stats, yaml })
        }
        Err(source) => {
            if options.keep_partial && !options.dry_run {
                log::warn!("Writing partial update of {}", path.display());
                save_source(path, &document)?;
            }
            Err(SourceError::Update {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}
