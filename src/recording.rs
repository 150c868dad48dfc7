//! Recording directory helpers.
//!
//! A recording is a directory holding one or more videos, an `info.csv`
//! metadata file of `key,value` rows, and the recording's global timestamp
//! sequence. These helpers find the source video for an export, read the
//! recording start date and name export folders after it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ReclipError;

/// Name of the recording metadata file.
pub const INFO_FILE_NAME: &str = "info.csv";

/// Container extensions accepted for source videos, in preference order.
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mjpeg"];

/// A recording directory together with its global timestamp sequence.
#[derive(Debug, Clone)]
pub struct Recording {
    dir: PathBuf,
    timestamps: Arc<[f64]>,
}

impl Recording {
    /// Describe the recording at `dir` whose samples are timed by `timestamps`.
    pub fn new(dir: impl Into<PathBuf>, timestamps: impl Into<Arc<[f64]>>) -> Self {
        Self {
            dir: dir.into(),
            timestamps: timestamps.into(),
        }
    }

    /// Describe the recording at `dir`, loading its timestamps from a text
    /// file (see [`read_timestamps`]).
    pub fn load(dir: impl Into<PathBuf>, timestamps_path: &Path) -> Result<Self, ReclipError> {
        let timestamps = read_timestamps(timestamps_path)?;
        Ok(Self::new(dir, timestamps))
    }

    /// Recording directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Global timestamp sequence, in seconds.
    pub fn timestamps(&self) -> &Arc<[f64]> {
        &self.timestamps
    }

    /// See [`find_source_video`].
    pub fn find_source_video<S: AsRef<str>>(
        &self,
        base_name: &str,
        extensions: &[S],
    ) -> Result<Option<PathBuf>, ReclipError> {
        find_source_video(&self.dir, base_name, extensions)
    }

    /// See [`read_start_date`].
    pub fn start_date(&self) -> Result<Option<String>, ReclipError> {
        read_start_date(&self.dir)
    }
}

/// Find the video named `{base_name}.{ext}` in `dir` for one of `extensions`.
///
/// When several files match, the one whose file name sorts first wins.
/// Returns `Ok(None)` when nothing matches.
pub fn find_source_video<S: AsRef<str>>(
    dir: &Path,
    base_name: &str,
    extensions: &[S],
) -> Result<Option<PathBuf>, ReclipError> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let stem_matches = path.file_stem().is_some_and(|stem| stem == base_name);
        let extension_matches = path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| {
            extensions
                .iter()
                .any(|accepted| accepted.as_ref().eq_ignore_ascii_case(ext))
        });
        if stem_matches && extension_matches {
            candidates.push(path);
        }
    }

    candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    if candidates.len() > 1 {
        log::debug!("{} candidates for {base_name} in {}", candidates.len(), dir.display());
    }
    Ok(candidates.into_iter().next())
}

/// Parse a file of `key,value` rows.
///
/// Values keep any commas after the first one; surrounding whitespace and
/// double quotes are trimmed from both fields.
pub fn read_key_value_file(path: &Path) -> Result<HashMap<String, String>, ReclipError> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .filter_map(|line| line.split_once(','))
        .map(|(key, value)| (unquote(key).to_string(), unquote(value).to_string()))
        .collect())
}

fn unquote(field: &str) -> &str {
    field.trim().trim_matches('"')
}

/// Read the recording start as `{date}_{time}` from `dir/info.csv`.
///
/// Dots and colons in the `Start Date` and `Start Time` values are replaced
/// by underscores so the result can be used in a file name. Returns
/// `Ok(None)` when the recording has no metadata file.
///
/// # Errors
///
/// [`ReclipError::MissingMetadata`] if the file lacks either key.
pub fn read_start_date(dir: &Path) -> Result<Option<String>, ReclipError> {
    let path = dir.join(INFO_FILE_NAME);
    if !path.is_file() {
        log::debug!("No {INFO_FILE_NAME} in {}", dir.display());
        return Ok(None);
    }

    let info = read_key_value_file(&path)?;
    let field = |key: &str| {
        info.get(key)
            .map(|value| value.replace(['.', ':'], "_"))
            .ok_or_else(|| ReclipError::MissingMetadata(key.to_string()))
    };
    Ok(Some(format!("{}_{}", field("Start Date")?, field("Start Time")?)))
}

/// Name of the folder an export is written to.
pub fn export_folder_name(plugin_name: &str, start_date: Option<&str>) -> String {
    format!("{plugin_name}_{}", start_date.unwrap_or("unknown_start"))
}

/// Load a timestamp sequence from a text file with one number per line.
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
///
/// [`ReclipError::InvalidTimestamp`] for a line that is not a finite number.
pub fn read_timestamps(path: &Path) -> Result<Vec<f64>, ReclipError> {
    let contents = fs::read_to_string(path)?;
    let mut timestamps = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<f64>() {
            Ok(value) if value.is_finite() => timestamps.push(value),
            _ => {
                return Err(ReclipError::InvalidTimestamp {
                    path: path.to_path_buf(),
                    line: number + 1,
                    value: line.to_string(),
                });
            }
        }
    }
    log::debug!("Read {} timestamps from {}", timestamps.len(), path.display());
    Ok(timestamps)
}
