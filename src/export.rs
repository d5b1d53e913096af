use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::database::Trial;

/// The trial as indented JSON, the way it is offered for download.
pub(crate) fn export_json(trial: &Trial) -> Result<String> {
    Ok(serde_json::to_string_pretty(trial)?)
}

/// `trial_<id>.json`, with path separators in the id replaced.
pub(crate) fn file_name(trial: &Trial) -> String {
    let id: String = trial
        .trial_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("trial_{id}.json")
}

/// Writes the export of `trial` into `dir` and returns the file written.
pub(crate) fn write_export(dir: &Path, trial: &Trial) -> Result<PathBuf> {
    let path = dir.join(file_name(trial));
    std::fs::write(&path, export_json(trial)?)
        .with_context(|| format!("cannot write {}", path.display()))?;
    info!("Exported trial {} to {}", trial.trial_id, path.display());
    Ok(path)
}

/// Splits a `trialIds` parameter such as `T-1,T-2`. Blank segments are
/// dropped.
pub(crate) fn parse_ids(param: &str) -> Vec<&str> {
    param
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect()
}

/// The trials named by `param`, in the order given. Unknown ids are skipped.
pub(crate) fn trials_by_ids<'a>(trials: &'a [Trial], param: &str) -> Vec<&'a Trial> {
    parse_ids(param)
        .into_iter()
        .filter_map(|id| trials.iter().find(|t| t.trial_id == id))
        .collect()
}
