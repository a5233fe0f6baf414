use protocol::{EpisodeKey, Pose};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::EpisodeError;

/// Name of the aggregate file written after the last episode.
pub const AGGREGATE_FILE: &str = "final_results.json";

/// Why an episode ended. The wire strings are what the offline metric
/// tooling filters on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "max_steps")]
    MaxSteps,
    #[serde(rename = "no_more_instructions")]
    InstructionsExhausted,
    #[serde(rename = "timeout")]
    Timeout,
}

impl TerminationReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TerminationReason::Success => "success",
            TerminationReason::MaxSteps => "max_steps",
            TerminationReason::InstructionsExhausted => "no_more_instructions",
            TerminationReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything recorded about one finished episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeResult {
    pub episode_key: EpisodeKey,
    pub success: bool,
    pub steps: u32,
    pub trajectory: Vec<Pose>,
    pub termination_reason: TerminationReason,
    pub instructions: Vec<String>,
    pub current_instruction_index: usize,
}

/// One entry of the aggregate results file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub success: bool,
    pub steps: u32,
    pub final_instruction_index: usize,
    pub termination_reason: TerminationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<Value>,
}

impl From<&EpisodeResult> for EpisodeSummary {
    fn from(result: &EpisodeResult) -> Self {
        Self {
            success: result.success,
            steps: result.steps,
            final_instruction_index: result.current_instruction_index,
            termination_reason: result.termination_reason,
            difficulty: None,
            action_type: None,
        }
    }
}

/// Directory holding per-episode result files and the aggregate.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn episode_path(&self, key: &EpisodeKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_safe()))
    }

    #[must_use]
    pub fn aggregate_path(&self) -> PathBuf {
        self.dir.join(AGGREGATE_FILE)
    }

    /// Writes `result` pretty-printed to `<safe key>.json`.
    ///
    /// # Errors
    ///
    /// Returns [`EpisodeError::Io`] if the file cannot be written.
    pub fn write(&self, result: &EpisodeResult) -> Result<PathBuf, EpisodeError> {
        let path = self.episode_path(&result.episode_key);
        write_pretty(&self.dir, &path, result)?;
        Ok(path)
    }

    /// # Errors
    ///
    /// Returns [`EpisodeError::MissingAsset`] when no result exists for `key`
    /// and [`EpisodeError::InvalidAsset`] when it cannot be parsed.
    pub fn load(&self, key: &EpisodeKey) -> Result<EpisodeResult, EpisodeError> {
        read_json("episode result", &self.episode_path(key))
    }

    /// Writes the `episode_key → summary` mapping, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`EpisodeError::Io`] if the file cannot be written.
    pub fn write_aggregate(
        &self,
        summaries: &BTreeMap<EpisodeKey, EpisodeSummary>,
    ) -> Result<PathBuf, EpisodeError> {
        let path = self.aggregate_path();
        write_pretty(&self.dir, &path, summaries)?;
        Ok(path)
    }

    /// # Errors
    ///
    /// Same as [`ResultStore::load`].
    pub fn load_aggregate(&self) -> Result<BTreeMap<EpisodeKey, EpisodeSummary>, EpisodeError> {
        read_json("aggregate results", &self.aggregate_path())
    }
}

fn write_pretty<T: Serialize + ?Sized>(
    dir: &Path,
    path: &Path,
    value: &T,
) -> Result<(), EpisodeError> {
    fs::create_dir_all(dir).map_err(|source| EpisodeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let text = serde_json::to_string_pretty(value).map_err(|source| EpisodeError::InvalidAsset {
        what: "result",
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| EpisodeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    what: &'static str,
    path: &Path,
) -> Result<T, EpisodeError> {
    let text = fs::read_to_string(path).map_err(|e| EpisodeError::read(what, path.to_path_buf(), e))?;
    serde_json::from_str(&text).map_err(|source| EpisodeError::InvalidAsset {
        what,
        path: path.to_path_buf(),
        source,
    })
}
