//! # Dataset
//!
//! Turns a manifest entry into an [`EpisodePlan`]: everything the controller
//! needs before the first message is sent.
//!
//! Two manifest shapes exist. Multi-instruction manifests map each episode key
//! to its instruction sequence and use the whole recorded trajectory (first
//! posture frame to last). Single-instruction manifests map each key to
//! labelling metadata; the instruction itself and the frame range it covers
//! live in a per-episode instruction file.

use protocol::{EpisodeKey, Pose};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::result::read_json;
use crate::{EpisodeError, SceneResolver};

const POSTURE_FILE: &str = "posture.json";
const SCREENSHOT_DIR: &str = "screenshots";

/// Where the recorded dataset lives on disk.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    pub instruction_root: PathBuf,
    pub posture_root: PathBuf,
    pub screenshot_root: PathBuf,
}

impl DatasetLayout {
    fn trajectory_dir(root: &Path, key: &EpisodeKey) -> PathBuf {
        root.join(key.group()).join(key.scene()).join(key.trajectory())
    }

    #[must_use]
    pub fn posture_path(&self, key: &EpisodeKey) -> PathBuf {
        Self::trajectory_dir(&self.posture_root, key).join(POSTURE_FILE)
    }

    #[must_use]
    pub fn instruction_path(&self, key: &EpisodeKey) -> PathBuf {
        Self::trajectory_dir(&self.instruction_root, key).join(key.file())
    }

    /// Recorded screenshot for a 1-based frame number.
    #[must_use]
    pub fn screenshot_path(&self, key: &EpisodeKey, frame: usize) -> PathBuf {
        Self::trajectory_dir(&self.screenshot_root, key)
            .join(SCREENSHOT_DIR)
            .join(format!("{frame}.png"))
    }
}

/// Loads `posture.json`: `[x, y, z, heading_degrees]` frames, converted to
/// radians. Frames with only a position get heading 0.
///
/// # Errors
///
/// Returns [`EpisodeError::EmptyPosture`] when the file holds no frames and
/// [`EpisodeError::Protocol`] when a frame has fewer than three values.
pub fn load_posture(path: &Path) -> Result<Vec<Pose>, EpisodeError> {
    let frames: Vec<Vec<f64>> = read_json("posture", path)?;
    if frames.is_empty() {
        return Err(EpisodeError::EmptyPosture(path.to_path_buf()));
    }
    frames
        .into_iter()
        .map(|frame| {
            let pose = Pose::try_from(frame)?;
            Ok(Pose::from_degrees(pose.x, pose.y, pose.z, pose.heading))
        })
        .collect()
}

const UNKNOWN_DIFFICULTY: &str = "unknown";

/// Labelling metadata a single-instruction manifest attaches to an episode.
///
/// Single entries always carry both fields; a label missing from the
/// manifest reads as `"unknown"` difficulty and an empty `action_type` list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpisodeMetadata {
    pub difficulty: Option<String>,
    pub action_type: Option<Value>,
}

/// One manifest value.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    /// Instruction sequence of a multi-instruction episode.
    Sequence(Vec<String>),
    /// Metadata of a single-instruction episode.
    Single {
        #[serde(default)]
        difficulty: Option<String>,
        #[serde(default)]
        action_type: Option<Value>,
    },
}

impl ManifestEntry {
    #[must_use]
    pub fn metadata(&self) -> EpisodeMetadata {
        match self {
            ManifestEntry::Sequence(_) => EpisodeMetadata::default(),
            ManifestEntry::Single {
                difficulty,
                action_type,
            } => EpisodeMetadata {
                difficulty: Some(
                    difficulty
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_DIFFICULTY.to_string()),
                ),
                action_type: Some(
                    action_type
                        .clone()
                        .unwrap_or_else(|| Value::Array(Vec::new())),
                ),
            },
        }
    }
}

/// Episode list in file order. Keys stay raw strings so a malformed key only
/// fails its own episode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifest {
    entries: Vec<(String, ManifestEntry)>,
}

impl Manifest {
    /// # Errors
    ///
    /// Returns [`EpisodeError::MissingAsset`] or [`EpisodeError::InvalidAsset`].
    pub fn load(path: &Path) -> Result<Self, EpisodeError> {
        let raw: Map<String, Value> = read_json("manifest", path)?;
        Self::from_map(raw).map_err(|source| EpisodeError::InvalidAsset {
            what: "manifest",
            path: path.to_path_buf(),
            source,
        })
    }

    /// # Errors
    ///
    /// Returns the JSON error when `text` is not a manifest object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        Self::from_map(serde_json::from_str(text)?)
    }

    fn from_map(raw: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let entries = raw
            .into_iter()
            .map(|(key, value)| Ok((key, serde_json::from_value(value)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolved inputs of one episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodePlan {
    pub key: EpisodeKey,
    pub instructions: Vec<String>,
    pub start: Pose,
    pub goal: Pose,
    pub glb_path: PathBuf,
    pub start_image: Option<PathBuf>,
    pub metadata: EpisodeMetadata,
}

#[derive(Deserialize)]
struct InstructionFile {
    instruction: String,
    source: [usize; 2],
}

pub struct Dataset {
    layout: DatasetLayout,
    scenes: Box<dyn SceneResolver>,
}

impl Dataset {
    #[must_use]
    pub fn new(layout: DatasetLayout, scenes: Box<dyn SceneResolver>) -> Self {
        Self { layout, scenes }
    }

    #[must_use]
    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Builds the plan for one manifest entry.
    ///
    /// # Errors
    ///
    /// Fails on a malformed key, a missing or unreadable asset, or an empty
    /// instruction sequence. Only a missing start image is tolerated.
    pub fn plan(&self, raw_key: &str, entry: &ManifestEntry) -> Result<EpisodePlan, EpisodeError> {
        let key = EpisodeKey::parse(raw_key)?;
        let posture = load_posture(&self.layout.posture_path(&key))?;
        let last = posture.len() - 1;

        let (instructions, start_idx, goal_idx, start_frame) = match entry {
            ManifestEntry::Sequence(instructions) => {
                if instructions.is_empty() {
                    return Err(EpisodeError::NoInstructions(raw_key.to_string()));
                }
                (instructions.clone(), 0, last, 1)
            }
            ManifestEntry::Single { .. } => {
                let file: InstructionFile =
                    read_json("instruction file", &self.layout.instruction_path(&key))?;
                let [from, to] = file.source;
                // source frames are 1-based
                let start_idx = from.saturating_sub(1).min(last);
                let goal_idx = to.saturating_sub(1).min(last);
                (vec![file.instruction], start_idx, goal_idx, from)
            }
        };

        let glb_path = self.scenes.resolve(&key)?;
        let start_image = self.layout.screenshot_path(&key, start_frame);
        let start_image = if start_image.is_file() {
            Some(start_image)
        } else {
            warn!(episode = %key, path = %start_image.display(), "start image missing");
            None
        };

        Ok(EpisodePlan {
            instructions,
            start: posture[start_idx],
            goal: posture[goal_idx],
            glb_path,
            start_image,
            metadata: entry.metadata(),
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_keeps_file_order_and_shapes() {
        let manifest = Manifest::parse(
            r#"{
                "z/s/t/b.json": ["go up", "turn left"],
                "a/s/t/a.json": {"difficulty": "hard", "action_type": ["ascend"]},
                "m/s/t/c.json": {}
            }"#,
        )
        .unwrap();
        let keys: Vec<&str> = manifest.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z/s/t/b.json", "a/s/t/a.json", "m/s/t/c.json"]);

        let entries: Vec<&ManifestEntry> = manifest.iter().map(|(_, e)| e).collect();
        assert!(matches!(entries[0], ManifestEntry::Sequence(v) if v.len() == 2));
        let meta = entries[1].metadata();
        assert_eq!(meta.difficulty.as_deref(), Some("hard"));
        assert_eq!(meta.action_type, Some(serde_json::json!(["ascend"])));
        assert_eq!(entries[0].metadata(), EpisodeMetadata::default());
    }

    #[test]
    fn unlabelled_single_entry_gets_placeholder_labels() {
        let manifest = Manifest::parse(r#"{"m/s/t/c.json": {}}"#).unwrap();
        let (_, entry) = manifest.iter().next().unwrap();
        let meta = entry.metadata();
        assert_eq!(meta.difficulty.as_deref(), Some("unknown"));
        assert_eq!(meta.action_type, Some(serde_json::json!([])));
    }

    #[test]
    fn manifest_must_be_an_object() {
        assert!(Manifest::parse("[1, 2]").is_err());
        assert!(Manifest::parse(r#"{"k": 3}"#).is_err());
    }
}
