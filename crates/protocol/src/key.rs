use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

/// Identifier of one episode, `group/scene/trajectory/file`.
///
/// The raw string is kept verbatim (including a leading `/` some manifests
/// use) because it is what every message and result file is tagged with.
/// The dataset path components are derived from it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EpisodeKey {
    raw: String,
    group: String,
    scene: String,
    trajectory: String,
    file: String,
}

impl EpisodeKey {
    /// Parses a key. The first three segments are group, scene and
    /// trajectory, the last one is the file.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedKey`] when fewer than four non-empty
    /// segments are present.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let segments: Vec<&str> = raw.trim_matches('/').split('/').collect();
        if segments.len() < 4 || segments.iter().any(|s| s.is_empty()) {
            return Err(ProtocolError::MalformedKey(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            group: segments[0].to_string(),
            scene: segments[1].to_string(),
            trajectory: segments[2].to_string(),
            file: segments[segments.len() - 1].to_string(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn scene(&self) -> &str {
        &self.scene
    }

    #[must_use]
    pub fn trajectory(&self) -> &str {
        &self.trajectory
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Key with `/`, `:` and spaces replaced by `_`, usable as a file stem.
    #[must_use]
    pub fn file_safe(&self) -> String {
        self.raw.replace(['/', ':', ' '], "_")
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for EpisodeKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EpisodeKey {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<EpisodeKey> for String {
    fn from(key: EpisodeKey) -> Self {
        key.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_components() {
        let key = EpisodeKey::parse("/hm3d_14/00800-TEEsavR23oF/traj_3/ins_1.json").unwrap();
        assert_eq!(key.group(), "hm3d_14");
        assert_eq!(key.scene(), "00800-TEEsavR23oF");
        assert_eq!(key.trajectory(), "traj_3");
        assert_eq!(key.file(), "ins_1.json");
        assert_eq!(key.as_str(), "/hm3d_14/00800-TEEsavR23oF/traj_3/ins_1.json");
    }

    #[test]
    fn file_safe_replaces_separators() {
        let key = EpisodeKey::parse("mp3d/a b/c:d/e.json").unwrap();
        assert_eq!(key.file_safe(), "mp3d_a_b_c_d_e.json");
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(EpisodeKey::parse("mp3d/scene/traj").is_err());
        assert!(EpisodeKey::parse("mp3d//traj/file").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = EpisodeKey::parse("g/s/t/f").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"g/s/t/f\"");
        let back: EpisodeKey = serde_json::from_str("\"g/s/t/f\"").unwrap();
        assert_eq!(back, key);
    }
}
