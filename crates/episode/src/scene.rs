//! Scene asset lookup.
//!
//! The group component of an episode key names the source dataset
//! (`mp3d_3`, `hm3d_14`, ...). Each dataset stores its meshes differently.

use protocol::EpisodeKey;
use std::fs;
use std::path::{Path, PathBuf};

use crate::EpisodeError;

/// Maps an episode to the scene asset the simulator has to load.
pub trait SceneResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EpisodeError::MissingAsset`] when the asset does not exist and
    /// [`EpisodeError::UnknownDataset`] when the group cannot be mapped.
    fn resolve(&self, key: &EpisodeKey) -> Result<PathBuf, EpisodeError>;
}

/// Resolver for the on-disk layout of the standard scene datasets.
#[derive(Debug, Clone)]
pub struct DatasetSceneResolver {
    root: PathBuf,
}

impl DatasetSceneResolver {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn hm3d(&self, scene: &str) -> Result<PathBuf, EpisodeError> {
        let base = self.root.join("hm3d");
        let folder = sorted_entries(&base)?
            .into_iter()
            .find(|p| p.is_dir() && file_name_contains(p, scene))
            .ok_or_else(|| EpisodeError::MissingAsset {
                what: "hm3d scene folder",
                path: base.join(format!("*{scene}*")),
            })?;

        let basis = folder.join(format!("{scene}.basis.glb"));
        if basis.is_file() {
            return Ok(basis);
        }
        sorted_entries(&folder)?
            .into_iter()
            .find(|p| {
                p.is_file()
                    && file_name_contains(p, scene)
                    && p.extension().is_some_and(|ext| ext == "glb")
            })
            .ok_or(EpisodeError::MissingAsset {
                what: "hm3d scene mesh",
                path: basis,
            })
    }
}

impl SceneResolver for DatasetSceneResolver {
    fn resolve(&self, key: &EpisodeKey) -> Result<PathBuf, EpisodeError> {
        let scene = key.scene();
        let dataset = key.group().split('_').next().unwrap_or_default();
        let path = match dataset {
            "mp3d" => self.root.join("mp3d").join(scene).join(format!("{scene}.glb")),
            "gibson" => self.root.join("gibson").join(format!("{scene}.glb")),
            "hm3d" => return self.hm3d(scene),
            "replica" => self
                .root
                .join("replica")
                .join(scene)
                .join("habitat")
                .join("mesh_preseg_semantic.ply"),
            other => return Err(EpisodeError::UnknownDataset(other.to_string())),
        };
        if path.is_file() {
            Ok(path)
        } else {
            Err(EpisodeError::MissingAsset {
                what: "scene mesh",
                path,
            })
        }
    }
}

fn file_name_contains(path: &Path, needle: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(needle))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, EpisodeError> {
    let entries = fs::read_dir(dir).map_err(|e| EpisodeError::read("scene directory", dir.to_path_buf(), e))?;
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"glb").unwrap();
    }

    fn key(raw: &str) -> EpisodeKey {
        EpisodeKey::parse(raw).unwrap()
    }

    #[test]
    fn mp3d_and_gibson_layouts() {
        let dir = TempDir::new().unwrap();
        let resolver = DatasetSceneResolver::new(dir.path());
        touch(&dir.path().join("mp3d/17DRP5sb8fy/17DRP5sb8fy.glb"));
        touch(&dir.path().join("gibson/Adrian.glb"));

        let mp3d = resolver.resolve(&key("mp3d_2/17DRP5sb8fy/t/f")).unwrap();
        assert!(mp3d.ends_with("mp3d/17DRP5sb8fy/17DRP5sb8fy.glb"));
        let gibson = resolver.resolve(&key("gibson/Adrian/t/f")).unwrap();
        assert!(gibson.ends_with("gibson/Adrian.glb"));
    }

    #[test]
    fn hm3d_prefers_basis_mesh() {
        let dir = TempDir::new().unwrap();
        let resolver = DatasetSceneResolver::new(dir.path());
        touch(&dir.path().join("hm3d/00800-TEEsavR23oF/TEEsavR23oF.semantic.glb"));
        touch(&dir.path().join("hm3d/00800-TEEsavR23oF/TEEsavR23oF.basis.glb"));

        let path = resolver.resolve(&key("hm3d_14/TEEsavR23oF/t/f")).unwrap();
        assert!(path.ends_with("TEEsavR23oF.basis.glb"));
    }

    #[test]
    fn hm3d_falls_back_to_any_matching_mesh() {
        let dir = TempDir::new().unwrap();
        let resolver = DatasetSceneResolver::new(dir.path());
        touch(&dir.path().join("hm3d/00800-TEEsavR23oF/TEEsavR23oF.glb"));

        let path = resolver.resolve(&key("hm3d/TEEsavR23oF/t/f")).unwrap();
        assert!(path.ends_with("TEEsavR23oF.glb"));
    }

    #[test]
    fn missing_and_unknown_assets_are_errors() {
        let dir = TempDir::new().unwrap();
        let resolver = DatasetSceneResolver::new(dir.path());
        assert!(matches!(
            resolver.resolve(&key("mp3d/none/t/f")),
            Err(EpisodeError::MissingAsset { .. })
        ));
        assert!(matches!(
            resolver.resolve(&key("hm3d/none/t/f")),
            Err(EpisodeError::MissingAsset { .. })
        ));
        assert!(matches!(
            resolver.resolve(&key("scannet/a/t/f")),
            Err(EpisodeError::UnknownDataset(_))
        ));
    }
}
