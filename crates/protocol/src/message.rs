//! Wire messages exchanged through the mailbox channels.
//!
//! Every message is a JSON object carrying the `episode_key` it belongs to and
//! a `kind` discriminator. Files written by producers that predate the
//! discriminator are classified by their shape in [`Message::from_slice`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::{EpisodeKey, Pose, ProtocolError};

/// Controller → simulator: load a scene (when `is_new_scene`) and render
/// `coordinates`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneInit {
    pub episode_key: EpisodeKey,
    pub coordinates: Pose,
    #[serde(default)]
    pub glb_path: Option<PathBuf>,
    #[serde(default)]
    pub is_new_scene: bool,
}

/// A new pose for the agent: policy → controller, and controller →
/// simulator once accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseUpdate {
    pub episode_key: EpisodeKey,
    pub coordinates: Pose,
}

/// Rendered frame for a pose: simulator → controller, and controller →
/// policy service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub episode_key: EpisodeKey,
    pub coordinates: Pose,
    pub image_path: PathBuf,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateAction {
    #[default]
    Terminate,
}

/// Sentinel telling the simulator to release the current scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Terminate {
    pub episode_key: EpisodeKey,
    #[serde(default)]
    pub action: TerminateAction,
}

impl Terminate {
    #[must_use]
    pub fn new(episode_key: EpisodeKey) -> Self {
        Self {
            episode_key,
            action: TerminateAction::Terminate,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    SceneInit(SceneInit),
    PoseUpdate(PoseUpdate),
    Observation(Observation),
    Terminate(Terminate),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    SceneInit,
    PoseUpdate,
    Observation,
    Terminate,
}

impl MessageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageKind::SceneInit => "scene_init",
            MessageKind::PoseUpdate => "pose_update",
            MessageKind::Observation => "observation",
            MessageKind::Terminate => "terminate",
        }
    }

    /// Classifies an untagged legacy message by the fields it carries.
    fn infer(fields: &Map<String, Value>) -> Self {
        if fields.get("action").and_then(Value::as_str) == Some("terminate") {
            MessageKind::Terminate
        } else if fields.contains_key("image_path") {
            MessageKind::Observation
        } else if fields.contains_key("is_new_scene") || fields.contains_key("glb_path") {
            MessageKind::SceneInit
        } else {
            MessageKind::PoseUpdate
        }
    }
}

impl Message {
    /// Decodes a message file.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] when the bytes are not JSON or do not
    /// describe any message kind.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut value: Value = serde_json::from_slice(bytes)?;
        if let Value::Object(fields) = &mut value {
            if !fields.contains_key("kind") {
                let kind = MessageKind::infer(fields);
                fields.insert("kind".to_string(), Value::from(kind.as_str()));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// # Errors
    ///
    /// Serialization of these types only fails on non-string map keys, which
    /// they do not have; the error is still surfaced instead of panicking.
    pub fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::SceneInit(_) => MessageKind::SceneInit,
            Message::PoseUpdate(_) => MessageKind::PoseUpdate,
            Message::Observation(_) => MessageKind::Observation,
            Message::Terminate(_) => MessageKind::Terminate,
        }
    }

    #[must_use]
    pub fn episode_key(&self) -> &EpisodeKey {
        match self {
            Message::SceneInit(m) => &m.episode_key,
            Message::PoseUpdate(m) => &m.episode_key,
            Message::Observation(m) => &m.episode_key,
            Message::Terminate(m) => &m.episode_key,
        }
    }

    /// Pose carried by the message, if any.
    #[must_use]
    pub fn pose(&self) -> Option<Pose> {
        match self {
            Message::SceneInit(m) => Some(m.coordinates),
            Message::PoseUpdate(m) => Some(m.coordinates),
            Message::Observation(m) => Some(m.coordinates),
            Message::Terminate(_) => None,
        }
    }
}

/// Task description the policy service works from.
///
/// Lives in a single-slot file rather than a queue: the latest write wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstructionContext {
    pub episode_key: EpisodeKey,
    pub instruction: String,
    pub end_coords: Pose,
    #[serde(default)]
    pub glb_path: Option<PathBuf>,
    pub start_coords: Pose,
    #[serde(default)]
    pub start_image_path: Option<PathBuf>,
    #[serde(default)]
    pub ref_image_path: Option<PathBuf>,
}

impl InstructionContext {
    /// Reference frame for the current instruction, falling back to the
    /// episode's start frame.
    #[must_use]
    pub fn reference_image(&self) -> Option<&Path> {
        self.ref_image_path
            .as_deref()
            .or(self.start_image_path.as_deref())
    }
}
