//! # Simulator service
//!
//! Consumes `sim_input`, renders every requested pose through a [`Renderer`]
//! and answers with an observation on `sim_output`.

use chrono::Utc;
use mailbox::{Channel, Disposition, Envelope, Idle, Mailbox};
use protocol::{EpisodeKey, Message, Observation, Pose};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::ServiceError;

/// The rendering backend behind the simulator service.
pub trait Renderer: Send + 'static {
    /// Loads a scene asset, replacing whatever was loaded before.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the asset cannot be loaded.
    fn load_scene(&mut self, glb_path: &Path) -> Result<(), ServiceError>;

    /// Renders the loaded scene from `pose` and writes the frame to
    /// `image_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when rendering or writing the frame fails.
    fn render(&mut self, pose: &Pose, image_path: &Path) -> Result<(), ServiceError>;

    /// Frees the loaded scene. Must be harmless when nothing is loaded.
    fn release(&mut self);
}

pub struct SimulatorService {
    mailbox: Mailbox,
    renderer: Box<dyn Renderer>,
    scene: Option<PathBuf>,
    last_stamp: i64,
}

impl SimulatorService {
    #[must_use]
    pub fn new(mailbox: Mailbox, renderer: Box<dyn Renderer>) -> Self {
        Self {
            mailbox,
            renderer,
            scene: None,
            last_stamp: 0,
        }
    }

    /// Scene currently loaded, if any.
    #[must_use]
    pub fn scene(&self) -> Option<&Path> {
        self.scene.as_deref()
    }

    /// One pass over `sim_input`. Returns how many files were handled.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Mailbox`] if the channel cannot be listed.
    pub fn tick(&mut self) -> Result<usize, ServiceError> {
        let mailbox = self.mailbox.clone();
        let report = mailbox.claim(Channel::SimInput, |envelope| self.handle(&envelope))?;
        Ok(report.consumed + report.discarded + report.malformed)
    }

    /// Ticks until `stop` is set, then releases the scene.
    pub fn run(&mut self, idle: &mut dyn Idle, poll_interval: Duration, stop: &AtomicBool) {
        info!(root = %self.mailbox.layout().root().display(), "simulator service started");
        while !stop.load(Ordering::Relaxed) {
            match self.tick() {
                Ok(0) => idle.idle(poll_interval),
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "simulator tick failed");
                    idle.idle(poll_interval);
                }
            }
        }
        self.release();
        info!("simulator service stopped");
    }

    fn handle(&mut self, envelope: &Envelope) -> Disposition {
        match &envelope.message {
            Message::Terminate(terminate) => {
                info!(episode = %terminate.episode_key, "terminate received, releasing scene");
                self.release();
                Disposition::Consumed
            }
            Message::SceneInit(init) => {
                if init.is_new_scene {
                    if let Some(glb_path) = &init.glb_path {
                        if let Err(e) = self.load(glb_path) {
                            error!(scene = %glb_path.display(), error = %e, "scene load failed");
                            return Disposition::Discarded;
                        }
                    }
                }
                self.respond(&init.episode_key, init.coordinates)
            }
            Message::PoseUpdate(update) => self.respond(&update.episode_key, update.coordinates),
            Message::Observation(_) => {
                warn!(file = %envelope.file_name, "observation on simulator input dropped");
                Disposition::Discarded
            }
        }
    }

    fn load(&mut self, glb_path: &Path) -> Result<(), ServiceError> {
        self.release();
        info!(scene = %glb_path.display(), "loading scene");
        self.renderer.load_scene(glb_path)?;
        self.scene = Some(glb_path.to_path_buf());
        Ok(())
    }

    fn release(&mut self) {
        if let Some(scene) = self.scene.take() {
            debug!(scene = %scene.display(), "scene released");
            self.renderer.release();
        }
    }

    fn respond(&mut self, episode_key: &EpisodeKey, pose: Pose) -> Disposition {
        match self.render(episode_key, pose) {
            Ok(image_path) => {
                debug!(image = %image_path.display(), "frame rendered");
                Disposition::Consumed
            }
            Err(e) => {
                error!(episode = %episode_key, error = %e, "render failed");
                Disposition::Discarded
            }
        }
    }

    fn render(&mut self, episode_key: &EpisodeKey, pose: Pose) -> Result<PathBuf, ServiceError> {
        if self.scene.is_none() {
            return Err(ServiceError::NoScene);
        }
        // strictly increasing so two frames never share a name
        self.last_stamp = Utc::now().timestamp_micros().max(self.last_stamp + 1);
        let image_path = self
            .mailbox
            .layout()
            .images_dir()
            .join(image_file_name(episode_key, self.last_stamp));
        self.renderer.render(&pose, &image_path)?;
        self.mailbox.publish(
            Channel::SimOutput,
            &Message::Observation(Observation {
                episode_key: episode_key.clone(),
                coordinates: pose,
                image_path: image_path.clone(),
            }),
        )?;
        Ok(image_path)
    }
}

/// `image_<safe key>_<utc micros>.png`
fn image_file_name(episode_key: &EpisodeKey, stamp: i64) -> String {
    format!("image_{}_{stamp}.png", episode_key.file_safe())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_names_are_filesystem_safe() {
        let key = EpisodeKey::parse("/mp3d/a b/traj:1/ins.json").unwrap();
        let name = image_file_name(&key, 1_700_000_000_000_000);
        assert_eq!(name, "image__mp3d_a_b_traj_1_ins.json_1700000000000000.png");
    }
}
