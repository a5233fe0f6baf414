//! # Model service
//!
//! Consumes observations from `model_input`, asks a [`Policy`] for the next
//! pose and publishes it on `model_output`. The task it works on comes from
//! the instruction slot, which is re-read every tick.

use mailbox::{Channel, Disposition, Envelope, Idle, Mailbox, SlotReader};
use protocol::{EpisodeKey, InstructionContext, Message, Observation, Pose, PoseUpdate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::ServiceError;

/// Everything the policy sees for one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub episode_key: EpisodeKey,
    pub instruction: String,
    pub image_path: PathBuf,
    pub reference_image_path: Option<PathBuf>,
    /// Pose the observation was rendered from.
    pub state: Pose,
    pub goal: Pose,
}

pub trait Policy: Send + 'static {
    /// Maps an observation to the next pose.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when inference fails.
    fn infer(&mut self, request: &InferenceRequest) -> Result<Pose, ServiceError>;
}

/// What the service currently knows about the running episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeContext {
    pub episode_key: EpisodeKey,
    pub instruction: String,
    pub goal: Pose,
    pub reference_image: Option<PathBuf>,
}

pub struct ModelService {
    mailbox: Mailbox,
    slot: SlotReader,
    policy: Box<dyn Policy>,
    context: Option<EpisodeContext>,
}

impl ModelService {
    #[must_use]
    pub fn new(mailbox: Mailbox, policy: Box<dyn Policy>) -> Self {
        Self {
            slot: SlotReader::new(mailbox.layout()),
            mailbox,
            policy,
            context: None,
        }
    }

    #[must_use]
    pub fn context(&self) -> Option<&EpisodeContext> {
        self.context.as_ref()
    }

    /// Picks up a changed instruction slot, then makes one pass over
    /// `model_input`. Returns how many files were handled.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Mailbox`] if the channel cannot be listed.
    pub fn tick(&mut self) -> Result<usize, ServiceError> {
        self.refresh_context();
        let mailbox = self.mailbox.clone();
        let report = mailbox.claim(Channel::ModelInput, |envelope| self.handle(&envelope))?;
        Ok(report.consumed + report.discarded + report.malformed)
    }

    /// Ticks until `stop` is set.
    pub fn run(&mut self, idle: &mut dyn Idle, poll_interval: Duration, stop: &AtomicBool) {
        info!(root = %self.mailbox.layout().root().display(), "model service started");
        while !stop.load(Ordering::Relaxed) {
            match self.tick() {
                Ok(0) => idle.idle(poll_interval),
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "model tick failed");
                    idle.idle(poll_interval);
                }
            }
        }
        info!("model service stopped");
    }

    fn refresh_context(&mut self) {
        match self.slot.poll() {
            Ok(Some(update)) => self.apply(&update),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "instruction slot unreadable"),
        }
    }

    fn apply(&mut self, update: &InstructionContext) {
        let reference_image = update
            .reference_image()
            .map(PathBuf::from)
            .filter(|path| {
                let exists = path.is_file();
                if !exists {
                    warn!(path = %path.display(), "reference image missing");
                }
                exists
            });

        match &mut self.context {
            Some(current) if current.episode_key == update.episode_key => {
                if current.instruction != update.instruction {
                    info!(instruction = %update.instruction, "instruction updated");
                    current.instruction.clone_from(&update.instruction);
                }
                if current.reference_image != reference_image {
                    debug!(reference = ?reference_image, "reference image updated");
                    current.reference_image = reference_image;
                }
                current.goal = update.end_coords;
            }
            _ => {
                info!(episode = %update.episode_key, instruction = %update.instruction, "new episode");
                self.context = Some(EpisodeContext {
                    episode_key: update.episode_key.clone(),
                    instruction: update.instruction.clone(),
                    goal: update.end_coords,
                    reference_image,
                });
            }
        }
    }

    fn handle(&mut self, envelope: &Envelope) -> Disposition {
        let Message::Observation(observation) = &envelope.message else {
            warn!(file = %envelope.file_name, kind = envelope.message.kind().as_str(), "unexpected message on model input");
            return Disposition::Discarded;
        };
        let Some(context) = &self.context else {
            warn!(file = %envelope.file_name, "no instruction yet, observation dropped");
            return Disposition::Discarded;
        };
        if observation.episode_key != context.episode_key {
            debug!(file = %envelope.file_name, key = %observation.episode_key, "observation from another episode dropped");
            return Disposition::Discarded;
        }
        if !observation.image_path.is_file() {
            warn!(image = %observation.image_path.display(), "observation image missing");
            return Disposition::Discarded;
        }

        let request = request_for(context, observation);
        match self.infer(&request) {
            Ok(pose) => {
                debug!(episode = %request.episode_key, ?pose, "inference done");
                Disposition::Consumed
            }
            Err(e) => {
                error!(episode = %request.episode_key, error = %e, "inference failed");
                Disposition::Discarded
            }
        }
    }

    fn infer(&mut self, request: &InferenceRequest) -> Result<Pose, ServiceError> {
        let pose = self.policy.infer(request)?;
        self.mailbox.publish(
            Channel::ModelOutput,
            &Message::PoseUpdate(PoseUpdate {
                episode_key: request.episode_key.clone(),
                coordinates: pose,
            }),
        )?;
        Ok(pose)
    }
}

fn request_for(context: &EpisodeContext, observation: &Observation) -> InferenceRequest {
    InferenceRequest {
        episode_key: context.episode_key.clone(),
        instruction: context.instruction.clone(),
        image_path: observation.image_path.clone(),
        reference_image_path: context.reference_image.clone(),
        state: observation.coordinates,
        goal: context.goal,
    }
}
