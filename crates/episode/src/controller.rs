//! # Episode controller
//!
//! The per-episode state machine. It owns the trajectory, the step count and
//! the instruction cursor, and decides when the episode ends.
//!
//! One observation and one pose update alternate: the controller forwards an
//! observation to the policy, waits for the next pose, forwards that to the
//! simulator, waits for the rendered observation, and so on. A message that
//! arrives out of turn is left on disk for a later tick. Messages tagged with
//! another episode's key are thrown away.
//!
//! Single- and multi-instruction episodes run through the same machine; with
//! one instruction the update condition is never consulted.

use mailbox::{Disposition, Envelope, Provenance};
use protocol::{
    EpisodeKey, InstructionContext, Message, Observation, Pose, PoseUpdate, SceneInit,
    SuccessCriterion, UpdateCondition,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::{EpisodeError, EpisodePlan, EpisodeResult, Outbox, TerminationReason};

/// Budgets and thresholds for one episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub max_steps: u32,
    pub timeout: Duration,
    pub success: SuccessCriterion,
    pub update: UpdateCondition,
}

impl ControllerConfig {
    /// 12 steps within 240 s.
    #[must_use]
    pub fn single_instruction() -> Self {
        Self {
            max_steps: 12,
            timeout: Duration::from_secs(240),
            success: SuccessCriterion::default(),
            update: UpdateCondition::default(),
        }
    }

    /// 60 steps within 300 s.
    #[must_use]
    pub fn multi_instruction() -> Self {
        Self {
            max_steps: 60,
            timeout: Duration::from_secs(300),
            ..Self::single_instruction()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    AwaitObservation,
    AwaitPoseUpdate,
    Terminated(TerminationReason),
}

#[derive(Debug)]
pub struct EpisodeController {
    plan: EpisodePlan,
    config: ControllerConfig,
    state: ControllerState,
    trajectory: Vec<Pose>,
    step_count: u32,
    instruction_index: usize,
    last_inference: Pose,
    current_image: Option<PathBuf>,
    seen_first_observation: bool,
    started: Instant,
    result: Option<EpisodeResult>,
}

impl EpisodeController {
    /// Sets the episode up: publishes the first instruction context and asks
    /// the simulator to load the scene at the start pose.
    ///
    /// # Errors
    ///
    /// Returns [`EpisodeError::NoInstructions`] for an empty plan, or the
    /// outbox error if either setup message cannot be written.
    pub fn start(
        plan: EpisodePlan,
        config: ControllerConfig,
        outbox: &mut dyn Outbox,
        now: Instant,
    ) -> Result<Self, EpisodeError> {
        if plan.instructions.is_empty() {
            return Err(EpisodeError::NoInstructions(plan.key.to_string()));
        }
        let controller = Self {
            trajectory: vec![plan.start],
            last_inference: plan.start,
            current_image: plan.start_image.clone(),
            plan,
            config,
            state: ControllerState::AwaitObservation,
            step_count: 0,
            instruction_index: 0,
            seen_first_observation: false,
            started: now,
            result: None,
        };

        info!(
            episode = %controller.plan.key,
            instructions = controller.plan.instructions.len(),
            first = %controller.plan.instructions[0],
            "episode started"
        );
        outbox.publish_instruction(&controller.context(controller.plan.start_image.clone()))?;
        outbox.send_to_simulator(&Message::SceneInit(SceneInit {
            episode_key: controller.plan.key.clone(),
            coordinates: controller.plan.start,
            glb_path: Some(controller.plan.glb_path.clone()),
            is_new_scene: true,
        }))?;
        Ok(controller)
    }

    /// Feeds one inbound message to the state machine.
    ///
    /// # Errors
    ///
    /// Returns the outbox error when forwarding fails. The controller state is
    /// left as it was before the message.
    pub fn handle(
        &mut self,
        envelope: &Envelope,
        outbox: &mut dyn Outbox,
    ) -> Result<Disposition, EpisodeError> {
        if self.is_terminated() {
            return Ok(Disposition::Discarded);
        }
        let message = &envelope.message;
        if message.episode_key() != &self.plan.key {
            debug!(file = %envelope.file_name, key = %message.episode_key(), "foreign episode message dropped");
            return Ok(Disposition::Discarded);
        }

        match (message, self.state) {
            (Message::Observation(observation), ControllerState::AwaitObservation) => {
                if !from_expected(envelope, Provenance::Simulator) {
                    return Ok(Disposition::Discarded);
                }
                self.on_observation(observation, outbox)?;
                Ok(Disposition::Consumed)
            }
            (Message::PoseUpdate(update), ControllerState::AwaitPoseUpdate) => {
                if !from_expected(envelope, Provenance::Model) {
                    return Ok(Disposition::Discarded);
                }
                self.on_pose_update(update, outbox)?;
                Ok(Disposition::Consumed)
            }
            (Message::Observation(_) | Message::PoseUpdate(_), _) => Ok(Disposition::Deferred),
            (Message::SceneInit(_) | Message::Terminate(_), _) => {
                warn!(file = %envelope.file_name, kind = message.kind().as_str(), "unexpected message kind dropped");
                Ok(Disposition::Discarded)
            }
        }
    }

    /// Terminates with [`TerminationReason::Timeout`] once the wall-clock
    /// budget is spent. Returns whether the episode is over.
    pub fn check_timeout(&mut self, now: Instant, outbox: &mut dyn Outbox) -> bool {
        if !self.is_terminated() && now.saturating_duration_since(self.started) >= self.config.timeout {
            warn!(episode = %self.plan.key, timeout = ?self.config.timeout, "episode timed out");
            self.terminate(TerminationReason::Timeout, outbox);
        }
        self.is_terminated()
    }

    fn on_observation(
        &mut self,
        observation: &Observation,
        outbox: &mut dyn Outbox,
    ) -> Result<(), EpisodeError> {
        let pose = observation.coordinates;
        let reason = if self.config.success.is_met(&pose, &self.plan.goal) {
            Some(TerminationReason::Success)
        } else if self.step_count >= self.config.max_steps {
            Some(TerminationReason::MaxSteps)
        } else {
            None
        };
        if reason.is_none() {
            outbox.send_to_model(observation)?;
        }

        self.current_image = Some(observation.image_path.clone());
        // the first frame renders the start pose recorded at setup
        if self.seen_first_observation {
            self.trajectory.push(pose);
        }
        self.seen_first_observation = true;

        match reason {
            Some(reason) => self.terminate(reason, outbox),
            None => self.state = ControllerState::AwaitPoseUpdate,
        }
        Ok(())
    }

    fn on_pose_update(
        &mut self,
        update: &PoseUpdate,
        outbox: &mut dyn Outbox,
    ) -> Result<(), EpisodeError> {
        let pose = update.coordinates;
        let step = self.step_count + 1;
        debug!(episode = %self.plan.key, step, max = self.config.max_steps, ?pose, "pose update");

        let settled = self.plan.instructions.len() > 1
            && self.config.update.is_met(&pose, &self.last_inference);
        if settled && self.instruction_index + 1 >= self.plan.instructions.len() {
            self.step_count = step;
            self.terminate(TerminationReason::InstructionsExhausted, outbox);
            return Ok(());
        }

        if settled {
            let next = self.instruction_index + 1;
            let reference = self
                .current_image
                .clone()
                .or_else(|| self.plan.start_image.clone());
            let mut context = self.context(reference);
            context.instruction.clone_from(&self.plan.instructions[next]);
            outbox.publish_instruction(&context)?;
            self.instruction_index = next;
            info!(episode = %self.plan.key, index = next, instruction = %context.instruction, "instruction advanced");
        }

        outbox.send_to_simulator(&Message::PoseUpdate(PoseUpdate {
            episode_key: self.plan.key.clone(),
            coordinates: pose,
        }))?;
        self.step_count = step;
        self.last_inference = pose;
        self.state = ControllerState::AwaitObservation;
        Ok(())
    }

    /// Persists the result and releases the simulator. Failures here are
    /// logged; the episode counts as terminated either way.
    fn terminate(&mut self, reason: TerminationReason, outbox: &mut dyn Outbox) {
        if self.is_terminated() {
            return;
        }
        self.state = ControllerState::Terminated(reason);
        let result = EpisodeResult {
            episode_key: self.plan.key.clone(),
            success: reason == TerminationReason::Success,
            steps: self.step_count,
            trajectory: self.trajectory.clone(),
            termination_reason: reason,
            instructions: self.plan.instructions.clone(),
            current_instruction_index: self.instruction_index,
        };
        info!(
            episode = %self.plan.key,
            reason = %reason,
            steps = self.step_count,
            instruction = self.instruction_index,
            "episode finished"
        );
        if let Err(e) = outbox.persist_result(&result) {
            error!(episode = %self.plan.key, error = %e, "failed to persist episode result");
        }
        if let Err(e) = outbox.release_simulator(&self.plan.key) {
            error!(episode = %self.plan.key, error = %e, "failed to release simulator");
        }
        self.result = Some(result);
    }

    fn context(&self, reference: Option<PathBuf>) -> InstructionContext {
        InstructionContext {
            episode_key: self.plan.key.clone(),
            instruction: self.plan.instructions[self.instruction_index].clone(),
            end_coords: self.plan.goal,
            glb_path: Some(self.plan.glb_path.clone()),
            start_coords: self.plan.start,
            start_image_path: self.plan.start_image.clone(),
            ref_image_path: reference,
        }
    }

    #[must_use]
    pub fn key(&self) -> &EpisodeKey {
        &self.plan.key
    }

    #[must_use]
    pub fn plan(&self) -> &EpisodePlan {
        &self.plan
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, ControllerState::Terminated(_))
    }

    #[must_use]
    pub fn trajectory(&self) -> &[Pose] {
        &self.trajectory
    }

    #[must_use]
    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    #[must_use]
    pub fn instruction_index(&self) -> usize {
        self.instruction_index
    }

    /// The result, once terminated.
    #[must_use]
    pub fn outcome(&self) -> Option<&EpisodeResult> {
        self.result.as_ref()
    }
}

/// Relayed files carry the prefix of the service that produced them. A file
/// without one was dropped into the inbound channel directly and is trusted.
fn from_expected(envelope: &Envelope, expected: Provenance) -> bool {
    match envelope.provenance {
        Some(actual) if actual != expected => {
            warn!(
                file = %envelope.file_name,
                kind = envelope.message.kind().as_str(),
                "message from the wrong service dropped"
            );
            false
        }
        _ => true,
    }
}
