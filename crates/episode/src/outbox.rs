use mailbox::{Channel, InstructionSlot, Mailbox};
use protocol::{EpisodeKey, InstructionContext, Message, Observation};
use tracing::debug;

use crate::{EpisodeError, EpisodeResult, ResultStore};

/// Everything an [`EpisodeController`](crate::EpisodeController) writes to
/// the outside world.
pub trait Outbox {
    /// Replaces the policy service's instruction context.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn publish_instruction(&mut self, context: &InstructionContext) -> Result<(), EpisodeError>;

    /// # Errors
    ///
    /// Implementation specific.
    fn send_to_simulator(&mut self, message: &Message) -> Result<(), EpisodeError>;

    /// # Errors
    ///
    /// Implementation specific.
    fn send_to_model(&mut self, observation: &Observation) -> Result<(), EpisodeError>;

    /// # Errors
    ///
    /// Implementation specific.
    fn persist_result(&mut self, result: &EpisodeResult) -> Result<(), EpisodeError>;

    /// Tells the simulator the episode is over.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn release_simulator(&mut self, episode_key: &EpisodeKey) -> Result<(), EpisodeError>;
}

/// [`Outbox`] over the shared mailbox tree.
#[derive(Debug, Clone)]
pub struct MailboxOutbox {
    mailbox: Mailbox,
    slot: InstructionSlot,
    results: ResultStore,
}

impl MailboxOutbox {
    #[must_use]
    pub fn new(mailbox: Mailbox, results: ResultStore) -> Self {
        let slot = InstructionSlot::new(mailbox.layout());
        Self {
            mailbox,
            slot,
            results,
        }
    }

    #[must_use]
    pub fn results(&self) -> &ResultStore {
        &self.results
    }
}

impl Outbox for MailboxOutbox {
    fn publish_instruction(&mut self, context: &InstructionContext) -> Result<(), EpisodeError> {
        self.slot.write(context)?;
        Ok(())
    }

    fn send_to_simulator(&mut self, message: &Message) -> Result<(), EpisodeError> {
        self.mailbox.publish(Channel::SimInput, message)?;
        Ok(())
    }

    fn send_to_model(&mut self, observation: &Observation) -> Result<(), EpisodeError> {
        self.mailbox
            .publish(Channel::ModelInput, &Message::Observation(observation.clone()))?;
        Ok(())
    }

    fn persist_result(&mut self, result: &EpisodeResult) -> Result<(), EpisodeError> {
        let path = self.results.write(result)?;
        debug!(path = %path.display(), "episode result written");
        Ok(())
    }

    fn release_simulator(&mut self, episode_key: &EpisodeKey) -> Result<(), EpisodeError> {
        self.mailbox.publish_sentinel(Channel::SimInput, episode_key)?;
        Ok(())
    }
}
