use std::time::Duration;

/// How a polling loop waits between ticks when it found nothing to do.
///
/// Implementations may return early (for example when a directory changed),
/// but must never block longer than `timeout`.
pub trait Idle {
    fn idle(&mut self, timeout: Duration);
}

/// Plain sleep for the whole interval.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepIdle;

impl Idle for SleepIdle {
    fn idle(&mut self, timeout: Duration) {
        std::thread::sleep(timeout);
    }
}
