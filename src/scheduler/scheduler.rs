/// Where a scheduler is at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerState {
    /// The amount of times the scheduler was advanced, counting from a resumed checkpoint.
    pub step: usize,
    pub learning_rate: f32,
}

/// Produces the learning rate of every scheduler step.
///
/// Schedulers are built once per session by a factory that receives an `OptimizerView`,
/// from which they read the initial learning rate and the step to resume from.
pub trait LrScheduler: Send {
    /// Moves the scheduler one step forward.
    ///
    /// # Returns
    /// The learning rate of the new step.
    fn advance(&mut self) -> f32;

    fn state(&self) -> SchedulerState;
}
