use tracing::{debug, info};

/// How a computed progression is stored in the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressPolicy {
    /// Keep the progression within `0..=100`
    #[default]
    Clamped,

    /// Store the progression as computed, even above 100
    Raw,
}

impl ProgressPolicy {
    pub fn apply(self, progression: u32) -> u32 {
        match self {
            ProgressPolicy::Clamped => progression.min(100),
            ProgressPolicy::Raw => progression,
        }
    }
}

/// What happens to the progression on steps that do not compute one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressionCarryOver {
    /// The last progression stays on display
    #[default]
    Keep,

    /// The progression goes back to zero
    Reset,
}

/// Configuration of a block status projector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectorConfig {
    pub progress_policy: ProgressPolicy,
    pub progression_carry_over: ProgressionCarryOver,
}

/// A builder for the projector configuration
#[derive(Debug, Default)]
pub struct ProjectorConfigBuilder {
    config: ProjectorConfig,
}

impl ProjectorConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how computed progressions are bounded
    pub fn with_progress_policy(mut self, progress_policy: ProgressPolicy) -> Self {
        debug!(?progress_policy, "Setting progress policy");
        self.config.progress_policy = progress_policy;
        self
    }

    /// Set what steps without a progression do to the display
    pub fn with_progression_carry_over(mut self, carry_over: ProgressionCarryOver) -> Self {
        debug!(?carry_over, "Setting progression carry-over");
        self.config.progression_carry_over = carry_over;
        self
    }

    pub fn build(self) -> ProjectorConfig {
        info!(
            progress_policy = ?self.config.progress_policy,
            carry_over = ?self.config.progression_carry_over,
            "Building ProjectorConfig"
        );
        self.config
    }
}
