//! Configuration for a simplification run

use crate::constants::DEFAULT_TIP_LENGTH_FACTOR;

/// Parameters for simplifying a pre-graph
#[derive(Debug, Clone)]
pub struct SimplifyConfiguration {
    /// Number of worker threads (0 = all available cores, 1 = sequential)
    pub num_threads: usize,

    /// Clip tips before the final contraction (contraction only if false)
    pub clip_tips: bool,

    /// Tips shorter than `tip_length_factor * k` k-mers are clipped
    pub tip_length_factor: usize,

    /// Verbose output
    pub verbose: bool,
}

impl Default for SimplifyConfiguration {
    fn default() -> Self {
        Self {
            num_threads: 0,
            clip_tips: true,
            tip_length_factor: DEFAULT_TIP_LENGTH_FACTOR,
            verbose: false,
        }
    }
}

impl SimplifyConfiguration {
    /// Configuration running on `num_threads` threads with default settings
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Self::default()
        }
    }

    /// Whether the run uses the parallel code paths
    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.num_threads != 1
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.tip_length_factor == 0 {
            return Err("tip_length_factor must be at least 1".to_string());
        }
        Ok(())
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        tracing::info!("Simplify Configuration:");
        if self.num_threads == 0 {
            tracing::info!("  num_threads = all available cores");
        } else {
            tracing::info!("  num_threads = {}", self.num_threads);
        }
        tracing::info!("  clip_tips = {}", self.clip_tips);
        tracing::debug!("  tip_length_factor = {}", self.tip_length_factor);
        tracing::debug!("  verbose = {}", self.verbose);
    }
}
