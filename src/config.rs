use std::{ops::RangeInclusive, time::Duration};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{clock::DEFAULT_TICK_PERIOD, error::ConfigError, logic::Side};

/// Who opens the session. `Random` is a fair coin flip, resolved once at session start.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum FirstMover {
    Local,
    Remote,
    #[default]
    Random,
}

impl FirstMover {
    pub fn resolve(self, rng: &mut impl Rng) -> Side {
        match self {
            FirstMover::Local => Side::Local,
            FirstMover::Remote => Side::Remote,
            FirstMover::Random => {
                if rng.gen_bool(0.5) {
                    Side::Local
                } else {
                    Side::Remote
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// How often a running clock reports its elapsed time. Default: 500ms.
    pub clock_tick: Duration,
    /// Length of one opponent "thinking" step. Default: 1s.
    pub thinking_tick: Duration,
    /// Smallest number of thinking steps the opponent takes. Default: 5.
    pub thinking_min_ticks: u32,
    /// Largest number of thinking steps the opponent takes. Default: 9.
    pub thinking_max_ticks: u32,
    pub first_mover: FirstMover,
    /// Seed for the opponent and the coin flip. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clock_tick: DEFAULT_TICK_PERIOD,
            thinking_tick: Duration::from_secs(1),
            thinking_min_ticks: 5,
            thinking_max_ticks: 9,
            first_mover: FirstMover::Random,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_tick.is_zero() {
            return Err(ConfigError::ZeroPeriod { name: "clock tick" });
        }
        if self.thinking_tick.is_zero() {
            return Err(ConfigError::ZeroPeriod {
                name: "thinking tick",
            });
        }
        if self.thinking_min_ticks > self.thinking_max_ticks {
            return Err(ConfigError::EmptyThinkingRange {
                min: self.thinking_min_ticks,
                max: self.thinking_max_ticks,
            });
        }
        Ok(())
    }

    /// Session RNG: deterministic when a seed is configured.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn thinking_ticks(&self) -> RangeInclusive<u32> {
        self.thinking_min_ticks..=self.thinking_max_ticks
    }
}

/// Command-line view of [`SessionConfig`], shared by the binaries.
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Who moves first.
    #[arg(long, value_enum, default_value_t = FirstMover::Random)]
    pub first_mover: FirstMover,

    /// Seed for the coin flip and the opponent's thinking time.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Clock refresh period in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub clock_tick_ms: u64,

    /// Length of one opponent thinking step in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub think_tick_ms: u64,

    #[arg(long, default_value_t = 5)]
    pub think_min: u32,

    #[arg(long, default_value_t = 9)]
    pub think_max: u32,
}

impl From<&SessionArgs> for SessionConfig {
    fn from(args: &SessionArgs) -> Self {
        SessionConfig {
            clock_tick: Duration::from_millis(args.clock_tick_ms),
            thinking_tick: Duration::from_millis(args.think_tick_ms),
            thinking_min_ticks: args.think_min,
            thinking_max_ticks: args.think_max,
            first_mover: args.first_mover,
            seed: args.seed,
        }
    }
}
