use std::{ops::RangeInclusive, time::Duration};

use futures_util::future::BoxFuture;
use rand::{Rng, rngs::StdRng};
use tracing::debug;

use crate::{
    config::SessionConfig,
    display::DisplayHandle,
    error::MoverError,
    logic::MoveDescriptor,
};

/// Produces the remote side's move. Implementations may take as long as they like; the coordinator
/// drops the returned future if the session ends first, so they must not rely on running to
/// completion.
pub trait OpponentMover: Send {
    fn next_move<'a>(
        &'a mut self,
        display: &'a DisplayHandle,
    ) -> BoxFuture<'a, Result<MoveDescriptor, MoverError>>;
}

pub const PLACEHOLDER_MOVE: &str = "xx:xx";

/// Stand-in opponent: "thinks" for a random number of ticks and then plays a placeholder move.
pub struct ThinkingMover {
    rng: StdRng,
    ticks: RangeInclusive<u32>,
    tick: Duration,
}

impl ThinkingMover {
    pub fn new(ticks: RangeInclusive<u32>, tick: Duration, rng: StdRng) -> Self {
        Self { rng, ticks, tick }
    }

    pub fn from_config(config: &SessionConfig, rng: StdRng) -> Self {
        Self::new(config.thinking_ticks(), config.thinking_tick, rng)
    }
}

impl OpponentMover for ThinkingMover {
    fn next_move<'a>(
        &'a mut self,
        display: &'a DisplayHandle,
    ) -> BoxFuture<'a, Result<MoveDescriptor, MoverError>> {
        Box::pin(async move {
            let ticks = self.rng.gen_range(self.ticks.clone());
            debug!(ticks, "opponent thinking");
            let mut status = String::from("Opponent thinking");
            display.status(status.clone());
            for _ in 0..ticks {
                status.push('.');
                display.status(status.clone());
                tokio::time::sleep(self.tick).await;
            }
            display.status(format!("Opponent moved {PLACEHOLDER_MOVE}"));
            Ok(MoveDescriptor::Opaque(PLACEHOLDER_MOVE.to_string()))
        })
    }
}
