//! The turn cycle as a pure state machine.
//!
//! [`TurnMachine`] never touches a clock, a channel or the log. Every call returns the ordered list
//! of [`Effect`]s the caller has to carry out, which keeps the transition table testable without a
//! runtime.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::CoordinatorError,
    logic::{MoveDescriptor, Side, Square},
};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Phase {
    AwaitingOrigin,
    AwaitingDestination,
    OpponentTurn,
}

impl Phase {
    pub fn initial(first_mover: Side) -> Self {
        match first_mover {
            Side::Local => Phase::AwaitingOrigin,
            Side::Remote => Phase::OpponentTurn,
        }
    }

    /// Whose turn it is while in this phase.
    pub fn side(&self) -> Side {
        match self {
            Phase::AwaitingOrigin | Phase::AwaitingDestination => Side::Local,
            Phase::OpponentTurn => Side::Remote,
        }
    }

    pub fn accepts_input(&self) -> bool {
        self.side() == Side::Local
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The turn signal woke the coordinator with a selected square.
    Selected(Square),
    /// The opponent mover finished thinking.
    OpponentMoved(MoveDescriptor),
}

impl Trigger {
    fn name(&self) -> &'static str {
        match self {
            Trigger::Selected(_) => "selected",
            Trigger::OpponentMoved(_) => "opponent_moved",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    EnterPhase(Phase),
    StopClock(Side),
    StartClock(Side),
    AppendLog { side: Side, descriptor: MoveDescriptor },
    Status(String),
}

#[derive(Clone, Debug, Default)]
pub struct TurnMachine {
    phase: Option<Phase>,
    origin: Option<Square>,
}

impl TurnMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until [`TurnMachine::start`] has been called.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn start(&mut self, first_mover: Side) -> Vec<Effect> {
        self.enter(Phase::initial(first_mover))
    }

    pub fn apply(&mut self, trigger: Trigger) -> Result<Vec<Effect>, CoordinatorError> {
        let unexpected = |phase, trigger: &Trigger| CoordinatorError::UnexpectedTrigger {
            phase,
            trigger: trigger.name(),
        };
        let mut effects = Vec::new();
        match (self.phase, trigger) {
            (Some(Phase::AwaitingOrigin), Trigger::Selected(origin)) => {
                self.origin = Some(origin);
                effects.push(Effect::Status(format!("Player {origin} : _")));
                effects.extend(self.enter(Phase::AwaitingDestination));
            }
            (Some(Phase::AwaitingDestination), Trigger::Selected(destination)) => {
                let origin = self
                    .origin
                    .take()
                    .ok_or_else(|| unexpected(self.phase, &Trigger::Selected(destination)))?;
                effects.push(Effect::Status(format!("Player {origin} : {destination}")));
                effects.push(Effect::AppendLog {
                    side: Side::Local,
                    descriptor: MoveDescriptor::Local {
                        origin,
                        destination,
                    },
                });
                effects.extend(self.enter(Phase::OpponentTurn));
            }
            (Some(Phase::OpponentTurn), Trigger::OpponentMoved(descriptor)) => {
                effects.push(Effect::AppendLog {
                    side: Side::Remote,
                    descriptor,
                });
                effects.extend(self.enter(Phase::AwaitingOrigin));
            }
            (phase, trigger) => return Err(unexpected(phase, &trigger)),
        }
        Ok(effects)
    }

    /// Moves to `next`, returning its entry actions. Re-entering the current phase is a no-op so a
    /// running clock is never restarted.
    pub fn enter(&mut self, next: Phase) -> Vec<Effect> {
        if self.phase == Some(next) {
            return Vec::new();
        }
        debug!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = Some(next);
        let mut effects = vec![Effect::EnterPhase(next)];
        match next {
            Phase::AwaitingOrigin => {
                effects.push(Effect::StopClock(Side::Remote));
                effects.push(Effect::StartClock(Side::Local));
            }
            Phase::OpponentTurn => {
                effects.push(Effect::StopClock(Side::Local));
                effects.push(Effect::StartClock(Side::Remote));
            }
            Phase::AwaitingDestination => {}
        }
        effects
    }
}
