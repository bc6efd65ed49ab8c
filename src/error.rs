use crate::machine::Phase;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseSquareError {
    #[error("expected two characters like `e2`, got `{0}`")]
    BadLength(String),
    #[error("`{0}` is not on the board")]
    OutOfBoard(String),
}

/// Why a [`crate::signal::TurnReleaser::release`] was not accepted.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    #[error("a selection is already waiting to be processed")]
    AlreadyPending,
    #[error("the session is no longer accepting input")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum MoverError {
    #[error("opponent could not produce a move: {reason}")]
    NoMove { reason: String },
}

/// Session-fatal coordinator failures.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Mover(#[from] MoverError),

    #[error("trigger `{trigger}` does not apply in phase {phase:?}")]
    UnexpectedTrigger {
        phase: Option<Phase>,
        trigger: &'static str,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("thinking range is empty: min {min} > max {max}")]
    EmptyThinkingRange { min: u32, max: u32 },

    #[error("{name} must be longer than zero")]
    ZeroPeriod { name: &'static str },
}
