//! The async driver around [`TurnMachine`].
//!
//! One [`Coordinator`] runs one session. It is the only writer of the phase; the input layer talks
//! to it exclusively through a [`SessionHandle`], which classifies selections against the
//! published phase and hands them over through the turn signal.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    config::SessionConfig,
    display::{DisplayEvent, DisplayHandle},
    error::{ConfigError, CoordinatorError, SignalError},
    logic::{Side, Square},
    machine::{Effect, Phase, Trigger, TurnMachine},
    move_log::{LogEntry, MoveLog},
    opponent::{OpponentMover, ThinkingMover},
    signal::{TurnReleaser, TurnWaiter, turn_signal},
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndReason {
    Checkmate { winner: Side },
    Resigned { side: Side },
    /// Ended from outside without a result, or after a fatal error.
    Abandoned,
    /// Every [`SessionHandle`] was dropped.
    InputClosed,
}

/// What the input layer may know about the current phase. `turn` counts local turns and is used
/// to recognise selections made during an earlier turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub phase: Phase,
    pub turn: u64,
}

#[derive(Clone, Copy, Debug)]
struct Selection {
    square: Square,
    turn: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Handed to the coordinator as the origin of the next move.
    Origin,
    /// Handed to the coordinator as the destination of the current move.
    Destination,
    /// Not the local side's turn; nothing happened.
    Ignored,
}

/// Input-side view of a running session. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    input: TurnReleaser<Selection>,
    phase: watch::Receiver<Option<PhaseSnapshot>>,
    end: CancellationToken,
    reason: Arc<OnceLock<EndReason>>,
}

impl SessionHandle {
    pub fn select_square(&self, square: Square) -> Result<SelectOutcome, SignalError> {
        if self.end.is_cancelled() {
            return Err(SignalError::Closed);
        }
        let Some(snapshot) = *self.phase.borrow() else {
            return Ok(SelectOutcome::Ignored);
        };
        if !snapshot.phase.accepts_input() {
            debug!(%square, "ignoring selection during opponent turn");
            return Ok(SelectOutcome::Ignored);
        }
        let outcome = if snapshot.phase == Phase::AwaitingOrigin {
            SelectOutcome::Origin
        } else {
            SelectOutcome::Destination
        };
        self.input.release(Selection {
            square,
            turn: snapshot.turn,
        })?;
        Ok(outcome)
    }

    /// Ends the session. The first reason recorded wins.
    pub fn end(&self, reason: EndReason) {
        if self.reason.set(reason.clone()).is_err() {
            debug!(?reason, "session already ending, ignoring reason");
        }
        self.end.cancel();
    }

    pub fn phase(&self) -> Option<Phase> {
        self.snapshot().map(|s| s.phase)
    }

    pub fn snapshot(&self) -> Option<PhaseSnapshot> {
        *self.phase.borrow()
    }

    /// Resolves once the coordinator publishes `phase`. Returns `false` if the coordinator went
    /// away first.
    pub async fn wait_for_phase(&self, phase: Phase) -> bool {
        let mut rx = self.phase.clone();
        rx.wait_for(|s| s.map(|s| s.phase) == Some(phase))
            .await
            .is_ok()
    }

    pub async fn wait_for_snapshot(&self, snapshot: PhaseSnapshot) -> bool {
        let mut rx = self.phase.clone();
        rx.wait_for(|s| *s == Some(snapshot)).await.is_ok()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionReport {
    pub first_mover: Side,
    pub reason: EndReason,
    pub log: Vec<LogEntry>,
    pub elapsed: [Duration; 2],
}

impl SessionReport {
    pub fn elapsed(&self, side: Side) -> Duration {
        self.elapsed[side.index()]
    }
}

pub struct Coordinator<M> {
    first_mover: Side,
    machine: TurnMachine,
    turn: u64,
    clocks: [Clock; 2],
    mover: M,
    input: TurnWaiter<Selection>,
    phase_tx: watch::Sender<Option<PhaseSnapshot>>,
    log: MoveLog,
    display: DisplayHandle,
    end: CancellationToken,
    reason: Arc<OnceLock<EndReason>>,
}

impl Coordinator<ThinkingMover> {
    /// Builds a session with the stand-in opponent, flipping for the first mover if the config
    /// asks for it.
    pub fn from_config(
        config: &SessionConfig,
        display: DisplayHandle,
    ) -> Result<(Self, SessionHandle), ConfigError> {
        config.validate()?;
        let mut rng = config.rng();
        let first_mover = config.first_mover.resolve(&mut rng);
        let mover = ThinkingMover::from_config(config, StdRng::seed_from_u64(rng.next_u64()));
        Ok(Self::new(config, first_mover, mover, display))
    }
}

impl<M: OpponentMover> Coordinator<M> {
    pub fn new(
        config: &SessionConfig,
        first_mover: Side,
        mover: M,
        display: DisplayHandle,
    ) -> (Self, SessionHandle) {
        let (releaser, waiter) = turn_signal();
        let (phase_tx, phase_rx) = watch::channel(None);
        let end = CancellationToken::new();
        let reason = Arc::new(OnceLock::new());
        let clocks = Side::ALL.map(|side| Clock::new(side, config.clock_tick, display.clone()));

        let handle = SessionHandle {
            input: releaser,
            phase: phase_rx,
            end: end.clone(),
            reason: reason.clone(),
        };
        let coordinator = Self {
            first_mover,
            machine: TurnMachine::new(),
            turn: 0,
            clocks,
            mover,
            input: waiter,
            phase_tx,
            log: MoveLog::new(),
            display,
            end,
            reason,
        };
        (coordinator, handle)
    }

    pub fn first_mover(&self) -> Side {
        self.first_mover
    }

    /// Plays the session until it is ended from outside, the input side disconnects, or the
    /// opponent fails. Both clocks are stopped on every exit path.
    pub async fn run(mut self) -> Result<SessionReport, CoordinatorError> {
        info!(first_mover = %self.first_mover, "session started");
        let result = self.drive().await;
        if let Err(e) = &result {
            error!("session failed: {e}");
            let _ = self.reason.set(EndReason::Abandoned);
        }

        for clock in &mut self.clocks {
            clock.stop();
        }
        self.end.cancel();
        let reason = self
            .reason
            .get()
            .cloned()
            .unwrap_or(EndReason::InputClosed);
        info!(?reason, moves = self.log.len(), "session ended");
        self.display.emit(DisplayEvent::SessionEnded {
            reason: reason.clone(),
        });

        result.map(|()| SessionReport {
            first_mover: self.first_mover,
            reason,
            elapsed: self.clocks.each_ref().map(Clock::elapsed),
            log: self.log.into_entries(),
        })
    }

    async fn drive(&mut self) -> Result<(), CoordinatorError> {
        let effects = self.machine.start(self.first_mover);
        self.apply(effects);

        while !self.end.is_cancelled() {
            let Some(phase) = self.machine.phase() else {
                break;
            };
            let trigger = match phase {
                Phase::AwaitingOrigin | Phase::AwaitingDestination => {
                    let Some(square) = self.next_selection().await else {
                        break;
                    };
                    Trigger::Selected(square)
                }
                Phase::OpponentTurn => {
                    let moved = tokio::select! {
                        biased;
                        _ = self.end.cancelled() => None,
                        moved = self.mover.next_move(&self.display) => Some(moved?),
                    };
                    let Some(moved) = moved else {
                        break;
                    };
                    Trigger::OpponentMoved(moved)
                }
            };
            let effects = self.machine.apply(trigger)?;
            self.apply(effects);
        }
        Ok(())
    }

    /// Waits for a selection made during the current local turn, dropping any left over from
    /// an earlier one.
    async fn next_selection(&mut self) -> Option<Square> {
        loop {
            let selection = self.input.wait(&self.end).await?;
            if selection.turn == self.turn {
                return Some(selection.square);
            }
            warn!(
                square = %selection.square,
                turn = selection.turn,
                current = self.turn,
                "discarding selection from an earlier turn"
            );
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::EnterPhase(phase) => self.publish(phase),
                Effect::StopClock(side) => self.clocks[side.index()].stop(),
                Effect::StartClock(side) => self.clocks[side.index()].start(),
                Effect::AppendLog { side, descriptor } => {
                    let entry = self.log.append(side, &descriptor);
                    info!(%side, notation = %entry.notation, "move");
                    self.display.emit(DisplayEvent::MoveLogged {
                        side,
                        notation: entry.notation.clone(),
                    });
                }
                Effect::Status(text) => self.display.status(text),
            }
        }
    }

    fn publish(&mut self, phase: Phase) {
        if phase == Phase::AwaitingOrigin {
            let dropped = self.input.drain();
            if dropped > 0 {
                warn!(dropped, "dropping selections left over from the previous turn");
            }
            self.turn += 1;
        }
        self.phase_tx.send_replace(Some(PhaseSnapshot {
            phase,
            turn: self.turn,
        }));
        self.display.emit(DisplayEvent::PhaseChanged { phase });
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::BoxFuture;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::MoverError, logic::MoveDescriptor};

    struct Immediate(&'static str);

    impl OpponentMover for Immediate {
        fn next_move<'a>(
            &'a mut self,
            _display: &'a DisplayHandle,
        ) -> BoxFuture<'a, Result<MoveDescriptor, MoverError>> {
            let mv = MoveDescriptor::Opaque(self.0.to_string());
            Box::pin(async move { Ok(mv) })
        }
    }

    struct Broken;

    impl OpponentMover for Broken {
        fn next_move<'a>(
            &'a mut self,
            _display: &'a DisplayHandle,
        ) -> BoxFuture<'a, Result<MoveDescriptor, MoverError>> {
            Box::pin(async {
                Err(MoverError::NoMove {
                    reason: "engine crashed".into(),
                })
            })
        }
    }

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn selections_before_start_are_ignored() {
        let (_coordinator, handle) = Coordinator::new(
            &SessionConfig::default(),
            Side::Local,
            Immediate("xx:xx"),
            DisplayHandle::detached(),
        );
        assert_eq!(handle.phase(), None);
        assert_eq!(handle.select_square(sq("e2")), Ok(SelectOutcome::Ignored));
    }

    #[tokio::test(start_paused = true)]
    async fn plays_a_round_and_reports() {
        let (coordinator, handle) = Coordinator::new(
            &SessionConfig::default(),
            Side::Local,
            Immediate("e7:e5"),
            DisplayHandle::detached(),
        );
        let session = tokio::spawn(coordinator.run());

        assert!(handle.wait_for_phase(Phase::AwaitingOrigin).await);
        assert_eq!(handle.select_square(sq("e2")), Ok(SelectOutcome::Origin));
        assert!(handle.wait_for_phase(Phase::AwaitingDestination).await);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(handle.select_square(sq("e4")), Ok(SelectOutcome::Destination));
        assert!(
            handle
                .wait_for_snapshot(PhaseSnapshot {
                    phase: Phase::AwaitingOrigin,
                    turn: 2,
                })
                .await
        );
        handle.end(EndReason::Resigned { side: Side::Local });

        let report = session.await.unwrap().unwrap();
        assert_eq!(report.reason, EndReason::Resigned { side: Side::Local });
        assert_eq!(
            report.log,
            vec![
                LogEntry {
                    side: Side::Local,
                    notation: "e2:e4".into()
                },
                LogEntry {
                    side: Side::Remote,
                    notation: "e7:e5".into()
                },
            ]
        );
        assert_eq!(report.elapsed(Side::Local), Duration::from_secs(3));
        assert_eq!(report.elapsed(Side::Remote), Duration::ZERO);
        assert_eq!(handle.select_square(sq("a1")), Err(SignalError::Closed));
    }

    fn statuses(rx: &mut tokio::sync::mpsc::UnboundedReceiver<DisplayEvent>) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|event| match event {
                DisplayEvent::Status { text } => Some(text),
                DisplayEvent::MoveLogged { notation, .. } => Some(format!("logged {notation}")),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn selections_from_an_earlier_turn_are_discarded() {
        let (display, mut rx) = crate::display::channel();
        let (coordinator, handle) = Coordinator::new(
            &SessionConfig::default(),
            Side::Local,
            Immediate("xx:xx"),
            display,
        );
        let session = tokio::spawn(coordinator.run());
        let first_turn = PhaseSnapshot {
            phase: Phase::AwaitingOrigin,
            turn: 1,
        };
        assert!(handle.wait_for_snapshot(first_turn).await);

        handle
            .input
            .release(Selection {
                square: sq("e2"),
                turn: 0,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.snapshot(), Some(first_turn));

        // The stale wake was consumed, so the slot is free again.
        assert_eq!(handle.select_square(sq("d2")), Ok(SelectOutcome::Origin));
        assert!(handle.wait_for_phase(Phase::AwaitingDestination).await);
        handle.end(EndReason::Abandoned);

        let report = session.await.unwrap().unwrap();
        assert!(report.log.is_empty());
        assert_eq!(statuses(&mut rx), ["Player d2 : _"]);
    }

    #[tokio::test(start_paused = true)]
    async fn entering_a_turn_drains_pending_selections() {
        let (display, mut rx) = crate::display::channel();
        let (coordinator, handle) = Coordinator::new(
            &SessionConfig::default(),
            Side::Local,
            Immediate("xx:xx"),
            display,
        );
        handle
            .input
            .release(Selection {
                square: sq("a7"),
                turn: 1,
            })
            .unwrap();
        // Tagged with the turn about to start: only the drain keeps it from becoming the origin.
        let session = tokio::spawn(coordinator.run());
        assert!(handle.wait_for_phase(Phase::AwaitingOrigin).await);

        assert_eq!(handle.select_square(sq("e4")), Ok(SelectOutcome::Origin));
        assert!(handle.wait_for_phase(Phase::AwaitingDestination).await);
        handle.end(EndReason::Abandoned);

        let report = session.await.unwrap().unwrap();
        assert!(report.log.is_empty());
        assert_eq!(statuses(&mut rx), ["Player e4 : _"]);
    }

    #[tokio::test(start_paused = true)]
    async fn mover_failure_is_fatal_and_stops_clocks() {
        let (display, mut rx) = crate::display::channel();
        let (coordinator, _handle) =
            Coordinator::new(&SessionConfig::default(), Side::Remote, Broken, display);

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Mover(MoverError::NoMove { .. })));

        let events: Vec<DisplayEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            events.last(),
            Some(&DisplayEvent::SessionEnded {
                reason: EndReason::Abandoned
            })
        );
        assert!(events.contains(&DisplayEvent::ClockHighlight {
            side: Side::Remote,
            active: false
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_ends_the_session() {
        let (coordinator, handle) = Coordinator::new(
            &SessionConfig::default(),
            Side::Local,
            Immediate("xx:xx"),
            DisplayHandle::detached(),
        );
        drop(handle);
        let report = coordinator.run().await.unwrap();
        assert_eq!(report.reason, EndReason::InputClosed);
        assert!(report.log.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn first_end_reason_wins() {
        let (coordinator, handle) = Coordinator::new(
            &SessionConfig::default(),
            Side::Local,
            Immediate("xx:xx"),
            DisplayHandle::detached(),
        );
        handle.end(EndReason::Checkmate {
            winner: Side::Remote,
        });
        handle.end(EndReason::Abandoned);
        assert_eq!(handle.select_square(sq("e2")), Err(SignalError::Closed));
        let report = coordinator.run().await.unwrap();
        assert_eq!(
            report.reason,
            EndReason::Checkmate {
                winner: Side::Remote
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn from_config_honours_fixed_first_mover() {
        let config = SessionConfig {
            first_mover: crate::config::FirstMover::Remote,
            seed: Some(3),
            ..Default::default()
        };
        let (coordinator, _handle) =
            Coordinator::from_config(&config, DisplayHandle::detached()).unwrap();
        assert_eq!(coordinator.first_mover(), Side::Remote);

        let config = SessionConfig {
            thinking_min_ticks: 10,
            ..Default::default()
        };
        assert!(Coordinator::from_config(&config, DisplayHandle::detached()).is_err());
    }
}
