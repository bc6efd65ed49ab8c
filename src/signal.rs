//! Single-slot handoff from the input layer to the coordinator.
//!
//! At most one wake can be pending. Releasing while one is pending is rejected with
//! [`SignalError::AlreadyPending`] instead of being dropped on the floor, so the input layer can
//! tell its user the selection did not register.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::SignalError;

pub fn turn_signal<T>() -> (TurnReleaser<T>, TurnWaiter<T>) {
    let (tx, rx) = mpsc::channel(1);
    (TurnReleaser { tx }, TurnWaiter { rx })
}

#[derive(Debug)]
pub struct TurnReleaser<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for TurnReleaser<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TurnReleaser<T> {
    /// Hands one wake to the waiting side without blocking.
    pub fn release(&self, value: T) -> Result<(), SignalError> {
        match self.tx.try_send(value) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("turn signal already has a pending wake, rejecting release");
                Err(SignalError::AlreadyPending)
            }
            Err(TrySendError::Closed(_)) => Err(SignalError::Closed),
        }
    }
}

#[derive(Debug)]
pub struct TurnWaiter<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> TurnWaiter<T> {
    /// Suspends until a wake is released and consumes it. Returns `None` once `cancel` fires or
    /// every releaser is gone.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Option<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            value = self.rx.recv() => value,
        }
    }

    /// Discards a pending wake, if any. Returns how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_consumes_a_released_wake() {
        let (releaser, mut waiter) = turn_signal();
        releaser.release(7).unwrap();
        assert_eq!(waiter.wait(&CancellationToken::new()).await, Some(7));
    }

    #[tokio::test]
    async fn second_release_is_rejected_not_lost() {
        let (releaser, mut waiter) = turn_signal();
        releaser.release("first").unwrap();
        assert_eq!(releaser.release("second"), Err(SignalError::AlreadyPending));

        let cancel = CancellationToken::new();
        assert_eq!(waiter.wait(&cancel).await, Some("first"));
        releaser.release("third").unwrap();
        assert_eq!(waiter.wait(&cancel).await, Some("third"));
    }

    #[tokio::test]
    async fn release_from_another_task_wakes_waiter() {
        let (releaser, mut waiter) = turn_signal();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            releaser.release(()).unwrap();
        });
        assert_eq!(waiter.wait(&CancellationToken::new()).await, Some(()));
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_unblocks_waiter() {
        let (_releaser, mut waiter) = turn_signal::<()>();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        assert_eq!(waiter.wait(&cancel).await, None);
    }

    #[tokio::test]
    async fn dropped_releasers_close_the_signal() {
        let (releaser, mut waiter) = turn_signal::<u8>();
        drop(releaser);
        assert_eq!(waiter.wait(&CancellationToken::new()).await, None);
    }

    #[tokio::test]
    async fn release_after_waiter_dropped_is_closed() {
        let (releaser, waiter) = turn_signal::<u8>();
        drop(waiter);
        assert_eq!(releaser.release(1), Err(SignalError::Closed));
    }

    #[test]
    fn drain_frees_the_slot() {
        let (releaser, mut waiter) = turn_signal();
        assert_eq!(waiter.drain(), 0);
        releaser.release(1).unwrap();
        assert_eq!(waiter.drain(), 1);
        releaser.release(2).unwrap();
    }
}
