//! Cooperative shutdown signal
//!
//! The daemon owns a `watch` sender; every background task holds a receiver
//! and checks it between iterations, so no task stops halfway through a unit
//! of work.

use tokio::sync::watch;

/// Create a shutdown sender and its first receiver
#[must_use]
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolve once shutdown has been requested or the sender is gone
pub async fn signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn resolves_after_signal() {
        let (tx, mut rx) = channel();
        let waiter = tokio::spawn(async move { signalled(&mut rx).await });

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn resolves_when_sender_dropped() {
        let (tx, mut rx) = channel();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), signalled(&mut rx))
            .await
            .unwrap();
    }

    #[test]
    fn pending_until_signalled() {
        let (tx, mut rx) = channel();
        let mut waiter = tokio_test::task::spawn(signalled(&mut rx));
        tokio_test::assert_pending!(waiter.poll());

        tx.send(true).unwrap();
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }
}
