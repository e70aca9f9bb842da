//! Tick timers for the countdown pre-roll and the elapsed recording clock.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A once-per-period tick emitter.
///
/// Owned by the session coordinator (never module-global); each tick posts
/// a message into the coordinator's command queue, so ticks are serialized
/// with user commands. Best effort only: platform timer jitter is
/// accepted.
pub struct Ticker<T> {
    period: Duration,
    task: Option<JoinHandle<()>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Ticker<T> {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            task: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Begin emitting one message per period. A running ticker is replaced.
    /// The first tick fires one full period after start.
    pub fn start<F>(&mut self, tx: mpsc::Sender<T>, make: F)
    where
        F: Fn() -> T + Send + 'static,
    {
        self.stop();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if tx.send(make()).await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Cancel the scheduled ticks. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl<T> Drop for Ticker<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticks_arrive_once_per_period() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut ticker = Ticker::new(Duration::from_millis(10));
        ticker.start(tx, || ());

        for _ in 0..3 {
            tokio::time::timeout(Duration::from_millis(200), rx.recv())
                .await
                .expect("tick arrived")
                .expect("channel open");
        }
        ticker.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (tx, mut rx) = mpsc::channel::<()>(8);
        let mut ticker = Ticker::new(Duration::from_millis(5));
        ticker.start(tx, || ());
        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());

        // Drain anything emitted before the stop, then confirm silence
        tokio::time::sleep(Duration::from_millis(30)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());
    }
}
