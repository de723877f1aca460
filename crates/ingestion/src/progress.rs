//! Async-friendly progress delivery.

use tokio::sync::watch;

use hydro_common::ProgressSink;

/// One progress observation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub message: String,
}

/// [`ProgressSink`] backed by a `watch` channel.
///
/// `watch` keeps only the latest value, so a slow or absent observer never
/// blocks the reporting job; intermediate updates are dropped, the most
/// recent always wins.
pub struct WatchProgress {
    tx: watch::Sender<ProgressUpdate>,
}

impl WatchProgress {
    pub fn channel() -> (Self, watch::Receiver<ProgressUpdate>) {
        let (tx, rx) = watch::channel(ProgressUpdate::default());
        (Self { tx }, rx)
    }
}

impl ProgressSink for WatchProgress {
    fn report(&self, percent: u8, message: &str) {
        // Send fails only when every receiver is gone; reporting into the
        // void is fine.
        let _ = self.tx.send(ProgressUpdate {
            percent,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_sees_the_latest_update() {
        let (sink, rx) = WatchProgress::channel();
        sink.report(10, "Reading line 1 of 10...");
        sink.report(50, "Reading line 5 of 10...");

        let latest = rx.borrow().clone();
        assert_eq!(latest.percent, 50);
        assert_eq!(latest.message, "Reading line 5 of 10...");
    }

    #[test]
    fn reporting_without_observers_does_not_panic() {
        let (sink, rx) = WatchProgress::channel();
        drop(rx);
        sink.report(100, "All lines read");
    }
}
