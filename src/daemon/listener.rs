//! Block arrival notification
//!
//! [`BlockNotifier`] keeps the listener registry and the last notified height.
//! [`BlockPoller`] drives it from a background task that runs only while
//! listeners are registered.

use crate::core::BlockHeader;
use crate::daemon::range::RangeSource;
use crate::daemon::DaemonError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Receives headers of newly added blocks
pub trait BlockListener: Send + Sync {
    fn on_block_header(&self, header: &BlockHeader);
}

impl<F> BlockListener for F
where
    F: Fn(&BlockHeader) + Send + Sync,
{
    fn on_block_header(&self, header: &BlockHeader) {
        self(header)
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// Listener registry with exactly-once, in-order delivery
#[derive(Default)]
pub struct BlockNotifier {
    listeners: Mutex<Vec<Arc<dyn BlockListener>>>,
    last_height: Mutex<Option<u64>>,
    /// Held for a whole delivery pass so concurrent passes cannot interleave
    pass: Mutex<()>,
}

impl BlockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns the number registered afterwards
    pub fn add(&self, listener: Arc<dyn BlockListener>) -> usize {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push(listener);
        listeners.len()
    }

    /// Unregister a listener by identity; returns whether it was registered
    pub fn remove(&self, listener: &Arc<dyn BlockListener>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn BlockListener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_height(&self) -> Option<u64> {
        *self.last_height.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Forget the last notified height; the next poll sets a new baseline
    pub fn reset(&self) {
        *self.last_height.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Deliver headers above the last notified height, lowest first
    ///
    /// Listeners are snapshotted once per pass and passes are serialized, so
    /// a listener must not call `notify` itself. Returns how many headers
    /// were delivered.
    pub fn notify(&self, headers: &[BlockHeader]) -> usize {
        let _pass = self.pass.lock().unwrap_or_else(|e| e.into_inner());
        let listeners = self.snapshot();
        let mut sorted: Vec<&BlockHeader> = headers.iter().filter(|h| h.height.is_some()).collect();
        sorted.sort_by_key(|h| h.height);

        let mut delivered = 0;
        for header in sorted {
            let Some(height) = header.height else { continue };
            {
                let mut last = self.last_height.lock().unwrap_or_else(|e| e.into_inner());
                if last.is_some_and(|l| height <= l) {
                    continue;
                }
                *last = Some(height);
            }
            for listener in &listeners {
                listener.on_block_header(header);
            }
            delivered += 1;
        }
        delivered
    }

    /// Check the tip once and deliver every block added since the last check
    ///
    /// The first call only records the current tip.
    pub async fn poll_once<S: RangeSource + ?Sized>(&self, source: &S) -> Result<usize, DaemonError> {
        let tip = source.tip_header().await?;
        let tip_height = tip
            .height
            .ok_or_else(|| DaemonError::InvalidResponse("tip header without height".to_string()))?;

        let Some(last) = self.last_height() else {
            log::debug!("Block notifier baseline at height {}", tip_height);
            *self.last_height.lock().unwrap_or_else(|e| e.into_inner()) = Some(tip_height);
            return Ok(0);
        };
        if tip_height <= last {
            return Ok(0);
        }

        let headers = if tip_height == last + 1 {
            vec![tip]
        } else {
            source.headers(last + 1, tip_height).await?
        };
        let delivered = self.notify(&headers);
        log::debug!("Notified {} new block(s) up to height {}", delivered, tip_height);
        Ok(delivered)
    }
}

// =============================================================================
// Poller
// =============================================================================

/// Background task polling a source for new blocks
pub struct BlockPoller {
    notifier: Arc<BlockNotifier>,
    interval: Duration,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl BlockPoller {
    pub fn new(notifier: Arc<BlockNotifier>, interval: Duration) -> Self {
        Self {
            notifier,
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn notifier(&self) -> &Arc<BlockNotifier> {
        &self.notifier
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Spawn the polling task unless one is running
    ///
    /// Needs a Tokio runtime; without one the poller stays stopped. The task
    /// ends when `source` answers with [`DaemonError::Cancelled`].
    pub fn start(&self, source: Arc<dyn RangeSource>) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|(_, handle)| !handle.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No async runtime, block polling not started");
            return;
        };

        let token = CancellationToken::new();
        let notifier = Arc::clone(&self.notifier);
        let interval = self.interval.max(Duration::from_millis(1));
        let stop = token.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match notifier.poll_once(source.as_ref()).await {
                    Ok(_) => {}
                    // The source is gone
                    Err(DaemonError::Cancelled) => break,
                    Err(e) => log::warn!("Block poll failed: {}", e),
                }
            }
            log::debug!("Block poller stopped");
        });
        log::info!("Block poller started ({:?} interval)", interval);
        *task = Some((token, handle));
    }

    /// Stop the polling task and reset the notifier baseline
    pub fn stop(&self) {
        if let Some((token, _handle)) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
        self.notifier.reset();
    }
}

impl Drop for BlockPoller {
    fn drop(&mut self) {
        if let Some((token, _)) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Block;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn header(height: u64) -> BlockHeader {
        BlockHeader {
            height: Some(height),
            ..Default::default()
        }
    }

    /// Chain whose tip can be moved by the test
    struct MovingTip {
        tip: AtomicU64,
    }

    #[async_trait]
    impl RangeSource for MovingTip {
        async fn tip_header(&self) -> Result<BlockHeader, DaemonError> {
            Ok(header(self.tip.load(Ordering::SeqCst)))
        }

        async fn headers(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, DaemonError> {
            Ok((start..=end).map(header).collect())
        }

        async fn blocks(&self, _heights: &[u64]) -> Result<Vec<Block>, DaemonError> {
            Ok(Vec::new())
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, Arc<dyn BlockListener>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Arc<dyn BlockListener> = Arc::new(move |h: &BlockHeader| {
            sink.lock().unwrap().push(h.height.unwrap());
        });
        (seen, listener)
    }

    #[test]
    fn test_notify_once_in_order() {
        let notifier = BlockNotifier::new();
        let (seen, listener) = recorder();
        notifier.add(listener);

        assert_eq!(notifier.notify(&[header(3), header(1), header(2)]), 3);
        assert_eq!(notifier.notify(&[header(2), header(3), header(4)]), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_removal_during_pass_uses_snapshot() {
        let notifier = Arc::new(BlockNotifier::new());
        let (seen, second) = recorder();

        let registry = Arc::clone(&notifier);
        let target = Arc::clone(&second);
        let first: Arc<dyn BlockListener> = Arc::new(move |_: &BlockHeader| {
            registry.remove(&target);
        });
        notifier.add(first);
        notifier.add(Arc::clone(&second));

        notifier.notify(&[header(1), header(2)]);
        // The pass already in progress still reaches the removed listener
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(notifier.len(), 1);

        notifier.notify(&[header(3)]);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_poll_once_skips_nothing() {
        let source = MovingTip { tip: AtomicU64::new(10) };
        let notifier = BlockNotifier::new();
        let (seen, listener) = recorder();
        notifier.add(listener);

        assert_eq!(notifier.poll_once(&source).await.unwrap(), 0);
        assert_eq!(notifier.last_height(), Some(10));

        source.tip.store(13, Ordering::SeqCst);
        assert_eq!(notifier.poll_once(&source).await.unwrap(), 3);
        source.tip.store(14, Ordering::SeqCst);
        notifier.poll_once(&source).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![11, 12, 13, 14]);
    }

    /// Source whose backing daemon has been dropped
    struct Gone;

    #[async_trait]
    impl RangeSource for Gone {
        async fn tip_header(&self) -> Result<BlockHeader, DaemonError> {
            Err(DaemonError::Cancelled)
        }

        async fn headers(&self, _start: u64, _end: u64) -> Result<Vec<BlockHeader>, DaemonError> {
            Err(DaemonError::Cancelled)
        }

        async fn blocks(&self, _heights: &[u64]) -> Result<Vec<Block>, DaemonError> {
            Err(DaemonError::Cancelled)
        }
    }

    #[tokio::test]
    async fn test_poller_exits_when_source_is_gone() {
        let poller = BlockPoller::new(Arc::new(BlockNotifier::new()), Duration::from_millis(5));
        poller.start(Arc::new(Gone));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!poller.is_running());
    }

    #[test]
    fn test_concurrent_passes_deliver_in_order() {
        let notifier = Arc::new(BlockNotifier::new());
        let (seen, listener) = recorder();
        notifier.add(listener);

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let notifier = Arc::clone(&notifier);
                std::thread::spawn(move || {
                    let batch: Vec<BlockHeader> = (1..=50).map(|h| header(h * 4 + i)).collect();
                    notifier.notify(&batch);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_poller_start_stop() {
        let source: Arc<dyn RangeSource> = Arc::new(MovingTip { tip: AtomicU64::new(5) });
        let notifier = Arc::new(BlockNotifier::new());
        let poller = BlockPoller::new(Arc::clone(&notifier), Duration::from_millis(5));

        poller.start(Arc::clone(&source));
        assert!(poller.is_running());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(notifier.last_height(), Some(5));

        poller.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!poller.is_running());
        assert_eq!(notifier.last_height(), None);
    }
}
