//! Background alert delivery

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{AlertEvent, NotifierChain};

const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Delivers alert events on a blocking worker so the frame loop never waits
/// on audio or speech.
pub struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
    handle: JoinHandle<()>,
}

impl AlertDispatcher {
    /// Start the delivery task. Must be called from within a tokio runtime.
    pub fn spawn(chain: NotifierChain) -> Self {
        Self::with_capacity(chain, DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_capacity(chain: NotifierChain, capacity: usize) -> Self {
        let chain = Arc::new(chain);
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(capacity.max(1));
        info!("Alert dispatcher started with channels {:?}", chain.channels());

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let chain = chain.clone();
                match tokio::task::spawn_blocking(move || chain.deliver(&event)).await {
                    Ok(Ok(delivery)) => debug!("Alert presented via {}", delivery.channel),
                    Ok(Err(e)) => warn!("Alert not presented: {}", e),
                    Err(e) => error!("Alert delivery task failed: {}", e),
                }
            }
            debug!("Alert dispatcher stopped");
        });

        Self { tx, handle }
    }

    /// Queue an event without blocking. Returns false if it was dropped.
    pub fn send(&self, event: AlertEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Alert queue full, dropping alert");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Alert dispatcher closed, dropping alert");
                false
            }
        }
    }

    /// Stop accepting events and wait for queued ones to be delivered
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            error!("Alert dispatcher task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::tests::{event, Failing, Recording};

    #[tokio::test]
    async fn test_each_event_delivered_once_in_order() {
        let recording = Recording::default();
        let dispatcher = AlertDispatcher::spawn(NotifierChain::new().with(recording.clone()));

        for frames in [5, 65, 125] {
            assert!(dispatcher.send(event(frames)));
        }
        dispatcher.shutdown().await;

        let seen: Vec<u32> = recording.0.lock().unwrap().iter().map(|e| e.closed_frames).collect();
        assert_eq!(seen, vec![5, 65, 125]);
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_dispatcher_alive() {
        let recording = Recording::default();
        let dispatcher = AlertDispatcher::spawn(NotifierChain::new().with(Failing));
        assert!(dispatcher.send(event(5)));
        dispatcher.shutdown().await;

        let chain = NotifierChain::new().with(Failing).with(recording.clone());
        let dispatcher = AlertDispatcher::spawn(chain);
        assert!(dispatcher.send(event(5)));
        assert!(dispatcher.send(event(6)));
        dispatcher.shutdown().await;
        assert_eq!(recording.0.lock().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_queue_drops() {
        let dispatcher = AlertDispatcher::with_capacity(NotifierChain::new(), 1);
        // The worker has not run yet on a current-thread runtime
        assert!(dispatcher.send(event(1)));
        assert!(!dispatcher.send(event(2)));
        dispatcher.shutdown().await;
    }
}
