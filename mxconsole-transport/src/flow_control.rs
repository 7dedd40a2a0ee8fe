//! Serialized write queue
//!
//! The device cannot take interleaved writes, but several playback tasks push
//! packets at once. `SerializedWriter` funnels every write through one worker
//! that owns the only path to `Transport::write_report`:
//!
//! ```text
//! [key task 0] [key task 4] [key task 8] ...
//!        \          |          /
//!         mpsc (FIFO, bounded)
//!                   |
//!         [writer worker thread]  → Transport::write_report
//!                   |
//!         oneshot ack per request
//! ```
//!
//! FIFO order interleaves keys packet by packet, so no key starves while
//! another uploads a large frame.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::TransportError;
use crate::types::TransportDeviceInfo;
use crate::Transport;

/// Pending write requests before senders wait
const REQUEST_QUEUE_SIZE: usize = 32;

struct WriteRequest {
    data: Vec<u8>,
    response_tx: oneshot::Sender<Result<(), TransportError>>,
}

/// Single-consumer write queue in front of a transport
pub struct SerializedWriter {
    inner: Arc<dyn Transport>,
    request_tx: mpsc::Sender<WriteRequest>,
    worker_running: Arc<AtomicBool>,
    written: Arc<AtomicU64>,
}

impl SerializedWriter {
    /// Wrap a transport and start the writer worker thread
    pub fn new(inner: Arc<dyn Transport>) -> Result<Self, TransportError> {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let worker_running = Arc::new(AtomicBool::new(true));
        let written = Arc::new(AtomicU64::new(0));

        let worker_inner = Arc::clone(&inner);
        let worker_flag = Arc::clone(&worker_running);
        let worker_written = Arc::clone(&written);
        std::thread::Builder::new()
            .name("lcd-writer".into())
            .spawn(move || {
                futures::executor::block_on(write_worker(
                    worker_inner,
                    request_rx,
                    worker_flag,
                    worker_written,
                ));
            })
            .map_err(|e| TransportError::Internal(format!("failed to spawn writer: {e}")))?;

        Ok(Self {
            inner,
            request_tx,
            worker_running,
            written,
        })
    }

    /// Queue one report and wait until the device accepted it
    pub async fn write(&self, data: Vec<u8>) -> Result<(), TransportError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(WriteRequest { data, response_tx })
            .await
            .map_err(|_| TransportError::Internal("writer worker stopped".into()))?;
        response_rx
            .await
            .map_err(|_| TransportError::Internal("writer worker dropped request".into()))?
    }

    /// Access the wrapped transport.
    pub fn inner(&self) -> &Arc<dyn Transport> {
        &self.inner
    }

    pub fn device_info(&self) -> &TransportDeviceInfo {
        self.inner.device_info()
    }

    /// Reports written successfully since creation
    pub fn reports_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.worker_running.load(Ordering::SeqCst)
    }
}

async fn write_worker(
    inner: Arc<dyn Transport>,
    mut rx: mpsc::Receiver<WriteRequest>,
    running: Arc<AtomicBool>,
    written: Arc<AtomicU64>,
) {
    debug!("LCD writer worker started");

    while let Some(req) = rx.recv().await {
        let result = inner.write_report(&req.data).await;
        if result.is_ok() {
            written.fetch_add(1, Ordering::Relaxed);
        }
        // Requester may have been cancelled
        let _ = req.response_tx.send(result);
    }

    running.store(false, Ordering::SeqCst);
    debug!("LCD writer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_registry::DeviceKind;
    use crate::types::{KeypadEvent, TimestampedEvent};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::broadcast;

    struct Recorder {
        info: TransportDeviceInfo,
        writes: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn write_report(&self, data: &[u8]) -> Result<(), TransportError> {
            if data.first() == Some(&0xEE) {
                return Err(TransportError::Disconnected);
            }
            self.writes.lock().push(data.to_vec());
            Ok(())
        }

        async fn read_event(
            &self,
            _timeout_ms: u32,
        ) -> Result<Option<KeypadEvent>, TransportError> {
            Ok(None)
        }

        fn subscribe_events(&self) -> Option<broadcast::Receiver<TimestampedEvent>> {
            None
        }

        fn device_info(&self) -> &TransportDeviceInfo {
            &self.info
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            info: TransportDeviceInfo {
                vid: 0x046D,
                pid: 0xC354,
                kind: DeviceKind::MxKeypad,
                device_path: "mock".into(),
                serial: None,
                product_name: None,
            },
            writes: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_writes_are_all_delivered() {
        let rec = recorder();
        let writer = Arc::new(SerializedWriter::new(rec.clone()).unwrap());

        let mut handles = Vec::new();
        for task in 0..4u8 {
            let writer = Arc::clone(&writer);
            handles.push(tokio::spawn(async move {
                for seq in 0..10u8 {
                    writer.write(vec![task, seq]).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let writes = rec.writes.lock();
        assert_eq!(writes.len(), 40);
        assert_eq!(writer.reports_written(), 40);
        // Per-task order is preserved
        for task in 0..4u8 {
            let seqs: Vec<u8> = writes.iter().filter(|w| w[0] == task).map(|w| w[1]).collect();
            assert_eq!(seqs, (0..10).collect::<Vec<u8>>());
        }
    }

    #[tokio::test]
    async fn test_write_error_is_returned_to_caller() {
        let rec = recorder();
        let writer = SerializedWriter::new(rec.clone()).unwrap();
        let err = writer.write(vec![0xEE]).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
        // Worker keeps serving after a failed write
        writer.write(vec![0x01]).await.unwrap();
        assert_eq!(rec.writes.lock().len(), 1);
        assert!(writer.is_running());
    }
}
