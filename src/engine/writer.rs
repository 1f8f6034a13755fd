use std::io;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

use crate::model::Event;
use crate::observability::{WAL_FLUSH_BATCH_SIZE, WAL_FLUSH_DURATION_SECONDS};
use crate::wal::Wal;

type Ack = oneshot::Sender<io::Result<()>>;

/// Most requests taken off the channel per wakeup.
const INBOX_CAPACITY: usize = 512;

pub(super) enum WalRequest {
    Append { event: Event, ack: Ack },
    /// Replace the log with `events` (compaction).
    Rewrite { events: Vec<Event>, ack: Ack },
    AppendCount { reply: oneshot::Sender<u64> },
}

/// Sole owner of the WAL file. Appends that arrive together share one fsync;
/// a rewrite or count request first makes everything queued before it durable.
pub(super) struct WalWriter {
    wal: Wal,
    rx: mpsc::Receiver<WalRequest>,
    pending: Vec<(Event, Ack)>,
}

impl WalWriter {
    pub(super) fn spawn(wal: Wal, queue: usize) -> mpsc::Sender<WalRequest> {
        let (tx, rx) = mpsc::channel(queue);
        let writer = Self {
            wal,
            rx,
            pending: Vec::new(),
        };
        tokio::spawn(writer.run());
        tx
    }

    async fn run(mut self) {
        let mut inbox = Vec::with_capacity(INBOX_CAPACITY);
        while self.rx.recv_many(&mut inbox, INBOX_CAPACITY).await > 0 {
            for request in inbox.drain(..) {
                match request {
                    WalRequest::Append { event, ack } => self.pending.push((event, ack)),
                    WalRequest::Rewrite { events, ack } => {
                        self.commit();
                        let _ = ack.send(self.wal.compact(&events));
                    }
                    WalRequest::AppendCount { reply } => {
                        self.commit();
                        let _ = reply.send(self.wal.appends_since_compact());
                    }
                }
            }
            self.commit();
        }
        tracing::debug!("WAL writer stopped");
    }

    fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        metrics::histogram!(WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let started = Instant::now();
        let result = self.write_all(&batch);
        metrics::histogram!(WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::error!("WAL commit of {} events failed: {e}", batch.len());
        }
        for (_, ack) in batch {
            let _ = ack.send(match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            });
        }
    }

    fn write_all(&mut self, batch: &[(Event, Ack)]) -> io::Result<()> {
        let written = batch
            .iter()
            .try_for_each(|(event, _)| self.wal.append_buffered(event));
        // Sync even on failure so a partial frame is not left in the buffer.
        let synced = self.wal.flush_sync();
        written.and(synced)
    }
}
