//! Sequential processing of many authorities (bulk mode).
//!
//! The queue only tracks position and outcomes; the caller builds each item and
//! reports back through [`BulkQueue::advance`] or [`BulkQueue::skip`].

use serde::Serialize;
use tracing::{info, warn};

use crate::error::QueueError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum ItemStatus {
    Pending,
    Succeeded(String),
    Failed(String),
    Skipped,
}

impl ItemStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
}

#[derive(Clone, Debug)]
pub struct BulkQueue<T> {
    items: Vec<T>,
    statuses: Vec<ItemStatus>,
    cursor: usize,
    paused: bool,
}

impl<T> BulkQueue<T> {
    pub fn new(items: Vec<T>) -> Self {
        let statuses = vec![ItemStatus::Pending; items.len()];
        Self { items, statuses, cursor: 0, paused: false }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Index of the item awaiting an outcome.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn status(&self, index: usize) -> Option<&ItemStatus> {
        self.statuses.get(index)
    }

    pub fn current(&self) -> Result<(usize, &T), QueueError> {
        if self.paused {
            return Err(QueueError::Paused);
        }
        self.items.get(self.cursor).map(|item| (self.cursor, item)).ok_or(QueueError::Exhausted)
    }

    /// Record the current item's outcome and move on. `Ok` carries the transaction hash.
    pub fn advance(&mut self, outcome: Result<String, String>) -> Result<(), QueueError> {
        let (index, _) = self.current()?;
        self.record(index, outcome);
        Ok(())
    }

    fn record(&mut self, index: usize, outcome: Result<String, String>) {
        self.statuses[index] = match outcome {
            Ok(hash) => {
                info!(index, %hash, "bulk item succeeded");
                ItemStatus::Succeeded(hash)
            }
            Err(reason) => {
                warn!(index, %reason, "bulk item failed");
                ItemStatus::Failed(reason)
            }
        };
        self.cursor = index + 1;
    }

    pub fn skip(&mut self) -> Result<(), QueueError> {
        let (index, _) = self.current()?;
        warn!(index, "bulk item skipped");
        self.statuses[index] = ItemStatus::Skipped;
        self.cursor += 1;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Process items with `f` until the queue is paused or drained.
    ///
    /// `f` may pause the queue to stop after the current item.
    pub fn run_until_paused<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, &T, &mut bool) -> Result<String, String>,
    {
        while let Ok((index, item)) = self.current() {
            let mut pause = false;
            let outcome = f(index, item, &mut pause);
            self.record(index, outcome);
            if pause {
                self.pause();
            }
        }
    }

    pub fn summary(&self) -> QueueSummary {
        let mut summary = QueueSummary { total: self.items.len(), ..Default::default() };
        for status in &self.statuses {
            match status {
                ItemStatus::Pending => summary.pending += 1,
                ItemStatus::Succeeded(_) => summary.succeeded += 1,
                ItemStatus::Failed(_) => summary.failed += 1,
                ItemStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_through_outcomes() {
        let mut queue = BulkQueue::new(vec!["a", "b", "c"]);
        assert_eq!(queue.current(), Ok((0, &"a")));
        queue.advance(Ok("0x01".into())).unwrap();
        queue.advance(Err("insufficient funds".into())).unwrap();
        queue.skip().unwrap();
        assert_eq!(queue.current(), Err(QueueError::Exhausted));
        assert_eq!(queue.advance(Ok("0x02".into())), Err(QueueError::Exhausted));
        assert_eq!(
            queue.summary(),
            QueueSummary { total: 3, succeeded: 1, failed: 1, skipped: 1, pending: 0 }
        );
        assert_eq!(queue.status(1), Some(&ItemStatus::Failed("insufficient funds".into())));
    }

    #[test]
    fn pause_blocks_progress_until_resumed() {
        let mut queue = BulkQueue::new(vec![1, 2]);
        queue.pause();
        assert_eq!(queue.current(), Err(QueueError::Paused));
        assert_eq!(queue.skip(), Err(QueueError::Paused));
        queue.resume();
        assert_eq!(queue.current(), Ok((0, &1)));
    }

    #[test]
    fn run_stops_when_callback_pauses() {
        let mut queue = BulkQueue::new(vec![10, 20, 30]);
        queue.run_until_paused(|index, item, pause| {
            if *item == 20 {
                *pause = true;
                return Err("nonce too low".into());
            }
            Ok(format!("hash-{index}"))
        });
        assert!(queue.is_paused());
        assert_eq!(queue.position(), 2);
        assert_eq!(queue.summary().pending, 1);

        queue.resume();
        queue.run_until_paused(|_, _, _| Ok("done".into()));
        assert_eq!(queue.summary().succeeded, 2);
        assert_eq!(queue.current(), Err(QueueError::Exhausted));
    }

    #[test]
    fn run_records_each_outcome_in_place() {
        let mut queue = BulkQueue::new(vec!["a", "b", "c"]);
        queue.run_until_paused(|index, _, _| match index {
            1 => Err("reverted".into()),
            _ => Ok(format!("0x0{index}")),
        });
        assert_eq!(queue.position(), 3);
        assert_eq!(queue.status(0), Some(&ItemStatus::Succeeded("0x00".into())));
        assert_eq!(queue.status(1), Some(&ItemStatus::Failed("reverted".into())));
        assert_eq!(queue.status(2), Some(&ItemStatus::Succeeded("0x02".into())));
        assert_eq!(
            queue.summary(),
            QueueSummary { total: 3, succeeded: 2, failed: 1, skipped: 0, pending: 0 }
        );
    }

    #[test]
    fn empty_queue_is_exhausted() {
        let queue: BulkQueue<u8> = BulkQueue::new(Vec::new());
        assert!(queue.is_empty());
        assert_eq!(queue.current(), Err(QueueError::Exhausted));
    }
}
