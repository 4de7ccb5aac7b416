//! Priority queue entries for the scheduler.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

use crate::Result;

/// A type-erased operation, invoked once by whichever worker dequeues it.
pub(crate) type Operation<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>;

/// One queued unit of work and the channel its caller is waiting on.
pub(crate) struct Job<T> {
    pub id: String,
    pub priority: i32,
    /// Submission order, used to break priority ties first-in first-out.
    pub seq: u64,
    pub use_cache: bool,
    pub cache_ttl: Duration,
    pub timeout: Option<Duration>,
    pub operation: Operation<T>,
    pub reply: oneshot::Sender<Result<T>>,
}

// Ordering looks only at (priority, seq); seq is unique per queue.
impl<T> PartialEq for Job<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Job<T> {}

impl<T> PartialOrd for Job<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Job<T> {
    /// Higher priority first, then lower sequence number first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending jobs plus the scheduler's open/closed flag.
pub(crate) struct JobQueue<T> {
    heap: BinaryHeap<Job<T>>,
    next_seq: u64,
    closed: bool,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            closed: false,
        }
    }

    /// Hand out the next submission sequence number.
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn push(&mut self, job: Job<T>) {
        self.heap.push(job);
    }

    pub fn pop(&mut self) -> Option<Job<T>> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(queue: &mut JobQueue<u32>, id: &str, priority: i32) -> Job<u32> {
        let (reply, _rx) = oneshot::channel();
        Job {
            id: id.to_string(),
            priority,
            seq: queue.next_seq(),
            use_cache: false,
            cache_ttl: Duration::from_secs(1),
            timeout: None,
            operation: Box::new(|| Box::pin(async { Ok(0) })),
            reply,
        }
    }

    fn drain(queue: &mut JobQueue<u32>) -> Vec<String> {
        std::iter::from_fn(|| queue.pop()).map(|j| j.id).collect()
    }

    #[test]
    fn higher_priority_pops_first() {
        let mut queue = JobQueue::new();
        let low = job(&mut queue, "low", 1);
        let high = job(&mut queue, "high", 5);
        queue.push(low);
        queue.push(high);
        assert_eq!(drain(&mut queue), vec!["high", "low"]);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut queue = JobQueue::new();
        for id in ["a", "b", "c", "d"] {
            let j = job(&mut queue, id, 2);
            queue.push(j);
        }
        assert_eq!(drain(&mut queue), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn mixed_priorities_then_fifo() {
        let mut queue = JobQueue::new();
        for (id, p) in [("a", 1), ("b", 3), ("c", 1), ("d", 3), ("e", -2)] {
            let j = job(&mut queue, id, p);
            queue.push(j);
        }
        assert_eq!(drain(&mut queue), vec!["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn close_flag() {
        let mut queue: JobQueue<u32> = JobQueue::new();
        assert!(!queue.is_closed());
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.len(), 0);
    }
}
