//! Priority-ordered queue of callers waiting for a resource.
//!
//! One FIFO lane per priority; lane 0 is served first. Callers that gave up
//! (their receiving half was dropped) are skipped and never counted.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::pool::PoolError;

pub(crate) type Reply<R> = oneshot::Sender<Result<R, PoolError>>;

pub(crate) struct WaitQueue<R> {
    lanes: Vec<VecDeque<Reply<R>>>,
}

impl<R> WaitQueue<R> {
    pub fn new(priority_range: usize) -> Self {
        Self {
            lanes: (0..priority_range.max(1)).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Lane for a requested priority. Missing or out-of-range priorities
    /// go to the last (least urgent) lane.
    pub fn lane_for(&self, priority: Option<usize>) -> usize {
        let last = self.lanes.len() - 1;
        match priority {
            Some(p) if p <= last => p,
            _ => last,
        }
    }

    pub fn push(&mut self, priority: Option<usize>, reply: Reply<R>) {
        let lane = self.lane_for(priority);
        self.lanes[lane].push_back(reply);
    }

    /// Next live waiter, most urgent lane first.
    pub fn pop(&mut self) -> Option<Reply<R>> {
        for lane in &mut self.lanes {
            while let Some(reply) = lane.pop_front() {
                if !reply.is_closed() {
                    return Some(reply);
                }
            }
        }
        None
    }

    /// Give `resource` to the next live waiter, or hand it back if nobody
    /// is waiting.
    pub fn hand_over(&mut self, mut resource: R) -> Result<(), R> {
        while let Some(reply) = self.pop() {
            match reply.send(Ok(resource)) {
                Ok(()) => return Ok(()),
                // Waiter went away between the liveness check and the send.
                Err(Ok(returned)) => resource = returned,
                Err(Err(_)) => return Ok(()),
            }
        }
        Err(resource)
    }

    pub fn prune(&mut self) {
        for lane in &mut self.lanes {
            lane.retain(|reply| !reply.is_closed());
        }
    }

    pub fn len(&self) -> usize {
        self.lanes
            .iter()
            .flatten()
            .filter(|reply| !reply.is_closed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
