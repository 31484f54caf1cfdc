//! Outbound priority queue
//!
//! Lines waiting to be written are kept in one FIFO lane per priority class. The sender
//! loop always drains the highest non-empty lane first. [`SendPriority::Now`] never enters
//! the queue: the caller writes such lines synchronously.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Priority at which a line is sent to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SendPriority {
    /// Bypass the queue and write immediately
    Now,
    Critical,
    VeryHigh,
    High,
    Average,
    Low,
}

impl Default for SendPriority {
    fn default() -> Self {
        SendPriority::Average
    }
}

impl SendPriority {
    /// Queue lane for this priority, or `None` for [`SendPriority::Now`]
    fn lane(self) -> Option<usize> {
        match self {
            SendPriority::Now => None,
            SendPriority::Critical => Some(0),
            SendPriority::VeryHigh => Some(1),
            SendPriority::High => Some(2),
            SendPriority::Average => Some(3),
            SendPriority::Low => Some(4),
        }
    }
}

impl fmt::Display for SendPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SendPriority::Now => "now",
            SendPriority::Critical => "critical",
            SendPriority::VeryHigh => "very-high",
            SendPriority::High => "high",
            SendPriority::Average => "average",
            SendPriority::Low => "low",
        };
        write!(f, "{}", s)
    }
}

const LANES: usize = 5;

/// Thread-safe strict-priority queue of outbound lines
#[derive(Debug, Default)]
pub struct PriorityQueue {
    lanes: Mutex<[VecDeque<String>; LANES]>,
}

impl PriorityQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line. Returns the line back if the priority bypasses the queue.
    pub fn enqueue(&self, line: impl Into<String>, priority: SendPriority) -> Option<String> {
        let line = line.into();
        match priority.lane() {
            Some(lane) => {
                self.lanes.lock()[lane].push_back(line);
                None
            }
            None => Some(line),
        }
    }

    /// Oldest line of the highest non-empty priority class
    pub fn dequeue(&self) -> Option<String> {
        let mut lanes = self.lanes.lock();
        lanes.iter_mut().find_map(|lane| lane.pop_front())
    }

    /// Number of queued lines across all classes
    pub fn len(&self) -> usize {
        self.lanes.lock().iter().map(VecDeque::len).sum()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.lanes.lock().iter().all(VecDeque::is_empty)
    }

    /// Drop everything that is queued
    pub fn clear(&self) {
        for lane in self.lanes.lock().iter_mut() {
            lane.clear();
        }
    }
}
