//! Ready queue with strict priority and a starvation bound for low priority work.
//!
//! Ordering rules:
//! - A low priority entry whose admission deadline has passed outranks every
//!   high priority entry. Expired low entries run in deadline order, then
//!   submission order.
//! - Otherwise high priority entries run before low priority entries.
//! - Within a class, entries run in submission (sequence) order.
//!
//! A low priority wait bound too large to express as an `Instant` leaves the
//! entry without a deadline; it then only runs when no high priority work is
//! queued.
//!
//! Entries are indexed by task id so cancelled work can be removed eagerly.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::core::task::TaskPriority;

/// Queued item plus the bookkeeping used to order it.
#[derive(Debug)]
pub(crate) struct QueueEntry<J> {
    pub id: u64,
    pub priority: TaskPriority,
    pub enqueued_at: Instant,
    pub item: J,
    deadline: Option<Instant>,
}

#[derive(Debug)]
pub(crate) struct PriorityQueue<J> {
    high: BTreeMap<u64, QueueEntry<J>>,
    low: BTreeMap<u64, QueueEntry<J>>,
    low_deadlines: BTreeSet<(Instant, u64)>,
    index: HashMap<u64, (TaskPriority, u64)>,
    next_seq: u64,
}

impl<J> Default for PriorityQueue<J> {
    fn default() -> Self {
        Self {
            high: BTreeMap::new(),
            low: BTreeMap::new(),
            low_deadlines: BTreeSet::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<J> PriorityQueue<J> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `item` under task `id`. `max_wait` bounds how long a low
    /// priority entry may be passed over by high priority work.
    pub fn push(&mut self, id: u64, priority: TaskPriority, max_wait: Duration, item: J, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = match priority {
            TaskPriority::High => None,
            TaskPriority::Low => now.checked_add(max_wait),
        };
        let entry = QueueEntry {
            id,
            priority,
            enqueued_at: now,
            item,
            deadline,
        };
        self.index.insert(id, (priority, seq));
        match priority {
            TaskPriority::High => {
                self.high.insert(seq, entry);
            }
            TaskPriority::Low => {
                if let Some(deadline) = deadline {
                    self.low_deadlines.insert((deadline, seq));
                }
                self.low.insert(seq, entry);
            }
        }
    }

    /// Take the highest ranked entry as of `now`.
    pub fn poll(&mut self, now: Instant) -> Option<QueueEntry<J>> {
        let starved = self
            .low_deadlines
            .first()
            .filter(|(deadline, _)| *deadline <= now)
            .map(|&(_, seq)| seq);
        let seq = match starved {
            Some(seq) => seq,
            None => match self.high.first_key_value() {
                Some((&seq, _)) => seq,
                None => *self.low.first_key_value()?.0,
            },
        };
        let id = self.high.get(&seq).or_else(|| self.low.get(&seq))?.id;
        self.remove(id)
    }

    /// Remove the entry for task `id`, if still queued.
    pub fn remove(&mut self, id: u64) -> Option<QueueEntry<J>> {
        let (priority, seq) = self.index.remove(&id)?;
        match priority {
            TaskPriority::High => self.high.remove(&seq),
            TaskPriority::Low => {
                let entry = self.low.remove(&seq)?;
                if let Some(deadline) = entry.deadline {
                    self.low_deadlines.remove(&(deadline, seq));
                }
                Some(entry)
            }
        }
    }

    /// Remove every entry, in no particular order.
    pub fn drain(&mut self) -> Vec<QueueEntry<J>> {
        self.index.clear();
        self.low_deadlines.clear();
        let mut drained: Vec<_> = std::mem::take(&mut self.high).into_values().collect();
        drained.extend(std::mem::take(&mut self.low).into_values());
        drained
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(100);

    fn drain_ids(queue: &mut PriorityQueue<()>, now: Instant) -> Vec<u64> {
        std::iter::from_fn(|| queue.poll(now).map(|e| e.id)).collect()
    }

    #[test]
    fn test_high_before_low_fifo_within_class() {
        let mut queue = PriorityQueue::new();
        let now = Instant::now();
        queue.push(1, TaskPriority::Low, WAIT, (), now);
        queue.push(2, TaskPriority::High, WAIT, (), now);
        queue.push(3, TaskPriority::Low, WAIT, (), now);
        queue.push(4, TaskPriority::High, WAIT, (), now);
        assert_eq!(queue.len(), 4);
        assert_eq!(drain_ids(&mut queue, now), vec![2, 4, 1, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_starved_low_outranks_high() {
        let mut queue = PriorityQueue::new();
        let start = Instant::now();
        queue.push(1, TaskPriority::Low, WAIT, (), start);
        queue.push(2, TaskPriority::High, WAIT, (), start + Duration::from_millis(150));
        let later = start + Duration::from_millis(200);
        assert_eq!(drain_ids(&mut queue, later), vec![1, 2]);
    }

    #[test]
    fn test_expired_lows_run_by_deadline() {
        let mut queue = PriorityQueue::new();
        let start = Instant::now();
        queue.push(1, TaskPriority::Low, Duration::from_millis(300), (), start);
        queue.push(2, TaskPriority::Low, Duration::from_millis(50), (), start);
        queue.push(3, TaskPriority::Low, Duration::from_millis(50), (), start);
        queue.push(4, TaskPriority::High, WAIT, (), start);
        let later = start + Duration::from_millis(400);
        assert_eq!(drain_ids(&mut queue, later), vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_unbounded_low_wait_never_starves_high() {
        let mut queue = PriorityQueue::new();
        let start = Instant::now();
        queue.push(1, TaskPriority::Low, Duration::MAX, (), start);
        queue.push(2, TaskPriority::High, WAIT, (), start);
        queue.push(3, TaskPriority::Low, WAIT, (), start);
        let later = start + Duration::from_secs(3600);
        assert_eq!(drain_ids(&mut queue, later), vec![3, 2, 1]);
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = PriorityQueue::new();
        let now = Instant::now();
        queue.push(7, TaskPriority::Low, WAIT, "a", now);
        queue.push(8, TaskPriority::High, WAIT, "b", now);
        assert_eq!(queue.remove(7).map(|e| e.item), Some("a"));
        assert!(queue.remove(7).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.poll(now + WAIT * 2).map(|e| e.item), Some("b"));
        assert!(queue.poll(now).is_none());
    }

    #[test]
    fn test_drain_clears_everything() {
        let mut queue = PriorityQueue::new();
        let now = Instant::now();
        for id in 0..6 {
            let priority = if id % 2 == 0 { TaskPriority::High } else { TaskPriority::Low };
            queue.push(id, priority, WAIT, (), now);
        }
        assert_eq!(queue.drain().len(), 6);
        assert!(queue.is_empty());
        assert!(queue.poll(now + WAIT * 2).is_none());
    }
}
