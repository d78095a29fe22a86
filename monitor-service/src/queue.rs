use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A reply candidate produced by one of the monitors.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyTask {
    pub tweet_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub delay_minutes: i64,
    /// Set when the tweet replies to one of our own posts; those targets
    /// never restrict replies to us.
    pub is_reply_to_us: bool,
}

impl ReplyTask {
    /// Earliest wall-clock moment this task may be acted upon.
    pub fn eligible_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::minutes(self.delay_minutes)
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        now >= self.eligible_at()
    }
}

/// FIFO work queue shared by the producers and the reply worker. Items that
/// are popped before their eligibility time are re-enqueued at the back, so
/// the queue behaves as a cooperative round-robin over not-yet-eligible
/// items rather than strict insertion order. Items leave the queue only on
/// a confirmed post, a forbidden target, or a non-recoverable failure.
#[derive(Debug, Default)]
pub struct ReplyQueue {
    items: Mutex<VecDeque<ReplyTask>>,
}

impl ReplyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: ReplyTask) {
        self.items.lock().unwrap().push_back(task);
    }

    pub fn pop(&self) -> Option<ReplyTask> {
        self.items.lock().unwrap().pop_front()
    }

    /// Puts a task back at the end of the queue, unchanged.
    pub fn requeue(&self, task: ReplyTask) {
        self.push(task);
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, delay_minutes: i64) -> ReplyTask {
        ReplyTask {
            tweet_id: id.to_string(),
            author_id: "900".to_string(),
            text: "candidate".to_string(),
            created_at: Utc::now(),
            delay_minutes,
            is_reply_to_us: false,
        }
    }

    #[test]
    fn pops_in_insertion_order() {
        let queue = ReplyQueue::new();
        queue.push(task("1", 0));
        queue.push(task("2", 0));

        assert_eq!(queue.pop().unwrap().tweet_id, "1");
        assert_eq!(queue.pop().unwrap().tweet_id, "2");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn requeue_moves_task_to_the_back() {
        let queue = ReplyQueue::new();
        queue.push(task("1", 0));
        queue.push(task("2", 0));

        let first = queue.pop().unwrap();
        queue.requeue(first);

        assert_eq!(queue.pop().unwrap().tweet_id, "2");
        assert_eq!(queue.pop().unwrap().tweet_id, "1");
    }

    #[test]
    fn immediate_tasks_are_eligible_at_creation() {
        let now = Utc::now();
        assert!(task("1", 0).is_eligible(now));
    }

    #[test]
    fn delayed_tasks_become_eligible_after_delay() {
        let created = Utc::now();
        let delayed = ReplyTask {
            created_at: created,
            ..task("42", 60)
        };

        assert!(!delayed.is_eligible(created + Duration::minutes(10)));
        assert!(delayed.is_eligible(created + Duration::minutes(61)));
        assert_eq!(delayed.eligible_at(), created + Duration::minutes(60));
    }
}
