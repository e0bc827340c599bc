//! Coalescing queue of device writes waiting to be executed.

use super::{Parameter, Value};
use std::collections::VecDeque;

/// An ordered queue holding at most one pending write per [Parameter].
///
/// Requesting a parameter which is already queued replaces its value and
/// moves it to the back of the queue, so a burst of slider movements results
/// in a single write carrying the last value. Distinct parameters drain in
/// the order they were (last) requested.
///
/// The queue does no locking of its own, it lives behind the engine's state
/// lock together with the per-parameter state it has to stay consistent with.
#[derive(Debug, Default)]
pub struct PendingWriteQueue {
    entries: VecDeque<(Parameter, Value)>,
}

impl PendingWriteQueue {
    pub fn new() -> PendingWriteQueue {
        PendingWriteQueue::default()
    }

    /// Insert or overwrite the entry for `parameter`, moving it to the tail.
    pub fn enqueue(&mut self, parameter: Parameter, value: Value) {
        self.entries.retain(|(queued, _)| *queued != parameter);
        self.entries.push_back((parameter, value));
    }

    /// Remove and return the oldest entry.
    pub fn dequeue_oldest(&mut self) -> Option<(Parameter, Value)> {
        self.entries.pop_front()
    }

    pub fn contains(&self, parameter: Parameter) -> bool {
        self.entries.iter().any(|(queued, _)| *queued == parameter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_last_value_wins() {
        let mut queue = PendingWriteQueue::new();
        for level in 1..=50 {
            queue.enqueue(Parameter::Brightness, Value::Level(level));
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.dequeue_oldest(),
            Some((Parameter::Brightness, Value::Level(50)))
        );
        assert!(queue.dequeue_oldest().is_none());
    }

    #[test]
    fn test_requeued_parameter_moves_to_tail() {
        let mut queue = PendingWriteQueue::new();
        queue.enqueue(Parameter::Brightness, Value::Level(10));
        queue.enqueue(Parameter::Contrast, Value::Level(20));
        queue.enqueue(Parameter::Brightness, Value::Level(30));
        assert_eq!(
            queue.dequeue_oldest(),
            Some((Parameter::Contrast, Value::Level(20)))
        );
        assert_eq!(
            queue.dequeue_oldest(),
            Some((Parameter::Brightness, Value::Level(30)))
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_distinct_parameters_keep_fifo_order() {
        let mut queue = PendingWriteQueue::new();
        queue.enqueue(Parameter::ColorPreset, Value::from("05"));
        queue.enqueue(Parameter::Brightness, Value::Level(1));
        queue.enqueue(Parameter::Contrast, Value::Level(2));
        assert!(queue.contains(Parameter::Brightness));
        let order: Vec<Parameter> = std::iter::from_fn(|| queue.dequeue_oldest())
            .map(|(parameter, _)| parameter)
            .collect();
        assert_eq!(
            order,
            vec![
                Parameter::ColorPreset,
                Parameter::Brightness,
                Parameter::Contrast
            ]
        );
        assert!(!queue.contains(Parameter::Brightness));
    }
}
