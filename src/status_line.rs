//! The shared status buffer.
//!
//! One slot per configured module, in declaration order. Each worker owns
//! exactly one slot and replaces its rendered text wholesale; `recompute`
//! rebuilds the full line from all populated slots and hands it to the sink.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use crate::{error::Error, sink::Sink};

pub struct StatusLine {
    /// Per-module rendered text, `None` until the module's first render or
    /// after it cleared itself. Index order is concatenation order.
    slots: Vec<Mutex<Option<String>>>,
    /// Serializes recomputes so the measure and copy passes see one
    /// consistent pass over the slots. Publishers never take this lock.
    recompute_lock: Mutex<()>,
    sink: Box<dyn Sink>,
    /// False until the first publish; a recompute before then must not reach
    /// the sink (nothing was ever displayed, so there is nothing to clear).
    ever_published: AtomicBool,
}

impl StatusLine {
    pub fn new(slot_count: usize, sink: Box<dyn Sink>) -> Self {
        Self {
            slots: (0..slot_count).map(|_| Mutex::new(None)).collect(),
            recompute_lock: Mutex::new(()),
            sink,
            ever_published: AtomicBool::new(false),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Replaces the text of one slot and recomputes the aggregate line.
    ///
    /// Only the target slot is locked, and only for the replacement itself.
    /// `None` empties the slot; its next recompute contributes zero bytes.
    pub fn publish(&self, slot_index: usize, text: Option<String>) -> Result<(), Error> {
        self.ever_published.store(true, Ordering::SeqCst);

        {
            let mut slot = self.slots[slot_index]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *slot = text;
        }

        self.recompute()
    }

    /// Rebuilds the aggregate line and forwards it to the sink.
    ///
    /// Slots are locked one at a time in index order, first to measure the
    /// total length, then to copy; two slot locks are never held at once.
    /// A zero-length result still reaches the sink to clear the display,
    /// except before anything was ever published.
    pub fn recompute(&self) -> Result<(), Error> {
        let _guard = self
            .recompute_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut total = 0;

        for slot in &self.slots {
            let slot = slot.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(text) = slot.as_deref() {
                total += text.len();
            }
        }

        if total == 0 && !self.ever_published.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut buffer = String::new();
        buffer.try_reserve_exact(total)?;

        for slot in &self.slots {
            let slot = slot.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(text) = slot.as_deref() {
                buffer.push_str(text);
            }
        }

        self.sink.publish_text(&buffer)
    }

    /// Zero-length publish, unconditionally. Used on shutdown so the display
    /// does not keep showing the last rendered line.
    pub fn clear(&self) -> Result<(), Error> {
        self.sink.publish_text("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    /// Records every string the sink receives.
    struct RecordingSink {
        published: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
            })
        }

        fn published(&self) -> Vec<String> {
            self.published.lock().unwrap().clone()
        }

        fn last(&self) -> Option<String> {
            self.published.lock().unwrap().last().cloned()
        }
    }

    impl Sink for Arc<RecordingSink> {
        fn publish_text(&self, text: &str) -> Result<(), Error> {
            self.published.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn status_line(slot_count: usize) -> (StatusLine, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        (StatusLine::new(slot_count, Box::new(sink.clone())), sink)
    }

    #[test]
    fn concatenates_in_declared_order() {
        let (line, sink) = status_line(2);

        line.publish(0, Some("A:1".to_string())).unwrap();
        line.publish(1, Some("B:2".to_string())).unwrap();

        assert_eq!(sink.last().unwrap(), "A:1B:2");
    }

    #[test]
    fn declared_order_wins_over_publish_order() {
        let (line, sink) = status_line(3);

        line.publish(2, Some("c".to_string())).unwrap();
        line.publish(0, Some("a".to_string())).unwrap();
        line.publish(1, Some("b".to_string())).unwrap();

        assert_eq!(sink.last().unwrap(), "abc");
        assert_eq!(sink.published(), vec!["c", "ac", "abc"]);
    }

    #[test]
    fn unrendered_slots_contribute_zero_bytes() {
        let (line, sink) = status_line(3);

        line.publish(1, Some("middle".to_string())).unwrap();

        assert_eq!(sink.last().unwrap(), "middle");
    }

    #[test]
    fn clearing_a_slot_shrinks_the_output() {
        let (line, sink) = status_line(2);

        line.publish(0, Some("left".to_string())).unwrap();
        line.publish(1, Some("right".to_string())).unwrap();
        line.publish(0, None).unwrap();

        assert_eq!(sink.last().unwrap(), "right");
    }

    #[test]
    fn clearing_the_only_populated_slot_publishes_empty() {
        let (line, sink) = status_line(1);

        line.publish(0, Some("only".to_string())).unwrap();
        line.publish(0, None).unwrap();

        assert_eq!(sink.last().unwrap(), "");
        assert_eq!(sink.published(), vec!["only", ""]);
    }

    #[test]
    fn recompute_before_first_publish_skips_the_sink() {
        let (line, sink) = status_line(2);

        line.recompute().unwrap();

        assert!(sink.published().is_empty());
    }

    #[test]
    fn republishing_identical_text_is_harmless() {
        let (line, sink) = status_line(1);

        line.publish(0, Some("same".to_string())).unwrap();
        line.publish(0, Some("same".to_string())).unwrap();

        assert_eq!(sink.published(), vec!["same", "same"]);
    }

    #[test]
    fn clear_always_reaches_the_sink() {
        let (line, sink) = status_line(1);

        line.publish(0, Some("text".to_string())).unwrap();
        line.clear().unwrap();

        assert_eq!(sink.last().unwrap(), "");
    }

    #[test]
    fn concurrent_publishes_stay_internally_consistent() {
        let sink = RecordingSink::new();
        let line = Arc::new(StatusLine::new(2, Box::new(sink.clone())));

        let writers: Vec<_> = [0usize, 1usize]
            .into_iter()
            .map(|slot| {
                let line = line.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let text = format!("{slot}:{round};");
                        line.publish(slot, Some(text)).unwrap();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        // Every published line is a concatenation of one value per slot in
        // index order, never a byte-level mix of two values of one slot.
        for published in sink.published() {
            let mut rest = published.as_str();

            for slot in 0..2 {
                let prefix = format!("{slot}:");

                if let Some(segment) = rest.strip_prefix(&prefix) {
                    let end = segment.find(';').expect("unterminated segment");
                    let round: usize = segment[..end].parse().expect("non-numeric round");
                    assert!(round < 50, "impossible round in {published:?}");
                    rest = &segment[end + 1..];
                }
            }

            assert!(rest.is_empty(), "unexpected trailing bytes in {published:?}");
        }

        let last = sink.last().unwrap();
        assert_eq!(last, "0:49;1:49;");
    }
}
