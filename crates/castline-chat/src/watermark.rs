//! Polling watermark and per-tick admission.

use castline_core::ChatMessage;

use crate::chat_transport::{comment_to_message, CommentBatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Newest comment timestamp already delivered; never decreases.
pub struct Watermark {
    newest: Option<u64>,
}

impl Watermark {
    pub fn newest(&self) -> Option<u64> {
        self.newest
    }

    /// Value passed to the poll transport as the "since" cursor.
    pub fn since(&self) -> u64 {
        self.newest.unwrap_or(0)
    }

    pub fn admits(&self, timestamp: u64) -> bool {
        self.newest.map_or(true, |newest| timestamp > newest)
    }

    pub fn observe(&mut self, timestamp: u64) {
        self.newest = Some(self.newest.map_or(timestamp, |newest| newest.max(timestamp)));
    }

    pub fn merge(&mut self, other: Watermark) {
        if let Some(timestamp) = other.newest {
            self.observe(timestamp);
        }
    }
}

/// Admits one polled batch against `watermark`.
///
/// Comments at or below the watermark at tick start are dropped; the
/// watermark is raised to the running maximum of every timestamp seen.
pub fn admit_polled_batch(watermark: &mut Watermark, batch: &CommentBatch) -> Vec<ChatMessage> {
    let tick_start = *watermark;
    let mut admitted = Vec::with_capacity(batch.len());
    for (comment, is_system) in batch.iter_tagged() {
        if tick_start.admits(comment.timestamp) {
            admitted.push(comment_to_message(comment, is_system));
        }
        watermark.observe(comment.timestamp);
    }
    admitted
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{admit_polled_batch, Watermark};
    use crate::chat_transport::{ChatComment, CommentBatch};

    fn batch(timestamps: &[u64]) -> CommentBatch {
        CommentBatch {
            comments: timestamps
                .iter()
                .map(|timestamp| ChatComment::new("viewer", format!("at {timestamp}"), *timestamp))
                .collect(),
            system_comments: Vec::new(),
        }
    }

    #[test]
    fn unit_fresh_watermark_admits_everything() {
        let watermark = Watermark::default();
        assert!(watermark.admits(0));
        assert_eq!(watermark.since(), 0);
    }

    #[test]
    fn unit_running_max_tolerates_out_of_order_batch() {
        let mut watermark = Watermark::default();
        let admitted = admit_polled_batch(&mut watermark, &batch(&[9, 4, 7]));
        assert_eq!(admitted.len(), 3);
        assert_eq!(watermark.newest(), Some(9));
    }

    #[test]
    fn regression_older_comment_from_later_tick_is_not_reemitted() {
        let mut watermark = Watermark::default();
        admit_polled_batch(&mut watermark, &batch(&[5]));
        let admitted = admit_polled_batch(&mut watermark, &batch(&[5, 4, 6]));
        assert_eq!(
            admitted.iter().map(|message| message.text.as_str()).collect::<Vec<_>>(),
            vec!["at 6"]
        );
        assert_eq!(watermark.newest(), Some(6));
    }

    #[test]
    fn unit_system_comments_raise_watermark_too() {
        let mut watermark = Watermark::default();
        let batch = CommentBatch {
            comments: vec![ChatComment::new("alice", "hi", 10)],
            system_comments: vec![ChatComment::new("platform", "joined", 12)],
        };
        let admitted = admit_polled_batch(&mut watermark, &batch);
        assert!(admitted[1].is_system);
        assert_eq!(watermark.since(), 12);
    }

    proptest! {
        #[test]
        fn functional_watermark_equals_max_and_never_readmits(
            ticks in prop::collection::vec(prop::collection::vec(0_u64..50, 0..6), 1..8)
        ) {
            let mut watermark = Watermark::default();
            let mut previous = watermark;
            for tick in &ticks {
                let tick_start = watermark;
                let admitted = admit_polled_batch(&mut watermark, &batch(tick));
                for message in &admitted {
                    let timestamp = message.text.trim_start_matches("at ").parse::<u64>().expect("ts");
                    prop_assert!(tick_start.admits(timestamp));
                }
                prop_assert!(watermark.since() >= previous.since());
                previous = watermark;
            }
            let expected = ticks.iter().flatten().copied().max();
            prop_assert_eq!(watermark.newest(), expected);
        }
    }
}
