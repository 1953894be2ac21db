//! Per-stream frame buffer with timestamp-based ordering.
//!
//! Uses index-based separation:
//! - HeapRb stores lightweight metadata (timestamp + slab key), kept sorted
//! - Slab stores the actual Frame
//!
//! This avoids moving frames during reordering and eviction.

use std::fmt;

use contracts::{Frame, StreamId};
use ringbuf::{traits::*, HeapRb};
use slab::Slab;

/// Lightweight metadata stored in ring buffer
#[derive(Debug, Clone, Copy)]
struct FrameMeta {
    /// Timestamp for ordering
    timestamp: f64,
    /// Key into the slab storage
    slab_key: usize,
}

/// Result of a single push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored without eviction
    Stored,
    /// Stored, the oldest frame was evicted to make room
    EvictedOldest,
    /// The incoming frame was older than everything in a full buffer and
    /// was dropped in its place
    DroppedIncoming,
    /// The incoming frame is not newer than the last consumed frame
    RejectedLate,
}

/// Bounded, timestamp-ordered holding area for one stream
///
/// Overflow drops the oldest frame and bumps a counter; pushes never block
/// or fail.
pub struct StreamBuffer {
    stream: StreamId,
    /// Ring buffer of metadata, ascending by timestamp
    index: HeapRb<FrameMeta>,
    /// Actual frame storage
    storage: Slab<Frame>,
    capacity: usize,
    pushed_count: u64,
    dropped_count: u64,
    expired_count: u64,
    superseded_count: u64,
    out_of_order_count: u64,
    late_count: u64,
    last_timestamp: Option<f64>,
    /// Timestamp of the newest frame handed out by `remove_through`
    consumed_through: Option<f64>,
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("stream", &self.stream)
            .field("len", &self.index.occupied_len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped_count)
            .finish()
    }
}

impl StreamBuffer {
    /// Create a new stream buffer
    ///
    /// A zero capacity is raised to one.
    pub fn new(stream: StreamId, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stream,
            index: HeapRb::new(capacity),
            storage: Slab::with_capacity(capacity),
            capacity,
            pushed_count: 0,
            dropped_count: 0,
            expired_count: 0,
            superseded_count: 0,
            out_of_order_count: 0,
            late_count: 0,
            last_timestamp: None,
            consumed_through: None,
        }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Insert a frame in timestamp order
    ///
    /// If the buffer is full the oldest frame is evicted. Frames at or before
    /// the last consumed timestamp are rejected so pairs stay ordered.
    pub fn push(&mut self, frame: Frame) -> PushOutcome {
        let timestamp = frame.timestamp;
        self.pushed_count += 1;

        if self.consumed_through.is_some_and(|consumed| timestamp <= consumed) {
            self.late_count += 1;
            return PushOutcome::RejectedLate;
        }

        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_timestamp = Some(self.last_timestamp.map_or(timestamp, |t| t.max(timestamp)));

        let mut outcome = PushOutcome::Stored;
        if self.index.is_full() {
            let oldest = self.oldest_meta().map(|meta| meta.timestamp);
            if oldest.is_some_and(|oldest| timestamp < oldest) {
                self.dropped_count += 1;
                return PushOutcome::DroppedIncoming;
            }
            if let Some(old_meta) = self.index.try_pop() {
                self.storage.remove(old_meta.slab_key);
            }
            self.dropped_count += 1;
            outcome = PushOutcome::EvictedOldest;
        }

        let slab_key = self.storage.insert(frame);
        let meta = FrameMeta {
            timestamp,
            slab_key,
        };

        let in_order = self
            .index
            .iter()
            .last()
            .map_or(true, |newest| newest.timestamp <= timestamp);

        if in_order {
            let _ = self.index.try_push(meta);
        } else {
            // Rebuild index with the new entry in place (only moves metadata)
            let mut metas: Vec<FrameMeta> = self.index.pop_iter().collect();
            let position = metas.partition_point(|m| m.timestamp <= timestamp);
            metas.insert(position, meta);
            for m in metas {
                let _ = self.index.try_push(m);
            }
        }

        outcome
    }

    /// Remove frames with `timestamp < cutoff`, returning them oldest first
    pub fn pop_older_than(&mut self, cutoff: f64) -> Vec<Frame> {
        let mut expired = Vec::new();
        while let Some(meta) = self.oldest_meta() {
            if meta.timestamp >= cutoff {
                break;
            }
            let _ = self.index.try_pop();
            expired.push(self.storage.remove(meta.slab_key));
        }
        self.expired_count += expired.len() as u64;
        expired
    }

    #[inline]
    fn oldest_meta(&self) -> Option<FrameMeta> {
        self.index.iter().next().copied()
    }

    /// Read-only view, ascending by timestamp
    pub fn peek_all(&self) -> Vec<&Frame> {
        self.index
            .iter()
            .filter_map(|meta| self.storage.get(meta.slab_key))
            .collect()
    }

    /// Oldest buffered frame
    pub fn oldest(&self) -> Option<&Frame> {
        self.index
            .iter()
            .next()
            .and_then(|meta| self.storage.get(meta.slab_key))
    }

    /// Remove the frame at `timestamp` and everything older
    ///
    /// Returns the consumed frame (the newest removed) and counts the rest
    /// as superseded.
    pub fn remove_through(&mut self, timestamp: f64) -> Option<Frame> {
        let mut removed: Vec<Frame> = Vec::new();
        while let Some(meta) = self.oldest_meta() {
            if meta.timestamp > timestamp {
                break;
            }
            let _ = self.index.try_pop();
            removed.push(self.storage.remove(meta.slab_key));
        }

        let consumed = removed.pop();
        self.superseded_count += removed.len() as u64;
        if let Some(frame) = &consumed {
            self.consumed_through = Some(frame.timestamp);
        }
        consumed
    }

    /// Drop every buffered frame; counters are kept
    pub fn clear(&mut self) {
        self.index.clear();
        self.storage.clear();
        self.last_timestamp = None;
        self.consumed_through = None;
    }

    /// Reset buffer contents and counters
    pub fn reset(&mut self) {
        self.clear();
        self.pushed_count = 0;
        self.dropped_count = 0;
        self.expired_count = 0;
        self.superseded_count = 0;
        self.out_of_order_count = 0;
        self.late_count = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames accepted by `push`
    #[inline]
    pub fn pushed_count(&self) -> u64 {
        self.pushed_count
    }

    /// Frames lost to overflow
    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Frames aged out unpaired
    #[inline]
    pub fn expired_count(&self) -> u64 {
        self.expired_count
    }

    /// Frames discarded because a newer frame was paired
    #[inline]
    pub fn superseded_count(&self) -> u64 {
        self.superseded_count
    }

    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }

    /// Frames rejected for arriving behind the last consumed frame
    #[inline]
    pub fn late_count(&self) -> u64 {
        self.late_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(timestamp: f64, sequence: u64) -> Frame {
        Frame::empty(StreamId::Front, timestamp, sequence)
    }

    fn timestamps(buffer: &StreamBuffer) -> Vec<f64> {
        buffer.peek_all().iter().map(|f| f.timestamp).collect()
    }

    #[test]
    fn test_buffer_push_order() {
        let mut buffer = StreamBuffer::new(StreamId::Front, 10);

        buffer.push(frame(3.0, 0));
        buffer.push(frame(1.0, 1));
        buffer.push(frame(2.0, 2));

        assert_eq!(timestamps(&buffer), vec![1.0, 2.0, 3.0]);
        assert_eq!(buffer.out_of_order_count(), 2);
    }

    #[test]
    fn test_capacity_keeps_most_recent() {
        let mut buffer = StreamBuffer::new(StreamId::Front, 10);

        for i in 0..15 {
            buffer.push(frame(i as f64 * 0.033, i));
        }

        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.dropped_count(), 5);
        let sequences: Vec<u64> = buffer.peek_all().iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_late_frame_into_full_buffer_is_dropped() {
        let mut buffer = StreamBuffer::new(StreamId::Front, 2);
        buffer.push(frame(1.0, 0));
        buffer.push(frame(2.0, 1));

        assert_eq!(buffer.push(frame(0.5, 2)), PushOutcome::DroppedIncoming);
        assert_eq!(timestamps(&buffer), vec![1.0, 2.0]);
        assert_eq!(buffer.dropped_count(), 1);

        assert_eq!(buffer.push(frame(1.5, 3)), PushOutcome::EvictedOldest);
        assert_eq!(timestamps(&buffer), vec![1.5, 2.0]);
    }

    #[test]
    fn test_frames_behind_consumed_are_rejected() {
        let mut buffer = StreamBuffer::new(StreamId::Front, 10);
        buffer.push(frame(0.100, 0));
        buffer.push(frame(0.133, 1));
        assert_eq!(buffer.remove_through(0.100).unwrap().sequence, 0);

        assert_eq!(buffer.push(frame(0.090, 2)), PushOutcome::RejectedLate);
        assert_eq!(buffer.push(frame(0.100, 3)), PushOutcome::RejectedLate);
        assert_eq!(buffer.push(frame(0.110, 4)), PushOutcome::Stored);
        assert_eq!(timestamps(&buffer), vec![0.110, 0.133]);
        assert_eq!(buffer.late_count(), 2);

        // A cleared buffer starts a fresh session
        buffer.clear();
        assert_eq!(buffer.push(frame(0.0, 5)), PushOutcome::Stored);
    }

    #[test]
    fn test_pop_older_than() {
        let mut buffer = StreamBuffer::new(StreamId::Front, 10);

        buffer.push(frame(0.0, 0));
        buffer.push(frame(0.5, 1));
        buffer.push(frame(1.5, 2));

        let expired = buffer.pop_older_than(1.0);
        assert_eq!(expired.len(), 2);
        assert_eq!(expired[0].timestamp, 0.0);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.expired_count(), 2);

        // Strictly older only
        assert!(buffer.pop_older_than(1.5).is_empty());
    }

    #[test]
    fn test_remove_through_counts_superseded() {
        let mut buffer = StreamBuffer::new(StreamId::Front, 10);
        for (i, ts) in [0.1, 0.2, 0.3, 0.4].into_iter().enumerate() {
            buffer.push(frame(ts, i as u64));
        }

        let consumed = buffer.remove_through(0.3).unwrap();
        assert_eq!(consumed.sequence, 2);
        assert_eq!(buffer.superseded_count(), 2);
        assert_eq!(timestamps(&buffer), vec![0.4]);

        assert!(buffer.remove_through(0.0).is_none());
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut buffer = StreamBuffer::new(StreamId::Back, 1);
        buffer.push(frame(0.0, 0));
        buffer.push(frame(0.1, 1));
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped_count(), 1);

        buffer.reset();
        assert_eq!(buffer.dropped_count(), 0);
        assert_eq!(buffer.pushed_count(), 0);
    }
}
