//! Output scope tap
//!
//! A lock-free overwrite ring holding the most recent seconds of rendered
//! output for the waveform display. The render thread writes every block after
//! the balance stage; the control thread takes snapshots at its own cadence.
//!
//! Samples are stored as f32 bit patterns in `AtomicU32` so both sides touch
//! the ring with plain atomic loads/stores. A torn snapshot can at worst mix
//! samples from adjacent blocks, which is harmless for display purposes; the
//! write cursor is published with release ordering so a reader never sees
//! positions ahead of the data they cover.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::types::StereoSample;

/// Lock-free single-writer ring of recent output samples
pub struct ScopeBuffer {
    /// Interleaved [L, R] f32 bit patterns, `capacity * 2` slots
    slots: Box<[AtomicU32]>,
    /// Capacity in frames
    capacity: usize,
    /// Total frames written since the last clear (monotonic, wraps the ring)
    write_pos: AtomicUsize,
}

impl ScopeBuffer {
    /// Create a ring holding `capacity` frames
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity * 2).map(|_| AtomicU32::new(0)).collect();
        Self {
            slots,
            capacity,
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Capacity in frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a rendered block, overwriting the oldest frames
    ///
    /// Render thread only. Real-time safe: no allocation, no locks.
    pub fn write(&self, frames: &[StereoSample]) {
        let start = self.write_pos.load(Ordering::Relaxed);

        for (i, frame) in frames.iter().enumerate() {
            let slot = ((start + i) % self.capacity) * 2;
            self.slots[slot].store(frame.left.to_bits(), Ordering::Relaxed);
            self.slots[slot + 1].store(frame.right.to_bits(), Ordering::Relaxed);
        }

        // Publish the new cursor after the sample stores
        self.write_pos.store(start + frames.len(), Ordering::Release);
    }

    /// Discard all content
    ///
    /// O(1): resets the cursor without touching the sample slots. Called from
    /// the render thread on stop and track changes.
    pub fn clear(&self) {
        self.write_pos.store(0, Ordering::Release);
    }

    /// Copy the most recent frames into `out`, oldest first
    ///
    /// Returns the number of frames written, at most `min(available, out.len())`.
    /// Control thread only.
    pub fn snapshot_into(&self, out: &mut [StereoSample]) -> usize {
        let pos = self.write_pos.load(Ordering::Acquire);
        let available = pos.min(self.capacity);
        let n = available.min(out.len());

        // Read the n newest frames ending at pos
        let first = pos - n;
        for (i, slot_out) in out[..n].iter_mut().enumerate() {
            let slot = ((first + i) % self.capacity) * 2;
            slot_out.left = f32::from_bits(self.slots[slot].load(Ordering::Relaxed));
            slot_out.right = f32::from_bits(self.slots[slot + 1].load(Ordering::Relaxed));
        }

        n
    }

    /// Allocate and return a snapshot of the most recent frames, oldest first
    pub fn snapshot(&self) -> Vec<StereoSample> {
        let mut out = vec![StereoSample::silence(); self.capacity];
        let n = self.snapshot_into(&mut out);
        out.truncate(n);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(values: &[f32]) -> Vec<StereoSample> {
        values.iter().map(|&v| StereoSample::mono(v)).collect()
    }

    #[test]
    fn test_empty_scope_snapshots_nothing() {
        let scope = ScopeBuffer::new(16);
        assert!(scope.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_returns_frames_oldest_first() {
        let scope = ScopeBuffer::new(16);
        scope.write(&frames(&[1.0, 2.0, 3.0]));

        let snap = scope.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].left, 1.0);
        assert_eq!(snap[2].left, 3.0);
    }

    #[test]
    fn test_overwrite_keeps_newest() {
        let scope = ScopeBuffer::new(4);
        scope.write(&frames(&[1.0, 2.0, 3.0]));
        scope.write(&frames(&[4.0, 5.0, 6.0]));

        // Capacity 4: the oldest two frames were overwritten
        let snap = scope.snapshot();
        assert_eq!(snap.len(), 4);
        let values: Vec<f32> = snap.iter().map(|s| s.left).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_clear_empties_scope() {
        let scope = ScopeBuffer::new(8);
        scope.write(&frames(&[1.0, 2.0]));
        scope.clear();
        assert!(scope.snapshot().is_empty());

        // Writes after clear start fresh
        scope.write(&frames(&[7.0]));
        let snap = scope.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].left, 7.0);
    }

    #[test]
    fn test_snapshot_into_bounded_by_out() {
        let scope = ScopeBuffer::new(16);
        scope.write(&frames(&[1.0, 2.0, 3.0, 4.0, 5.0]));

        let mut out = [StereoSample::silence(); 2];
        let n = scope.snapshot_into(&mut out);
        assert_eq!(n, 2);
        // The two newest frames
        assert_eq!(out[0].left, 4.0);
        assert_eq!(out[1].left, 5.0);
    }
}
