use serde::{Deserialize, Serialize};

/// Render quantum size delivered by the host's audio scheduler, in frames.
///
/// The web platform fixes this at 128; the aggregator does not depend on it
/// and accepts quanta of any size, but hosts size their scratch buffers with
/// this constant.
pub const RENDER_QUANTUM_FRAMES: usize = 128;

/// Default transfer block size, in frames.
///
/// Two render quanta per posted block keeps per-message overhead low without
/// adding meaningful latency at typical sample rates.
pub const DEFAULT_BLOCK_FRAMES: usize = 256;

/// Maximum block size accepted at construction.
///
/// The block buffer is allocated once and lives for the aggregator's
/// lifetime. `2^20` mono f32 frames is 4MiB, far beyond any sensible transfer
/// block; capping here bounds the worst case if a host passes a garbage
/// capacity.
pub const MAX_BLOCK_FRAMES: usize = 1_048_576;

/// Consumer of flushed sample blocks.
///
/// The render thread must never block, so implementations hand the block off
/// asynchronously: the wasm bridge posts a copy through a `MessagePort`, and
/// native tests collect into a vec.
pub trait BlockSink {
    /// Receive one flushed block. `samples` is the valid prefix of the block
    /// buffer and is never empty.
    fn post_block(&mut self, samples: &[f32]);
}

/// Counters describing aggregator progress. Host-side telemetry only; not
/// part of the sample path. Both counters wrap at `2^64`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorStats {
    pub blocks_flushed: u64,
    pub samples_flushed: u64,
}

/// Repacks a push-based stream of render quanta into fixed-size blocks.
///
/// Samples are copied into a fixed-capacity buffer; whenever the write cursor
/// reaches capacity the full block is handed to the sink and the cursor
/// resets. A quantum that straddles a block boundary is split inside a single
/// [`SampleAggregator::process`] call, so no sample is ever lost, duplicated,
/// or reordered regardless of how quantum and block sizes line up.
///
/// The buffer is allocated once at construction; the steady-state path does
/// not allocate.
#[derive(Debug)]
pub struct SampleAggregator<S> {
    sink: S,
    buffer: Vec<f32>,
    written: usize,
    stats: AggregatorStats,
}

impl<S: BlockSink> SampleAggregator<S> {
    /// Create an aggregator with the default block size.
    pub fn new(sink: S) -> Self {
        Self::with_block_frames(DEFAULT_BLOCK_FRAMES, sink)
    }

    /// Create an aggregator that emits blocks of `block_frames` samples.
    pub fn with_block_frames(block_frames: usize, sink: S) -> Self {
        assert!(block_frames > 0, "block_frames must be non-zero");
        let block_frames = block_frames.min(MAX_BLOCK_FRAMES);
        Self {
            sink,
            buffer: vec![0.0; block_frames],
            written: 0,
            stats: AggregatorStats::default(),
        }
    }

    /// Block capacity in samples.
    pub fn block_frames(&self) -> usize {
        self.buffer.len()
    }

    /// Samples currently buffered and not yet flushed. Always `< block_frames`
    /// between calls, since a full buffer flushes immediately.
    pub fn pending(&self) -> usize {
        self.written
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    /// Handle one render quantum. Called once per scheduling tick by the
    /// host. `None` (no input connected this tick) passes through as silence:
    /// nothing is appended and no flush is forced.
    ///
    /// Returns the keep-alive flag for the host scheduler; the aggregator
    /// never requests termination.
    pub fn process(&mut self, input: Option<&[f32]>) -> bool {
        if let Some(data) = input {
            self.append(data);
        }
        true
    }

    /// Emit the buffered partial block, if any.
    ///
    /// The per-quantum path only flushes on a full buffer; `drain` exists for
    /// the host to call right before disconnecting the audio graph so the
    /// tail of the stream is delivered rather than discarded. The emitted
    /// block is the valid prefix and may be shorter than `block_frames`.
    pub fn drain(&mut self) {
        self.flush();
    }

    /// Recover the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn append(&mut self, mut data: &[f32]) {
        while !data.is_empty() {
            let free = self.buffer.len() - self.written;
            let take = free.min(data.len());
            self.buffer[self.written..self.written + take].copy_from_slice(&data[..take]);
            self.written += take;
            data = &data[take..];
            if self.written == self.buffer.len() {
                self.flush();
            }
        }
    }

    /// Never emits an empty block: flushing an empty buffer is a no-op.
    fn flush(&mut self) {
        if self.written == 0 {
            return;
        }
        self.sink.post_block(&self.buffer[..self.written]);
        self.stats.blocks_flushed = self.stats.blocks_flushed.wrapping_add(1);
        self.stats.samples_flushed = self
            .stats
            .samples_flushed
            .wrapping_add(self.written as u64);
        self.written = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VecSink {
        blocks: Vec<Vec<f32>>,
    }

    impl BlockSink for VecSink {
        fn post_block(&mut self, samples: &[f32]) {
            assert!(!samples.is_empty(), "sink must never see an empty block");
            self.blocks.push(samples.to_vec());
        }
    }

    fn quantum(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| i as f32).collect()
    }

    #[test]
    fn three_quanta_fill_one_block_and_leave_half_pending() {
        let mut agg = SampleAggregator::with_block_frames(256, VecSink::default());

        assert!(agg.process(Some(&quantum(0, 128))));
        assert_eq!(agg.flushed_blocks(), 0);
        assert_eq!(agg.pending(), 128);

        // The second quantum lands exactly on the block boundary; the flush
        // happens inside this call.
        assert!(agg.process(Some(&quantum(128, 128))));
        assert_eq!(agg.flushed_blocks(), 1);
        assert_eq!(agg.pending(), 0);

        assert!(agg.process(Some(&quantum(256, 128))));
        assert_eq!(agg.flushed_blocks(), 1);
        assert_eq!(agg.pending(), 128);

        let sink = agg.into_sink();
        assert_eq!(sink.blocks[0], quantum(0, 256));
    }

    #[test]
    fn oversized_quantum_splits_across_the_block_boundary() {
        let mut agg = SampleAggregator::with_block_frames(256, VecSink::default());

        agg.process(Some(&quantum(0, 300)));
        assert_eq!(agg.pending(), 44);

        let sink = agg.into_sink();
        assert_eq!(sink.blocks.len(), 1);
        assert_eq!(sink.blocks[0], quantum(0, 256));
    }

    #[test]
    fn quantum_larger_than_two_blocks_flushes_twice_in_one_call() {
        let mut agg = SampleAggregator::with_block_frames(128, VecSink::default());

        agg.process(Some(&quantum(0, 300)));
        assert_eq!(agg.pending(), 44);

        let sink = agg.into_sink();
        assert_eq!(sink.blocks.len(), 2);
        assert_eq!(sink.blocks[0], quantum(0, 128));
        assert_eq!(sink.blocks[1], quantum(128, 128));
    }

    #[test]
    fn absent_input_is_silence_and_forces_nothing() {
        let mut agg = SampleAggregator::with_block_frames(256, VecSink::default());

        agg.process(Some(&quantum(0, 100)));
        assert!(agg.process(None));
        assert!(agg.process(Some(&[])));
        assert_eq!(agg.pending(), 100);

        let sink = agg.into_sink();
        assert!(sink.blocks.is_empty());
    }

    #[test]
    fn drain_emits_the_valid_prefix_and_resets_the_cursor() {
        let mut agg = SampleAggregator::with_block_frames(256, VecSink::default());

        agg.process(Some(&quantum(0, 100)));
        agg.drain();
        assert_eq!(agg.pending(), 0);

        // Draining again must not emit an empty block.
        agg.drain();

        let sink = agg.into_sink();
        assert_eq!(sink.blocks.len(), 1);
        assert_eq!(sink.blocks[0], quantum(0, 100));
    }

    #[test]
    fn totals_that_divide_the_block_size_need_no_drain() {
        let mut agg = SampleAggregator::with_block_frames(256, VecSink::default());

        for i in 0..8 {
            agg.process(Some(&quantum(i * 128, 128)));
        }
        assert_eq!(agg.pending(), 0);

        let sink = agg.into_sink();
        assert_eq!(sink.blocks.len(), 4);
        for (i, block) in sink.blocks.iter().enumerate() {
            assert_eq!(block.len(), 256);
            assert_eq!(block, &quantum(i * 256, 256));
        }
    }

    #[test]
    fn stats_count_blocks_and_samples() {
        let mut agg = SampleAggregator::with_block_frames(256, VecSink::default());

        agg.process(Some(&quantum(0, 300)));
        agg.drain();

        let stats = agg.stats();
        assert_eq!(
            stats,
            AggregatorStats {
                blocks_flushed: 2,
                samples_flushed: 300,
            }
        );
    }

    #[test]
    fn stats_snapshot_round_trips_through_json() {
        let stats = AggregatorStats {
            blocks_flushed: 7,
            samples_flushed: 1792,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(serde_json::from_str::<AggregatorStats>(&json).unwrap(), stats);
    }

    #[test]
    fn new_clamps_excessive_capacity_to_avoid_oom() {
        let agg = SampleAggregator::with_block_frames(usize::MAX, VecSink::default());
        assert_eq!(agg.block_frames(), MAX_BLOCK_FRAMES);
    }

    #[test]
    #[should_panic(expected = "block_frames must be non-zero")]
    fn zero_capacity_is_rejected() {
        let _ = SampleAggregator::with_block_frames(0, VecSink::default());
    }

    impl SampleAggregator<VecSink> {
        fn flushed_blocks(&self) -> usize {
            self.sink.blocks.len()
        }
    }
}
