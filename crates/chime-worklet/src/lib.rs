//! Block aggregation for the real-time audio render thread.
//!
//! The host's audio scheduler delivers samples in small fixed-cadence render
//! quanta (128 frames per callback on the web platform). Posting every quantum
//! across the thread boundary individually is wasteful, so the render-side
//! processor accumulates quanta into larger fixed-size blocks and posts each
//! block through the worklet's `MessagePort` the moment it fills.
//!
//! The aggregation core is pure Rust and runs natively for unit tests; the
//! wasm build adds a [`WorkletAggregator`] bridge that adapts it to
//! `js_sys`/`web_sys` types.

mod aggregator;

#[cfg(target_arch = "wasm32")]
mod bridge;

pub use aggregator::{AggregatorStats, BlockSink, SampleAggregator};
pub use aggregator::{DEFAULT_BLOCK_FRAMES, MAX_BLOCK_FRAMES, RENDER_QUANTUM_FRAMES};

#[cfg(target_arch = "wasm32")]
pub use bridge::{PortSink, WorkletAggregator};
