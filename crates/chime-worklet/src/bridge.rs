//! wasm-bindgen bridge between the aggregation core and the AudioWorklet.
//!
//! The JS `AudioWorkletProcessor` shim owns nothing but a [`WorkletAggregator`]:
//! it forwards the first input channel of every `process()` callback here and
//! returns the keep-alive flag we hand back. Flushed blocks leave through the
//! processor's `MessagePort`, each as a fresh `Float32Array` whose backing
//! buffer is moved (not copied) to the receiving thread via the transfer list.

use js_sys::Float32Array;
use wasm_bindgen::prelude::*;
use web_sys::MessagePort;

use crate::aggregator::{BlockSink, SampleAggregator, MAX_BLOCK_FRAMES, RENDER_QUANTUM_FRAMES};

/// Sink that posts each flushed block through a `MessagePort`.
pub struct PortSink {
    port: MessagePort,
}

impl PortSink {
    pub fn new(port: MessagePort) -> Self {
        Self { port }
    }
}

impl BlockSink for PortSink {
    fn post_block(&mut self, samples: &[f32]) {
        let block = Float32Array::new_with_length(samples.len() as u32);
        block.copy_from(samples);
        let transfer = js_sys::Array::of1(&block.buffer());
        if let Err(err) = self
            .port
            .post_message_with_transferable(&block, &transfer)
        {
            // The render thread has no error surface; a closed/neutered port
            // drops the block. Log and keep rendering.
            web_sys::console::error_2(&JsValue::from_str("chime-worklet: block post failed"), &err);
        }
    }
}

/// Render-thread half of the audio transport, exported to JS.
#[wasm_bindgen]
pub struct WorkletAggregator {
    inner: SampleAggregator<PortSink>,
    scratch: Vec<f32>,
}

#[wasm_bindgen]
impl WorkletAggregator {
    /// Create an aggregator posting `block_frames`-sample blocks to `port`.
    #[wasm_bindgen(constructor)]
    pub fn new(port: MessagePort, block_frames: u32) -> Result<WorkletAggregator, JsValue> {
        if block_frames == 0 {
            return Err(JsValue::from_str("block_frames must be non-zero"));
        }
        if block_frames as usize > MAX_BLOCK_FRAMES {
            return Err(JsValue::from_str(&format!(
                "block_frames must be <= {MAX_BLOCK_FRAMES}"
            )));
        }
        Ok(Self {
            inner: SampleAggregator::with_block_frames(block_frames as usize, PortSink::new(port)),
            scratch: Vec::with_capacity(RENDER_QUANTUM_FRAMES),
        })
    }

    /// One render quantum. `input` is the first channel of the processor's
    /// first input, or `undefined` when nothing is connected this tick.
    ///
    /// Returns the processor keep-alive flag (always `true`).
    pub fn process(&mut self, input: Option<Float32Array>) -> bool {
        match input {
            Some(data) => {
                let len = data.length() as usize;
                // Grows once to the quantum size on the first callback, then
                // stays put; the steady-state path does not allocate.
                self.scratch.resize(len, 0.0);
                data.copy_to(&mut self.scratch[..len]);
                self.inner.process(Some(&self.scratch))
            }
            None => self.inner.process(None),
        }
    }

    /// Emit the buffered partial block ahead of a graph disconnect.
    pub fn drain(&mut self) {
        self.inner.drain();
    }

    #[wasm_bindgen(getter)]
    pub fn block_frames(&self) -> u32 {
        self.inner.block_frames() as u32
    }

    /// Samples buffered and not yet posted.
    #[wasm_bindgen(getter)]
    pub fn pending(&self) -> u32 {
        self.inner.pending() as u32
    }

    /// Stats snapshot as `{ blocks_flushed, samples_flushed }` (JSON string,
    /// since the counters are u64 and BigInt round-trips are not worth the
    /// trouble for telemetry).
    pub fn stats_json(&self) -> String {
        serde_json::to_string(&self.inner.stats()).unwrap_or_default()
    }
}
