#![forbid(unsafe_code)]

//! JS surface of the engine runtime.
//!
//! Both worker-side binaries are built from this crate so the JS shims see
//! one coherent API: the AudioWorklet processor constructs a
//! [`chime_worklet::WorkletAggregator`] (exported from its defining crate and
//! linked in here), and the engine worker's bootstrap shim calls
//! [`bootstrap_worker`] as its only piece of inline script.

// The full surface is only meaningful on wasm32.
#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::DedicatedWorkerGlobalScope;

    pub use chime_worklet::WorkletAggregator;

    /// Arm the one-shot bootstrap handler on the current worker scope.
    ///
    /// Must be called before the spawning thread posts the bootstrap payload;
    /// the first message received afterwards is consumed as the payload and
    /// never reaches application-level handlers. `factory_global` overrides
    /// the name of the engine factory the glue code defines; the default is
    /// [`chime_worker::DEFAULT_FACTORY_GLOBAL`].
    #[wasm_bindgen]
    pub fn bootstrap_worker(factory_global: Option<String>) -> Result<(), JsValue> {
        let scope: DedicatedWorkerGlobalScope = js_sys::global().dyn_into().map_err(|_| {
            JsValue::from_str("bootstrap_worker must be called inside a dedicated worker")
        })?;
        let factory_global =
            factory_global.unwrap_or_else(|| chime_worker::DEFAULT_FACTORY_GLOBAL.to_owned());
        chime_worker::install_bootstrap_handler(&scope, &factory_global);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::*;
