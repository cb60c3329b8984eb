//! One-shot worker bootstrap for the precompiled synthesis engine.
//!
//! A freshly spawned engine worker knows nothing: the spawning thread sends it
//! a single bootstrap message carrying the already-compiled wasm module, the
//! location of the supporting glue code, and (optionally) a shared memory and
//! the raw module bytes. The very first inbound message *is* the bootstrap
//! payload; position in the stream is the entire contract, there is no
//! handshake.
//!
//! The bootstrap sequence runs exactly once per worker lifetime:
//! detach the message handler, hand the compiled module to the glue loader
//! through an instantiation hook (so the module is never recompiled from raw
//! bytes), synchronously load the glue code, invoke the engine factory, then
//! clear the large payload fields. Any fault is fatal to the worker; the
//! spawning thread observes it through its own supervision channel.
//!
//! The sequencing lives in [`WorkerBootstrap`], which is platform-agnostic
//! and natively testable through the [`WorkerEnv`] strategy seam; the wasm
//! build wires the seam to `js_sys`/`web_sys` in [`env`].

mod bootstrap;
mod payload;

#[cfg(target_arch = "wasm32")]
mod env;

pub use bootstrap::{
    BootstrapError, BootstrapGate, Phase, Route, WorkerBootstrap, WorkerEnv,
};
pub use payload::BootstrapPayload;

#[cfg(target_arch = "wasm32")]
pub use env::{install_bootstrap_handler, BrowserWorkerEnv, DEFAULT_FACTORY_GLOBAL};
