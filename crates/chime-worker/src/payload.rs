/// The one-time initialization message delivered into a worker.
///
/// `T` is the host's opaque handle type: `JsValue` on wasm32, a test double
/// natively. The payload is consumed exactly once; after the engine factory
/// has been invoked the large transferred fields are cleared so the handles
/// can be reclaimed, and the payload is never read again.
#[derive(Debug)]
pub struct BootstrapPayload<T> {
    /// The precompiled wasm module, transferred from the spawning thread.
    pub compiled_module: Option<T>,
    /// Location of the supporting glue code to load synchronously.
    pub glue_code_location: Option<String>,
    /// Shared linear memory, when the engine runs threaded.
    pub shared_memory: Option<T>,
    /// Raw module bytes, when the host wants them kept alongside the
    /// compiled module. Never used to re-compile.
    pub raw_binary: Option<T>,
}

impl<T> BootstrapPayload<T> {
    pub fn new(compiled_module: T, glue_code_location: impl Into<String>) -> Self {
        Self {
            compiled_module: Some(compiled_module),
            glue_code_location: Some(glue_code_location.into()),
            shared_memory: None,
            raw_binary: None,
        }
    }

    /// Drop every transferred field. Called once instantiation is complete;
    /// the payload object may live on but is inert afterwards.
    pub fn release_transferred(&mut self) {
        self.compiled_module = None;
        self.glue_code_location = None;
        self.shared_memory = None;
        self.raw_binary = None;
    }

    /// True once [`release_transferred`](Self::release_transferred) has run
    /// (or the payload never carried anything).
    pub fn is_released(&self) -> bool {
        self.compiled_module.is_none()
            && self.glue_code_location.is_none()
            && self.shared_memory.is_none()
            && self.raw_binary.is_none()
    }
}
