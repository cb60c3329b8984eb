use crate::payload::BootstrapPayload;

/// Worker lifecycle phases. `Running` is terminal; there is no way back and
/// no cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForBootstrap,
    Instantiating,
    Running,
}

/// Where an inbound worker message should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// First message of the worker's lifetime: the bootstrap payload.
    Bootstrap,
    /// Everything after the first message belongs to whatever handlers the
    /// loaded glue code registered.
    Application,
}

/// Routes the first inbound message to the bootstrap path and every later
/// message to the application.
///
/// This is the explicit form of "detach the handler after the first
/// message": once consumed, the gate never routes to `Bootstrap` again, so a
/// duplicate bootstrap delivery can never re-trigger instantiation. On
/// wasm32 the same contract is enforced physically by a one-shot closure
/// that unregisters itself before processing.
#[derive(Debug, Default)]
pub struct BootstrapGate {
    consumed: bool,
}

impl BootstrapGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self) -> Route {
        if self.consumed {
            Route::Application
        } else {
            self.consumed = true;
            Route::Bootstrap
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

/// Host strategies the bootstrap sequence is parameterized over.
///
/// The wasm32 implementation backs these with `WebAssembly.Instance`,
/// `importScripts`, and a global factory lookup; native tests use recording
/// fakes.
pub trait WorkerEnv {
    /// Opaque host handle type carried by the payload.
    type Handle;
    type Error;

    /// Install the instantiation hook: make the already-compiled module
    /// available to the glue loader so it constructs a running instance
    /// directly, bypassing the compile-from-raw-bytes path.
    fn install_instantiation_hook(
        &mut self,
        payload: &BootstrapPayload<Self::Handle>,
    ) -> Result<(), Self::Error>;

    /// Synchronously load the supporting glue code. Blocking is acceptable
    /// here: the worker has no real-time obligations before steady state.
    fn load_glue(&mut self, location: &str) -> Result<(), Self::Error>;

    /// Invoke the loaded engine's factory entry point with the payload. The
    /// factory's own asynchronous completion is the eventual caller's
    /// concern, not ours.
    fn invoke_factory(
        &mut self,
        payload: &BootstrapPayload<Self::Handle>,
    ) -> Result<(), Self::Error>;

    /// Release host-side references to the transferred payload fields.
    fn release_payload(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError<E> {
    #[error("bootstrap payload carries no compiled module")]
    MissingCompiledModule,
    #[error("bootstrap payload carries no glue code location")]
    MissingGlueLocation,
    #[error("installing the instantiation hook failed")]
    InstallHook(#[source] E),
    #[error("loading glue code from {location} failed")]
    GlueLoad {
        location: String,
        #[source]
        source: E,
    },
    #[error("engine factory invocation failed")]
    Factory(#[source] E),
    #[error("releasing the bootstrap payload failed")]
    Release(#[source] E),
}

/// Drives a worker from "no module loaded" to "engine running", exactly once.
///
/// `run` takes `self` by value, so a bootstrap object cannot be re-run; the
/// `WaitingForBootstrap → Instantiating → Running` progression is observable
/// through [`Phase`] only until the machine is consumed.
#[derive(Debug)]
pub struct WorkerBootstrap<E> {
    env: E,
    phase: Phase,
}

impl<E: WorkerEnv> WorkerBootstrap<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            phase: Phase::WaitingForBootstrap,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Consume the one-time payload and run the full bootstrap sequence.
    ///
    /// On success the payload's transferred fields have been cleared and the
    /// environment is returned to the caller in its post-bootstrap state. On
    /// failure the error propagates unmodified; a failed bootstrap is
    /// equivalent to a failed process start and the worker is expected to
    /// terminate.
    pub fn run(
        mut self,
        payload: &mut BootstrapPayload<E::Handle>,
    ) -> Result<E, BootstrapError<E::Error>> {
        self.phase = Phase::Instantiating;

        if payload.compiled_module.is_none() {
            return Err(BootstrapError::MissingCompiledModule);
        }
        let location = payload
            .glue_code_location
            .clone()
            .ok_or(BootstrapError::MissingGlueLocation)?;

        tracing::debug!(location = %location, "bootstrapping engine worker");

        self.env
            .install_instantiation_hook(payload)
            .map_err(BootstrapError::InstallHook)?;
        self.env
            .load_glue(&location)
            .map_err(|source| BootstrapError::GlueLoad { location, source })?;
        self.env
            .invoke_factory(payload)
            .map_err(BootstrapError::Factory)?;

        payload.release_transferred();
        self.env.release_payload().map_err(BootstrapError::Release)?;

        self.phase = Phase::Running;
        tracing::debug!("engine worker bootstrap complete");
        Ok(self.env)
    }
}
