//! Browser worker environment: the bootstrap strategies wired to JS.
//!
//! The spawning thread posts a plain object `{ wasm, js, mem?, wasmBinary? }`
//! as the worker's first message. The glue code referenced by `js` expects
//! its instantiation hook under the `instantiateWasm` property of that same
//! object, and defines the engine factory as a global once loaded.

use js_sys::{Array, Function, Object, Reflect, WebAssembly};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{DedicatedWorkerGlobalScope, MessageEvent};

use crate::bootstrap::{BootstrapError, WorkerBootstrap, WorkerEnv};
use crate::payload::BootstrapPayload;

pub const COMPILED_MODULE_FIELD: &str = "wasm";
pub const GLUE_LOCATION_FIELD: &str = "js";
pub const SHARED_MEMORY_FIELD: &str = "mem";
pub const RAW_BINARY_FIELD: &str = "wasmBinary";

/// Property name the glue loader looks its instantiation hook up under.
const INSTANTIATE_HOOK_FIELD: &str = "instantiateWasm";

/// Global the glue code defines as the engine factory entry point.
pub const DEFAULT_FACTORY_GLOBAL: &str = "chimeModule";

/// [`WorkerEnv`] backed by `js_sys`/`web_sys` inside a dedicated worker.
#[derive(Debug)]
pub struct BrowserWorkerEnv {
    scope: DedicatedWorkerGlobalScope,
    /// The raw bootstrap message object. The hook is installed on it and the
    /// factory receives it whole, so it is kept alongside the parsed payload.
    message: Object,
    factory_global: String,
}

impl BrowserWorkerEnv {
    /// Split the inbound message into the environment and the parsed payload.
    pub fn from_message(
        scope: DedicatedWorkerGlobalScope,
        message: JsValue,
        factory_global: String,
    ) -> Result<(Self, BootstrapPayload<JsValue>), JsValue> {
        let message: Object = message
            .dyn_into()
            .map_err(|_| JsValue::from_str("bootstrap message is not an object"))?;

        let field = |name: &str| -> Option<JsValue> {
            Reflect::get(&message, &JsValue::from_str(name))
                .ok()
                .filter(|v| !v.is_undefined() && !v.is_null())
        };

        let payload = BootstrapPayload {
            compiled_module: field(COMPILED_MODULE_FIELD),
            glue_code_location: field(GLUE_LOCATION_FIELD).and_then(|v| v.as_string()),
            shared_memory: field(SHARED_MEMORY_FIELD),
            raw_binary: field(RAW_BINARY_FIELD),
        };

        Ok((
            Self {
                scope,
                message,
                factory_global,
            },
            payload,
        ))
    }
}

impl WorkerEnv for BrowserWorkerEnv {
    type Handle = JsValue;
    type Error = JsValue;

    fn install_instantiation_hook(
        &mut self,
        payload: &BootstrapPayload<JsValue>,
    ) -> Result<(), JsValue> {
        let module: WebAssembly::Module = payload
            .compiled_module
            .clone()
            .ok_or_else(|| JsValue::from_str("bootstrap payload carries no compiled module"))?
            .dyn_into()
            .map_err(|_| JsValue::from_str("compiled module is not a WebAssembly.Module"))?;

        // The glue loader calls this with (imports, receiveInstance) and
        // expects a synchronous instance. Building the instance from the
        // transferred module skips the compile-from-raw-bytes path entirely.
        let hook = Closure::<dyn FnMut(Object, Function) -> JsValue>::new(
            move |imports: Object, receive_instance: Function| -> JsValue {
                let instance = match WebAssembly::Instance::new(&module, &imports) {
                    Ok(instance) => instance,
                    Err(err) => wasm_bindgen::throw_val(err),
                };
                match receive_instance.call2(&JsValue::NULL, &instance, module.as_ref()) {
                    Ok(ret) => ret,
                    Err(err) => wasm_bindgen::throw_val(err),
                }
            },
        );
        Reflect::set(
            &self.message,
            &JsValue::from_str(INSTANTIATE_HOOK_FIELD),
            hook.as_ref(),
        )?;
        // The hook's lifetime is the message object's; hand it to JS.
        hook.forget();
        Ok(())
    }

    fn load_glue(&mut self, location: &str) -> Result<(), JsValue> {
        // Synchronous by contract: nothing real-time runs in this worker yet.
        let scripts = Array::of1(&JsValue::from_str(location));
        self.scope.import_scripts(&scripts)
    }

    fn invoke_factory(&mut self, _payload: &BootstrapPayload<JsValue>) -> Result<(), JsValue> {
        let factory = Reflect::get(&js_sys::global(), &JsValue::from_str(&self.factory_global))?;
        let factory: Function = factory.dyn_into().map_err(|_| {
            JsValue::from_str(&format!(
                "engine factory `{}` is not defined after glue load",
                self.factory_global
            ))
        })?;
        factory.call1(&JsValue::NULL, self.message.as_ref())?;
        Ok(())
    }

    fn release_payload(&mut self) -> Result<(), JsValue> {
        for name in [
            COMPILED_MODULE_FIELD,
            SHARED_MEMORY_FIELD,
            RAW_BINARY_FIELD,
            GLUE_LOCATION_FIELD,
        ] {
            Reflect::set(&self.message, &JsValue::from_str(name), &JsValue::UNDEFINED)?;
        }
        Ok(())
    }
}

/// Install the one-shot bootstrap handler on the worker's global scope.
///
/// The first message of the worker's lifetime is unconditionally the
/// bootstrap payload; the handler unregisters itself before touching it, so
/// any handler the glue code registers later sees only subsequent messages.
/// A bootstrap fault is rethrown to tear the worker down.
pub fn install_bootstrap_handler(scope: &DedicatedWorkerGlobalScope, factory_global: &str) {
    let handler_scope = scope.clone();
    let factory_global = factory_global.to_owned();
    let handler = Closure::once_into_js(move |event: MessageEvent| {
        handler_scope.set_onmessage(None);
        if let Err(err) = bootstrap_from_message(&handler_scope, event.data(), &factory_global) {
            wasm_bindgen::throw_val(err);
        }
    });
    scope.set_onmessage(Some(handler.unchecked_ref()));
}

fn bootstrap_from_message(
    scope: &DedicatedWorkerGlobalScope,
    data: JsValue,
    factory_global: &str,
) -> Result<(), JsValue> {
    let (env, mut payload) =
        BrowserWorkerEnv::from_message(scope.clone(), data, factory_global.to_owned())?;
    WorkerBootstrap::new(env)
        .run(&mut payload)
        .map_err(flatten_js_error)?;
    Ok(())
}

fn flatten_js_error(err: BootstrapError<JsValue>) -> JsValue {
    match err {
        BootstrapError::MissingCompiledModule | BootstrapError::MissingGlueLocation => {
            JsValue::from_str(&err.to_string())
        }
        BootstrapError::GlueLoad { location, source } => {
            web_sys::console::error_1(&JsValue::from_str(&format!(
                "chime-worker: loading glue code from {location} failed"
            )));
            source
        }
        BootstrapError::InstallHook(source)
        | BootstrapError::Factory(source)
        | BootstrapError::Release(source) => source,
    }
}
