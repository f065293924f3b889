use crate::frame::Frame;
use crate::interpret::Interpreter;
use crate::proxy::ProxyRegistry;
use crate::synth;
use ce_core::diagnostics::DiagnosticManager;
use ce_core::error::{Error, Result};
use ce_core::ops::Operation;
use ce_core::runtime::{Expression, RtType, TypeLoader, Value};
use ce_core::semantic::SemanticModel;
use ce_core::symbols::SymbolId;
use ce_core::{CancellationToken, EngineOptions};
use ce_reflect::{FieldInfo, Metadata, MethodInfo, PropertyInfo, Type, TypeRealizer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// State shared by everything one engine produces: interpreter calls, dispatch tables
/// of synthesized types and the realizer hook installed on the facade.
pub(crate) struct EngineState {
    pub(crate) this: Weak<EngineState>,
    pub(crate) metadata: Metadata,
    pub(crate) options: EngineOptions,
    pub(crate) cancellation: CancellationToken,
    pub(crate) proxies: ProxyRegistry,
    /// Compile errors of types that were skipped by synthesis.
    pub(crate) diagnostics: DiagnosticManager,
    depth: AtomicUsize,
}

pub(crate) struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EngineState {
    pub(crate) fn loader(&self) -> &dyn TypeLoader {
        self.metadata.loader().as_ref()
    }

    pub(crate) fn model(&self) -> &dyn SemanticModel {
        self.metadata.model()
    }

    /// Count one more nested interpreted call.
    pub(crate) fn enter(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = DepthGuard(&self.depth);
        if depth > self.options.max_call_depth {
            return Err(Error::state(format!(
                "call depth exceeded the limit of {}",
                self.options.max_call_depth
            )));
        }
        Ok(guard)
    }

    /// Operation tree of a member body, checked for compile errors.
    pub(crate) fn body_of(&self, symbol: SymbolId) -> Result<Option<Operation>> {
        self.cancellation.check()?;
        match self.model().body_of(symbol) {
            Some(node) => self.analyzed(node.id).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn initializer_of(&self, symbol: SymbolId) -> Result<Option<Operation>> {
        self.cancellation.check()?;
        match self.model().initializer_of(symbol) {
            Some(node) => self.analyzed(node.id).map(Some),
            None => Ok(None),
        }
    }

    fn analyzed(&self, syntax: ce_core::symbols::SyntaxId) -> Result<Operation> {
        let analysis = self.model().analyze(syntax)?;
        if analysis.has_errors() {
            return Err(Error::Compilation(analysis.diagnostics));
        }
        Ok(analysis.operation)
    }
}

impl TypeRealizer for EngineState {
    fn realize(&self, ty: &Type) -> Result<RtType> {
        match synth::build_type(self, ty)? {
            Some(realized) => Ok(realized),
            None => {
                let symbol = ty
                    .definition_symbol()
                    .ok_or_else(|| Error::state(format!("{} is not a definition", ty)))?;
                Err(Error::Compilation(self.model().type_diagnostics(symbol)))
            }
        }
    }
}

/// Entry point for a driving tool: realize source types and run source methods.
pub struct Engine {
    state: Arc<EngineState>,
}

impl Engine {
    pub fn new(model: Arc<dyn SemanticModel>, loader: Arc<dyn TypeLoader>, options: EngineOptions) -> Result<Self> {
        let state = Arc::new_cyclic(|this| EngineState {
            this: this.clone(),
            metadata: Metadata::new(model, loader.clone()),
            options,
            cancellation: CancellationToken::new(),
            proxies: ProxyRegistry::new(loader),
            diagnostics: DiagnosticManager::new(),
            depth: AtomicUsize::new(0),
        });
        let weak: Weak<EngineState> = Arc::downgrade(&state);
        let realizer: Weak<dyn TypeRealizer> = weak;
        state.metadata.set_realizer(realizer)?;
        debug!(
            max_call_depth = state.options.max_call_depth,
            "engine created"
        );
        Ok(Self { state })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.state.metadata
    }

    pub fn options(&self) -> &EngineOptions {
        &self.state.options
    }

    /// Cancelling the returned token stops the engine at its next coarse boundary.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.state.cancellation
    }

    pub fn diagnostics(&self) -> &DiagnosticManager {
        &self.state.diagnostics
    }

    pub fn proxies(&self) -> &ProxyRegistry {
        &self.state.proxies
    }

    pub fn register_proxy(&self, proxy: &RtType) -> Result<()> {
        self.state.proxies.register(proxy)
    }

    pub fn proxy_type(&self, source: &Type) -> Result<RtType> {
        self.state.proxies.get_proxy_type(&self.state.metadata, source)
    }

    /// Synthesize the loadable type for a source class or interface. `None` when the
    /// type carries compile errors.
    pub fn build_type(&self, ty: &Type) -> Result<Option<RtType>> {
        if let Some(existing) = ty
            .definition_symbol()
            .and_then(|symbol| self.state.metadata.concrete_of(symbol))
        {
            return Ok(Some(existing));
        }
        synth::build_type(&self.state, ty)
    }

    /// Concrete type for any facade type, synthesizing source definitions on demand.
    pub fn realize(&self, ty: &Type) -> Result<RtType> {
        self.state.metadata.resolve_type(ty, None)
    }

    pub fn construct(&self, ty: &Type, arguments: Vec<Value>) -> Result<Value> {
        let concrete = self.realize(ty)?;
        self.state.loader().construct(&concrete, None, arguments)
    }

    /// Run `method` against `receiver` (`Value::Null` for statics).
    pub fn execute(&self, method: &MethodInfo, receiver: Value, arguments: Vec<Value>) -> Result<Value> {
        let (handle, type_arguments) = self.state.metadata.resolve_method(method, None)?;
        let loader = self.state.loader();
        if method.is_constructor() {
            loader.invoke_constructor(&handle, &receiver, arguments)?;
            return Ok(Value::Void);
        }
        loader.invoke(&handle, receiver, &type_arguments, arguments, true)
    }

    pub fn get_field(&self, field: &FieldInfo, receiver: &Value) -> Result<Value> {
        let handle = self.state.metadata.resolve_field(field, None)?;
        self.state.loader().get_field(&handle, receiver)
    }

    pub fn set_field(&self, field: &FieldInfo, receiver: &Value, value: Value) -> Result<()> {
        let handle = self.state.metadata.resolve_field(field, None)?;
        self.state.loader().set_field(&handle, receiver, value)
    }

    pub fn get_property(&self, property: &PropertyInfo, receiver: Value) -> Result<Value> {
        let getter = self.state.metadata.getter(property)?.ok_or_else(|| {
            Error::resolution(format!("property {} has no getter", property.member()))
        })?;
        self.execute(&getter, receiver, Vec::new())
    }

    /// Interpret a statement or body in `frame`; a `return` yields its value.
    pub fn interpret(&self, operation: &Operation, frame: &Frame) -> Result<Value> {
        Interpreter::new(&self.state).run(operation, frame)
    }

    /// Project an anonymous-function operation into an expression object.
    pub fn project(&self, lambda: &Operation, frame: &Frame) -> Result<Arc<Expression>> {
        Interpreter::new(&self.state).project(lambda, frame)
    }
}
