use crate::engine::EngineState;
use crate::frame::Frame;
use crate::interpret::{Interpreter, Multicast};
use ce_core::error::{Error, Result};
use ce_core::ops::OperationKind;
use ce_core::runtime::{
    DispatchTarget, FieldHandle, MethodHandle, ObjRef, RtField, RtMethod, RtType, TrampolineCall, TypeLoader, Value,
};
use ce_core::symbols::SymbolId;
use ce_reflect::GenericEnv;
use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// What a trampoline id stands for in a synthesized type.
#[derive(Debug, Clone)]
pub(crate) enum DispatchEntry {
    /// Body of a method, accessor or static constructor.
    Method(SymbolId),
    /// Initializer of a field or property; `target` receives a bare initializer value.
    Initializer {
        member: SymbolId,
        target: Option<Arc<RtField>>,
    },
    /// The `base(...)` or `this(...)` call of a constructor.
    ConstructorInitializer(SymbolId),
    /// The statements of a constructor, after chaining.
    ConstructorBody(SymbolId),
    /// Field-like event accessor combining into the backing field.
    EventAccessor { field: Arc<RtField>, remove: bool },
}

/// Static state each closed type sets up once: constants, then static field
/// initializers in declaration order, then the static constructor.
#[derive(Default)]
pub(crate) struct StaticInit {
    pub(crate) constants: Vec<(Arc<str>, Value)>,
    pub(crate) initializers: Vec<u32>,
    pub(crate) constructor: Option<Arc<RtMethod>>,
}

/// Dispatch table shared by a synthesized definition and all of its instantiations.
pub(crate) struct TypeDispatch {
    state: Weak<EngineState>,
    source: SymbolId,
    type_parameters: Vec<SymbolId>,
    entries: OnceLock<Vec<DispatchEntry>>,
    statics: OnceLock<StaticInit>,
}

impl TypeDispatch {
    pub(crate) fn new(state: Weak<EngineState>, source: SymbolId, type_parameters: Vec<SymbolId>) -> Self {
        Self {
            state,
            source,
            type_parameters,
            entries: OnceLock::new(),
            statics: OnceLock::new(),
        }
    }

    pub(crate) fn install(&self, entries: Vec<DispatchEntry>, statics: StaticInit) -> Result<()> {
        let installed = || Error::state(format!("dispatch table of symbol {} is already installed", self.source.0));
        self.entries.set(entries).map_err(|_| installed())?;
        self.statics.set(statics).map_err(|_| installed())
    }

    fn entry(&self, op_id: u32) -> Result<&DispatchEntry> {
        self.entries
            .get()
            .and_then(|entries| entries.get(op_id as usize))
            .ok_or_else(|| Error::state(format!("symbol {} has no dispatch entry {}", self.source.0, op_id)))
    }

    fn type_env(&self, declaring: &RtType) -> GenericEnv {
        let mut env = GenericEnv::new();
        for (parameter, argument) in self.type_parameters.iter().zip(declaring.generic_arguments()) {
            env.bind(*parameter, argument.clone());
        }
        env
    }

    fn method_env(&self, state: &EngineState, method: SymbolId, call: &TrampolineCall) -> Result<GenericEnv> {
        let mut env = self.type_env(&call.declaring_type);
        let declared = state.metadata.symbols().method(method)?;
        for (parameter, argument) in declared.type_parameters.iter().zip(&call.type_arguments) {
            env.bind(*parameter, argument.clone());
        }
        Ok(env)
    }

    /// The instance frame lives as long as the object and holds no strong reference to it.
    fn instance_frame(&self, state: &EngineState, receiver: &ObjRef) -> Result<Frame> {
        if let Some(frame) = receiver.extension().get().and_then(|ext| ext.downcast_ref::<Frame>()) {
            return Ok(frame.clone());
        }
        let runtime_type = receiver.ty().clone();
        let env = match runtime_type.source {
            Some(source) if source == self.source => self.type_env(&runtime_type),
            Some(source) => {
                let mut env = GenericEnv::new();
                let declared = state.metadata.symbols().type_symbol(source)?;
                for (parameter, argument) in declared.type_parameters.iter().zip(runtime_type.generic_arguments()) {
                    env.bind(*parameter, argument.clone());
                }
                env
            }
            None => GenericEnv::new(),
        };
        let frame = Frame::for_instance(&Frame::for_type(&runtime_type, env), receiver);
        let stored: Arc<dyn Any + Send + Sync> = Arc::new(frame.clone());
        let cached = receiver.extension().get_or_init(|| stored);
        Ok(cached.downcast_ref::<Frame>().cloned().unwrap_or(frame))
    }

    fn frame(&self, state: &EngineState, call: &TrampolineCall, env: GenericEnv) -> Result<Frame> {
        let parent = match &call.receiver {
            Value::Object(obj) => self.instance_frame(state, obj)?,
            Value::Null => Frame::for_type(&call.declaring_type, env.clone()),
            other => {
                return Err(Error::state(format!(
                    "a {} value cannot receive a call into {}",
                    other.kind_name(),
                    call.declaring_type
                )))
            }
        };
        Ok(Frame::for_method(&parent, &call.declaring_type, env))
    }

    fn bind_parameters(&self, state: &EngineState, method: SymbolId, frame: &Frame, arguments: Vec<Value>) -> Result<()> {
        let declared = state.metadata.symbols().method(method)?;
        if declared.parameters.len() != arguments.len() {
            return Err(Error::resolution(format!(
                "{} expects {} argument(s), got {}",
                declared.name,
                declared.parameters.len(),
                arguments.len()
            )));
        }
        for (parameter, argument) in declared.parameters.iter().zip(arguments) {
            frame.define(&parameter.name, argument)?;
        }
        Ok(())
    }

    fn run(&self, state: &EngineState, call: TrampolineCall) -> Result<Value> {
        let interpreter = Interpreter::new(state);
        match self.entry(call.op_id)?.clone() {
            DispatchEntry::Method(method) => {
                let env = self.method_env(state, method, &call)?;
                let frame = self.frame(state, &call, env)?;
                let body = state.body_of(method)?.ok_or_else(|| {
                    Error::resolution(format!("method symbol {} has no body", method.0))
                })?;
                self.bind_parameters(state, method, &frame, call.arguments)?;
                let value = interpreter.run(&body, &frame)?;
                Ok(if call.return_type.is_some() { value } else { Value::Void })
            }
            DispatchEntry::Initializer { member, target } => {
                let frame = self.frame(state, &call, self.type_env(&call.declaring_type))?;
                let Some(initializer) = state.initializer_of(member)? else {
                    return Ok(Value::Void);
                };
                match (&initializer.kind, target) {
                    (OperationKind::FieldInitializer { .. } | OperationKind::PropertyInitializer { .. }, _) | (_, None) => {
                        interpreter.execute(&initializer, &frame)?;
                    }
                    (_, Some(field)) => {
                        let value = interpreter.evaluate(&initializer, &frame)?;
                        let handle = FieldHandle {
                            owner: call.declaring_type.clone(),
                            field,
                        };
                        state.loader().set_field(&handle, &call.receiver, value)?;
                    }
                }
                Ok(Value::Void)
            }
            DispatchEntry::ConstructorInitializer(constructor) => {
                let frame = self.frame(state, &call, self.type_env(&call.declaring_type))?;
                self.bind_parameters(state, constructor, &frame, call.arguments)?;
                if let Some(body) = state.body_of(constructor)? {
                    if let OperationKind::ConstructorBody {
                        initializer: Some(initializer),
                        ..
                    } = &body.kind
                    {
                        interpreter.evaluate(initializer, &frame)?;
                    }
                }
                Ok(Value::Void)
            }
            DispatchEntry::ConstructorBody(constructor) => {
                let frame = self.frame(state, &call, self.type_env(&call.declaring_type))?;
                self.bind_parameters(state, constructor, &frame, call.arguments)?;
                match state.body_of(constructor)? {
                    Some(body) => match &body.kind {
                        OperationKind::ConstructorBody { body: Some(inner), .. } => {
                            interpreter.run(inner, &frame)?;
                        }
                        OperationKind::ConstructorBody { body: None, .. } => {}
                        _ => {
                            interpreter.run(&body, &frame)?;
                        }
                    },
                    None => {}
                }
                Ok(Value::Void)
            }
            DispatchEntry::EventAccessor { field, remove } => {
                let handler = call
                    .arguments
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::resolution("event accessor expects a handler"))?;
                let handle = FieldHandle {
                    owner: call.declaring_type.clone(),
                    field,
                };
                let loader = state.loader();
                let current = loader.get_field(&handle, &call.receiver)?;
                let updated = if remove {
                    Multicast::remove(&current, &handler)?
                } else {
                    Multicast::combine(&current, &handler)?
                };
                loader.set_field(&handle, &call.receiver, updated)?;
                Ok(Value::Void)
            }
        }
    }
}

impl DispatchTarget for TypeDispatch {
    fn interpret(&self, _loader: &dyn TypeLoader, call: TrampolineCall) -> Result<Value> {
        let state = self
            .state
            .upgrade()
            .ok_or_else(|| Error::state("the engine that synthesized this type was dropped"))?;
        let _depth = state.enter()?;
        self.run(&state, call)
    }

    fn initialize_statics(&self, loader: &dyn TypeLoader, ty: &RtType) -> Result<()> {
        let statics = self
            .statics
            .get()
            .ok_or_else(|| Error::state(format!("{} is not finished", ty)))?;
        for (slot, value) in &statics.constants {
            ty.set_static_value(slot.clone(), value.clone())?;
        }
        for op_id in &statics.initializers {
            self.interpret(
                loader,
                TrampolineCall {
                    op_id: *op_id,
                    receiver: Value::Null,
                    declaring_type: ty.clone(),
                    type_arguments: Vec::new(),
                    arguments: Vec::new(),
                    return_type: None,
                },
            )?;
        }
        if let Some(constructor) = &statics.constructor {
            let handle = MethodHandle {
                owner: ty.clone(),
                method: constructor.clone(),
            };
            loader.invoke_constructor(&handle, &Value::Null, Vec::new())?;
        }
        debug!(ty = %ty, "initialized statics");
        Ok(())
    }
}
