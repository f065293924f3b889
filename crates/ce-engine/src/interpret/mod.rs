//! Recursive evaluation of analyzed operation trees against a frame chain.
//!
//! Statements go through [`Interpreter::execute`] and produce a [`Flow`]; expressions go
//! through [`Interpreter::evaluate`] and produce a value. Member references are looked up
//! through the metadata facade as written and mapped to runtime members with the
//! concrete generic environment of the current frame.

use crate::engine::EngineState;
use crate::frame::Frame;
use ce_core::error::{Error, Result};
use ce_core::ops::{Operation, OperationKind};
use ce_core::runtime::{RtType, TypeLoader, Value};
use ce_core::symbols::TypeRef;
use ce_core::{state_bail, unsupported_bail};
use ce_reflect::{GenericContext, Metadata};
use tracing::trace;

mod expressions;
mod lambda;
mod members;
mod statements;

pub use lambda::{InterpretedLambda, Multicast};

/// How a statement finished.
#[derive(Debug, Clone)]
pub(crate) enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Option<Value>),
}

pub(crate) struct Interpreter<'a> {
    state: &'a EngineState,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(state: &'a EngineState) -> Self {
        Self { state }
    }

    pub(crate) fn metadata(&self) -> &'a Metadata {
        &self.state.metadata
    }

    pub(crate) fn loader(&self) -> &'a dyn TypeLoader {
        self.state.loader()
    }

    /// Run a statement or body to completion.
    pub(crate) fn run(&self, operation: &Operation, frame: &Frame) -> Result<Value> {
        match self.execute(operation, frame)? {
            Flow::Normal(value) => Ok(value),
            Flow::Return(value) => Ok(value.unwrap_or(Value::Void)),
            Flow::Break | Flow::Continue => {
                state_bail!("`break` or `continue` outside of a loop")
            }
        }
    }

    pub(crate) fn execute(&self, operation: &Operation, frame: &Frame) -> Result<Flow> {
        self.trace(operation);
        match &operation.kind {
            OperationKind::Block { operations } => self.execute_block(operations, frame),
            OperationKind::VariableDeclarationGroup { declarators } => {
                self.declare_locals(declarators, frame)
            }
            OperationKind::ExpressionStatement { operation } => {
                self.evaluate(operation, frame)?;
                Ok(Flow::Normal(Value::Void))
            }
            OperationKind::Empty => Ok(Flow::Normal(Value::Void)),
            OperationKind::Conditional {
                condition,
                when_true,
                when_false,
            } => self.execute_if(condition, when_true, when_false.as_deref(), frame),
            OperationKind::Return { value } => {
                let value = match value {
                    Some(value) => Some(self.evaluate(value, frame)?),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            OperationKind::Branch { kind } => Ok(match kind {
                ce_core::ops::BranchKind::Break => Flow::Break,
                ce_core::ops::BranchKind::Continue => Flow::Continue,
            }),
            OperationKind::For {
                before,
                condition,
                at_loop_bottom,
                body,
            } => self.execute_for(before, condition.as_deref(), at_loop_bottom, body, frame),
            OperationKind::While { condition, body } => self.execute_while(condition, body, frame),
            OperationKind::DoWhile { condition, body } => {
                self.execute_do_while(condition, body, frame)
            }
            OperationKind::ForEach {
                variable,
                collection,
                body,
            } => self.execute_foreach(variable, collection, body, frame),
            OperationKind::Throw { exception } => Err(self.throw(exception.as_deref(), frame)?),
            OperationKind::MethodBody { body } => self.execute(body, frame),
            OperationKind::ConstructorBody { initializer, body } => {
                if let Some(initializer) = initializer {
                    self.evaluate(initializer, frame)?;
                }
                match body {
                    Some(body) => self.execute(body, frame),
                    None => Ok(Flow::Normal(Value::Void)),
                }
            }
            OperationKind::FieldInitializer { fields, value } => {
                self.initialize_fields(fields, value, frame)?;
                Ok(Flow::Normal(Value::Void))
            }
            OperationKind::PropertyInitializer { properties, value } => {
                self.initialize_properties(properties, value, frame)?;
                Ok(Flow::Normal(Value::Void))
            }
            _ => Ok(Flow::Normal(self.evaluate(operation, frame)?)),
        }
    }

    pub(crate) fn evaluate(&self, operation: &Operation, frame: &Frame) -> Result<Value> {
        self.trace(operation);
        match &operation.kind {
            OperationKind::Literal(literal) => Value::from_literal(literal),
            OperationKind::DefaultValue => self.default_of(operation, frame),
            OperationKind::LocalReference { name } | OperationKind::ParameterReference { name } => {
                frame.get(name)
            }
            OperationKind::InstanceReference => frame.this(),
            OperationKind::FieldReference { .. }
            | OperationKind::PropertyReference { .. }
            | OperationKind::ArrayElementReference { .. } => {
                let place = self.place(operation, frame)?;
                self.load(&place, frame)
            }
            OperationKind::SimpleAssignment { target, value } => self.assign(target, value, frame),
            OperationKind::CompoundAssignment {
                operator,
                target,
                value,
            } => self.compound_assign(*operator, target, value, frame),
            OperationKind::Increment {
                target,
                decrement,
                postfix,
            } => self.increment(target, *decrement, *postfix, frame),
            OperationKind::DeconstructionAssignment { target, value } => {
                self.deconstruct(target, value, frame)
            }
            OperationKind::Tuple { elements } => {
                Ok(Value::tuple(self.evaluate_all(elements, frame)?))
            }
            OperationKind::Binary {
                operator,
                left,
                right,
            } => self.binary(*operator, left, right, frame),
            OperationKind::Unary { operator, operand } => {
                let operand = self.evaluate(operand, frame)?;
                ce_core::runtime::operators::unary(*operator, &operand)
            }
            OperationKind::Conditional {
                condition,
                when_true,
                when_false,
            } => match when_false {
                Some(when_false) => {
                    if self.evaluate(condition, frame)?.as_bool()? {
                        self.evaluate(when_true, frame)
                    } else {
                        self.evaluate(when_false, frame)
                    }
                }
                None => unsupported_bail!("a conditional without an else branch has no value"),
            },
            OperationKind::Coalesce { value, when_null } => {
                let value = self.evaluate(value, frame)?;
                if value.is_null() {
                    self.evaluate(when_null, frame)
                } else {
                    Ok(value)
                }
            }
            OperationKind::Conversion { operand, checked } => {
                self.convert(operation, operand, *checked, frame)
            }
            OperationKind::IsType { operand, target } => self.is_type(operand, target, frame),
            OperationKind::TypeOf { target } => Ok(Value::Type(self.resolve(target, frame)?)),
            OperationKind::Invocation {
                method,
                instance,
                arguments,
                is_virtual,
            } => self.invocation(method, instance.as_deref(), arguments, *is_virtual, frame),
            OperationKind::ObjectCreation {
                constructor,
                arguments,
            } => self.create_object(constructor, arguments, frame),
            OperationKind::ArrayCreation {
                element_type,
                dimension_sizes,
                initializer,
            } => self.create_array(element_type, dimension_sizes, initializer.as_deref(), frame),
            OperationKind::InterpolatedString { parts } => self.interpolate(parts, frame),
            OperationKind::AnonymousFunction { parameters, body } => {
                self.lambda(operation, parameters, body, frame)
            }
            OperationKind::Throw { exception } => Err(self.throw(exception.as_deref(), frame)?),
            OperationKind::Unsupported { kind } => {
                unsupported_bail!("unsupported operation kind {}", kind)
            }
            other => unsupported_bail!("unsupported operation kind {} in an expression", other.name()),
        }
    }

    pub(crate) fn evaluate_all(&self, operations: &[Operation], frame: &Frame) -> Result<Vec<Value>> {
        operations
            .iter()
            .map(|operation| self.evaluate(operation, frame))
            .collect()
    }

    /// Concrete type for a type expression as seen from `frame`.
    pub(crate) fn resolve(&self, ty: &TypeRef, frame: &Frame) -> Result<RtType> {
        let facade = self.metadata().type_from_ref(ty, &GenericContext::Root)?;
        self.metadata().resolve_type(&facade, frame.env())
    }

    /// Static type of `operation`, required by kinds that convert or default.
    fn static_type(&self, operation: &Operation, frame: &Frame) -> Result<RtType> {
        match &operation.ty {
            Some(ty) => self.resolve(ty, frame),
            None => Err(Error::state(format!(
                "{} operation carries no type",
                operation.kind_name()
            ))),
        }
    }

    fn trace(&self, operation: &Operation) {
        if self.state.options.trace_operations {
            trace!(kind = operation.kind_name(), "interpret");
        }
    }
}
