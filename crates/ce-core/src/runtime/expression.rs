//! First-class expression objects, the host-side counterpart of projected lambdas.

use super::loader::TypeLoader;
use super::operators;
use super::types::{FieldHandle, MethodHandle, RtType};
use super::value::{Invocable, Value};
use crate::error::{Error, Result};
use crate::ops::{BinaryOperator, UnaryOperator};
use itertools::Itertools;
use std::fmt;
use std::sync::Arc;

/// Read access to a named value owned elsewhere (an interpreter frame).
pub trait ValueSource: Send + Sync + fmt::Debug {
    fn get_value(&self, name: &str) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Static type of the node; for `Lambda`, the delegate type.
    pub ty: Option<RtType>,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Constant(Value),
    Parameter {
        name: String,
        index: usize,
    },
    /// A captured variable read back from its owning frame at evaluation time.
    FrameGet {
        source: Arc<dyn ValueSource>,
        name: String,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        if_true: Box<Expression>,
        if_false: Box<Expression>,
    },
    Convert {
        operand: Box<Expression>,
        checked: bool,
    },
    Field {
        instance: Option<Box<Expression>>,
        field: FieldHandle,
    },
    Property {
        instance: Option<Box<Expression>>,
        getter: MethodHandle,
        arguments: Vec<Expression>,
    },
    ArrayIndex {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        instance: Option<Box<Expression>>,
        method: MethodHandle,
        type_arguments: Vec<RtType>,
        arguments: Vec<Expression>,
    },
    New {
        ty: RtType,
        arguments: Vec<Expression>,
    },
    NewArray {
        element: RtType,
        items: Vec<Expression>,
    },
    Lambda {
        parameters: Vec<String>,
        body: Box<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExpressionKind, ty: Option<RtType>) -> Self {
        Self { kind, ty }
    }

    pub fn constant(value: Value, ty: Option<RtType>) -> Self {
        Self::new(ExpressionKind::Constant(value), ty)
    }

    pub fn parameter_count(&self) -> usize {
        match &self.kind {
            ExpressionKind::Lambda { parameters, .. } => parameters.len(),
            _ => 0,
        }
    }

    fn evaluate_all(&self, items: &[Expression], loader: &dyn TypeLoader, parameters: &[Value]) -> Result<Vec<Value>> {
        items
            .iter()
            .map(|item| item.evaluate(loader, parameters))
            .collect()
    }

    fn evaluate_instance(
        &self,
        instance: &Option<Box<Expression>>,
        loader: &dyn TypeLoader,
        parameters: &[Value],
    ) -> Result<Value> {
        match instance {
            Some(instance) => instance.evaluate(loader, parameters),
            None => Ok(Value::Null),
        }
    }

    /// Evaluate against positional `parameters` of the enclosing lambda.
    pub fn evaluate(&self, loader: &dyn TypeLoader, parameters: &[Value]) -> Result<Value> {
        match &self.kind {
            ExpressionKind::Constant(value) => Ok(value.clone()),
            ExpressionKind::Parameter { name, index } => parameters.get(*index).cloned().ok_or_else(|| {
                Error::resolution(format!("expression parameter `{}` is not bound", name))
            }),
            ExpressionKind::FrameGet { source, name } => source.get_value(name),
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = left.evaluate(loader, parameters)?;
                match (operator, &left) {
                    (BinaryOperator::ConditionalAnd, Value::Bool(false)) => Ok(left),
                    (BinaryOperator::ConditionalOr, Value::Bool(true)) => Ok(left),
                    _ => {
                        let right = right.evaluate(loader, parameters)?;
                        operators::binary(*operator, &left, &right)
                    }
                }
            }
            ExpressionKind::Unary { operator, operand } => {
                operators::unary(*operator, &operand.evaluate(loader, parameters)?)
            }
            ExpressionKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                if test.evaluate(loader, parameters)?.as_bool()? {
                    if_true.evaluate(loader, parameters)
                } else {
                    if_false.evaluate(loader, parameters)
                }
            }
            ExpressionKind::Convert { operand, checked } => {
                let value = operand.evaluate(loader, parameters)?;
                match &self.ty {
                    Some(target) => operators::convert(loader, &value, target, *checked),
                    None => Ok(value),
                }
            }
            ExpressionKind::Field { instance, field } => {
                let receiver = self.evaluate_instance(instance, loader, parameters)?;
                loader.get_field(field, &receiver)
            }
            ExpressionKind::Property {
                instance,
                getter,
                arguments,
            } => {
                let receiver = self.evaluate_instance(instance, loader, parameters)?;
                let arguments = self.evaluate_all(arguments, loader, parameters)?;
                loader.invoke(getter, receiver, &[], arguments, true)
            }
            ExpressionKind::ArrayIndex { array, index } => {
                let array = array.evaluate(loader, parameters)?;
                let index = index.evaluate(loader, parameters)?.as_i64()?;
                match array {
                    Value::Array(array) => array.get(index),
                    other => Err(Error::state(format!(
                        "cannot index a {} value",
                        other.kind_name()
                    ))),
                }
            }
            ExpressionKind::Call {
                instance,
                method,
                type_arguments,
                arguments,
            } => {
                let receiver = self.evaluate_instance(instance, loader, parameters)?;
                let arguments = self.evaluate_all(arguments, loader, parameters)?;
                loader.invoke(method, receiver, type_arguments, arguments, true)
            }
            ExpressionKind::New { ty, arguments } => {
                let arguments = self.evaluate_all(arguments, loader, parameters)?;
                loader.construct(ty, None, arguments)
            }
            ExpressionKind::NewArray { element, items } => {
                let items = self.evaluate_all(items, loader, parameters)?;
                loader.new_array(element, items)
            }
            ExpressionKind::Lambda { .. } => Ok(Value::Delegate(Arc::new(CompiledExpression::new(
                Arc::new(self.clone()),
            )))),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Constant(Value::String(s)) => write!(f, "\"{}\"", s),
            ExpressionKind::Constant(Value::Null) => f.write_str("null"),
            ExpressionKind::Constant(value) => write!(f, "{}", value),
            ExpressionKind::Parameter { name, .. } => f.write_str(name),
            ExpressionKind::FrameGet { name, .. } => write!(f, "value({})", name),
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator.symbol(), right),
            ExpressionKind::Unary { operator, operand } => {
                let symbol = match operator {
                    UnaryOperator::Plus => "+",
                    UnaryOperator::Minus => "-",
                    UnaryOperator::Not => "!",
                    UnaryOperator::BitwiseNegation => "~",
                };
                write!(f, "{}{}", symbol, operand)
            }
            ExpressionKind::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "IIF({}, {}, {})", test, if_true, if_false),
            ExpressionKind::Convert { operand, .. } => match &self.ty {
                Some(ty) => write!(f, "Convert({}, {})", operand, ty.name),
                None => write!(f, "Convert({})", operand),
            },
            ExpressionKind::Field { instance, field } => match instance {
                Some(instance) => write!(f, "{}.{}", instance, field.field.name),
                None => write!(f, "{}.{}", field.owner.name, field.field.name),
            },
            ExpressionKind::Property {
                instance, getter, ..
            } => {
                let name = getter.method.name.trim_start_matches("get_");
                match instance {
                    Some(instance) => write!(f, "{}.{}", instance, name),
                    None => write!(f, "{}.{}", getter.owner.name, name),
                }
            }
            ExpressionKind::ArrayIndex { array, index } => write!(f, "{}[{}]", array, index),
            ExpressionKind::Call {
                instance,
                method,
                arguments,
                ..
            } => {
                match instance {
                    Some(instance) => write!(f, "{}.", instance)?,
                    None => write!(f, "{}.", method.owner.name)?,
                }
                write!(f, "{}({})", method.method.name, arguments.iter().join(", "))
            }
            ExpressionKind::New { ty, arguments } => {
                write!(f, "new {}({})", ty.name, arguments.iter().join(", "))
            }
            ExpressionKind::NewArray { element, items } => {
                write!(f, "new {}[] {{{}}}", element.name, items.iter().join(", "))
            }
            ExpressionKind::Lambda { parameters, body } => {
                if parameters.len() == 1 {
                    write!(f, "{} => {}", parameters[0], body)
                } else {
                    write!(f, "({}) => {}", parameters.join(", "), body)
                }
            }
        }
    }
}

/// A compiled lambda expression, callable as a delegate.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    lambda: Arc<Expression>,
}

impl CompiledExpression {
    pub fn new(lambda: Arc<Expression>) -> Self {
        Self { lambda }
    }
}

impl Invocable for CompiledExpression {
    fn parameter_count(&self) -> usize {
        self.lambda.parameter_count()
    }

    fn invoke(&self, loader: &dyn TypeLoader, arguments: Vec<Value>) -> Result<Value> {
        match &self.lambda.kind {
            ExpressionKind::Lambda { parameters, body } => {
                if parameters.len() != arguments.len() {
                    return Err(Error::resolution(format!(
                        "compiled expression expects {} argument(s), got {}",
                        parameters.len(),
                        arguments.len()
                    )));
                }
                body.evaluate(loader, &arguments)
            }
            _ => self.lambda.evaluate(loader, &arguments),
        }
    }

    fn delegate_type(&self) -> Option<RtType> {
        self.lambda.ty.clone()
    }
}
