//! Projection of interpreted lambda bodies into expression objects.
//!
//! Parameters of the lambda become positional parameter nodes. Names that belong to an
//! enclosing frame are read back from that frame when the expression is evaluated.

use crate::frame::Frame;
use crate::interpret::Interpreter;
use ce_core::error::{Error, Result};
use ce_core::ops::{Operation, OperationKind};
use ce_core::runtime::{Expression, ExpressionKind, RtType, ValueSource, Value};
use ce_core::symbols::MemberRef;
use ce_core::unsupported_bail;
use ce_reflect::GenericContext;
use std::sync::Arc;

struct Projector<'i, 'a> {
    interpreter: &'i Interpreter<'a>,
    frame: &'i Frame,
    parameters: Vec<String>,
}

fn cannot_convert(operation: &Operation) -> Error {
    Error::not_supported(format!(
        "{} cannot convert to an expression",
        operation.kind_name()
    ))
}

impl<'a> Interpreter<'a> {
    /// Project an anonymous function; the expression's type is the operation's own type.
    pub(crate) fn project(&self, lambda: &Operation, frame: &Frame) -> Result<Arc<Expression>> {
        let delegate = match &lambda.ty {
            Some(ty) => Some(self.resolve(ty, frame)?),
            None => None,
        };
        self.project_lambda(lambda, delegate, frame)
    }

    /// Project for a conversion to `Expression<TDelegate>`.
    pub(crate) fn project_as(&self, lambda: &Operation, target: Option<&RtType>, frame: &Frame) -> Result<Arc<Expression>> {
        let delegate = target.and_then(|target| target.generic_arguments().first().cloned());
        self.project_lambda(lambda, delegate, frame)
    }

    fn project_lambda(&self, lambda: &Operation, delegate: Option<RtType>, frame: &Frame) -> Result<Arc<Expression>> {
        let OperationKind::AnonymousFunction { parameters, body } = &lambda.kind else {
            return Err(cannot_convert(lambda));
        };
        let projector = Projector {
            interpreter: self,
            frame,
            parameters: parameters.iter().map(|p| p.name.clone()).collect(),
        };
        let body = projector.body(body)?;
        Ok(Arc::new(Expression::new(
            ExpressionKind::Lambda {
                parameters: projector.parameters.clone(),
                body: Box::new(body),
            },
            delegate,
        )))
    }
}

impl Projector<'_, '_> {
    fn typed(&self, operation: &Operation) -> Result<Option<RtType>> {
        match &operation.ty {
            Some(ty) => Ok(Some(self.interpreter.resolve(ty, self.frame)?)),
            None => Ok(None),
        }
    }

    /// Statement bodies are accepted only when they return a single expression.
    fn body(&self, body: &Operation) -> Result<Expression> {
        match &body.kind {
            OperationKind::MethodBody { body } => self.body(body),
            OperationKind::Block { operations } => match operations.as_slice() {
                [single] => self.body(single),
                _ => Err(cannot_convert(body)),
            },
            OperationKind::Return { value: Some(value) } => self.project(value),
            _ => self.project(body),
        }
    }

    fn boxed(&self, operation: &Operation) -> Result<Box<Expression>> {
        Ok(Box::new(self.project(operation)?))
    }

    fn all(&self, operations: &[Operation]) -> Result<Vec<Expression>> {
        operations.iter().map(|operation| self.project(operation)).collect()
    }

    fn instance(&self, instance: Option<&Operation>) -> Result<Option<Box<Expression>>> {
        instance.map(|instance| self.boxed(instance)).transpose()
    }

    fn project(&self, operation: &Operation) -> Result<Expression> {
        let metadata = self.interpreter.metadata();
        let env = self.frame.env();
        let ty = self.typed(operation)?;
        let kind = match &operation.kind {
            OperationKind::Literal(literal) => ExpressionKind::Constant(Value::from_literal(literal)?),
            OperationKind::DefaultValue | OperationKind::TypeOf { .. } => {
                ExpressionKind::Constant(self.interpreter.evaluate(operation, self.frame)?)
            }
            OperationKind::ParameterReference { name } | OperationKind::LocalReference { name } => {
                match self.parameters.iter().position(|p| p == name) {
                    Some(index) => ExpressionKind::Parameter {
                        name: name.clone(),
                        index,
                    },
                    None => ExpressionKind::FrameGet {
                        source: Arc::new(self.frame.clone()) as Arc<dyn ValueSource>,
                        name: name.clone(),
                    },
                }
            }
            OperationKind::InstanceReference => ExpressionKind::Constant(self.frame.this()?),
            OperationKind::Binary {
                operator,
                left,
                right,
            } => ExpressionKind::Binary {
                operator: *operator,
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            OperationKind::Unary { operator, operand } => ExpressionKind::Unary {
                operator: *operator,
                operand: self.boxed(operand)?,
            },
            OperationKind::Conditional {
                condition,
                when_true,
                when_false: Some(when_false),
            } => ExpressionKind::Conditional {
                test: self.boxed(condition)?,
                if_true: self.boxed(when_true)?,
                if_false: self.boxed(when_false)?,
            },
            OperationKind::Conversion { operand, checked } => ExpressionKind::Convert {
                operand: self.boxed(operand)?,
                checked: *checked,
            },
            OperationKind::FieldReference { instance, field } => {
                let field = metadata.field_ref(field, &GenericContext::Root)?;
                ExpressionKind::Field {
                    instance: self.instance(instance.as_deref())?,
                    field: metadata.resolve_field(&field, env)?,
                }
            }
            OperationKind::PropertyReference {
                instance,
                property,
                arguments,
            } => {
                let property = metadata.property_ref(property, &GenericContext::Root)?;
                let getter = metadata.getter(&property)?.ok_or_else(|| {
                    Error::resolution(format!("property {} has no getter", property.member()))
                })?;
                let (getter, _) = metadata.resolve_method(&getter, env)?;
                ExpressionKind::Property {
                    instance: self.instance(instance.as_deref())?,
                    getter,
                    arguments: self.all(arguments)?,
                }
            }
            OperationKind::ArrayElementReference { array, indices } => match indices.as_slice() {
                [index] => ExpressionKind::ArrayIndex {
                    array: self.boxed(array)?,
                    index: self.boxed(index)?,
                },
                _ => unsupported_bail!("multi-dimensional element access cannot convert to an expression"),
            },
            OperationKind::Invocation {
                method,
                instance,
                arguments,
                ..
            } => self.call(method, instance.as_deref(), arguments)?,
            OperationKind::ObjectCreation {
                constructor,
                arguments,
            } => {
                let constructor = metadata.method_ref(constructor, &GenericContext::Root)?;
                let (handle, _) = metadata.resolve_method(&constructor, env)?;
                ExpressionKind::New {
                    ty: handle.owner,
                    arguments: self.all(arguments)?,
                }
            }
            OperationKind::ArrayCreation {
                element_type,
                initializer: Some(items),
                ..
            } => ExpressionKind::NewArray {
                element: self.interpreter.resolve(element_type, self.frame)?,
                items: self.all(items)?,
            },
            _ => return Err(cannot_convert(operation)),
        };
        Ok(Expression::new(kind, ty))
    }

    fn call(&self, method: &MemberRef, instance: Option<&Operation>, arguments: &[Operation]) -> Result<ExpressionKind> {
        let metadata = self.interpreter.metadata();
        let method = metadata.method_ref(method, &GenericContext::Root)?;
        if method.is_constructor() {
            unsupported_bail!("a constructor call cannot convert to an expression");
        }
        let (handle, type_arguments) = metadata.resolve_method(&method, self.frame.env())?;
        Ok(ExpressionKind::Call {
            instance: self.instance(instance)?,
            method: handle,
            type_arguments,
            arguments: self.all(arguments)?,
        })
    }
}
