use super::*;
use crate::interpret::lambda::InterpretedLambda;
use ce_core::ops::{BinaryOperator, InterpolatedPart};
use ce_core::runtime::format::format_value;
use ce_core::runtime::operators;
use ce_core::symbols::ParameterSymbol;
use std::sync::Arc;

const EXPRESSION_NAMESPACE: &str = "System.Linq.Expressions";
const EXPRESSION_NAME: &str = "Expression`1";

fn is_expression_type(ty: &RtType) -> bool {
    let definition = ty.generic_definition();
    definition.namespace == EXPRESSION_NAMESPACE && definition.name == EXPRESSION_NAME
}

impl<'a> Interpreter<'a> {
    pub(super) fn default_of(&self, operation: &Operation, frame: &Frame) -> Result<Value> {
        match &operation.ty {
            Some(_) => Ok(operators::default_value(&self.static_type(operation, frame)?)),
            None => Ok(Value::Null),
        }
    }

    pub(super) fn binary(&self, operator: BinaryOperator, left: &Operation, right: &Operation, frame: &Frame) -> Result<Value> {
        let left = self.evaluate(left, frame)?;
        match operator {
            BinaryOperator::ConditionalAnd if !left.as_bool()? => return Ok(Value::Bool(false)),
            BinaryOperator::ConditionalOr if left.as_bool()? => return Ok(Value::Bool(true)),
            _ => {}
        }
        let right = self.evaluate(right, frame)?;
        operators::binary(operator, &left, &right)
    }

    pub(super) fn convert(&self, operation: &Operation, operand: &Operation, checked: bool, frame: &Frame) -> Result<Value> {
        let target = self.static_type(operation, frame)?;
        if is_expression_type(&target) {
            if let OperationKind::AnonymousFunction { .. } = &operand.kind {
                return Ok(Value::Expression(self.project_as(operand, Some(&target), frame)?));
            }
        }
        let value = self.evaluate(operand, frame)?;
        operators::convert(self.loader(), &value, &target, checked)
    }

    pub(super) fn is_type(&self, operand: &Operation, target: &TypeRef, frame: &Frame) -> Result<Value> {
        let value = self.evaluate(operand, frame)?;
        if value.is_null() {
            return Ok(Value::Bool(false));
        }
        let target = self.resolve(target, frame)?;
        let actual = self.loader().type_of(&value)?;
        Ok(Value::Bool(self.loader().is_assignable(&target, &actual)?))
    }

    pub(super) fn create_array(
        &self,
        element_type: &TypeRef,
        dimension_sizes: &[Operation],
        initializer: Option<&[Operation]>,
        frame: &Frame,
    ) -> Result<Value> {
        let element = self.resolve(element_type, frame)?;
        if dimension_sizes.len() > 1 {
            unsupported_bail!("multi-dimensional array creation");
        }
        let items = match initializer {
            Some(items) => self.evaluate_all(items, frame)?,
            None => {
                let length = match dimension_sizes.first() {
                    Some(size) => self.evaluate(size, frame)?.as_i64()?,
                    None => 0,
                };
                let length = usize::try_from(length).map_err(|_| {
                    Error::Thrown("System.OverflowException: Arithmetic operation resulted in an overflow.".to_string())
                })?;
                vec![operators::default_value(&element); length]
            }
        };
        self.loader().new_array(&element, items)
    }

    pub(super) fn interpolate(&self, parts: &[InterpolatedPart], frame: &Frame) -> Result<Value> {
        let mut text = String::new();
        for part in parts {
            match part {
                InterpolatedPart::Text(literal) => text.push_str(literal),
                InterpolatedPart::Interpolation {
                    expression,
                    alignment,
                    format,
                } => {
                    let value = self.evaluate(expression, frame)?;
                    let alignment = match alignment {
                        Some(alignment) => Some(self.evaluate(alignment, frame)?.as_i64()?),
                        None => None,
                    };
                    text.push_str(&format_value(&value, alignment, format.as_deref())?);
                }
            }
        }
        Ok(Value::string(text))
    }

    pub(super) fn lambda(
        &self,
        operation: &Operation,
        parameters: &[ParameterSymbol],
        body: &Operation,
        frame: &Frame,
    ) -> Result<Value> {
        let delegate_type = match &operation.ty {
            Some(_) => Some(self.static_type(operation, frame)?),
            None => None,
        };
        if let Some(target) = delegate_type.as_ref().filter(|ty| is_expression_type(ty)) {
            return Ok(Value::Expression(self.project_as(operation, Some(target), frame)?));
        }
        let limit = self.state.options.max_delegate_parameters;
        if parameters.len() > limit {
            unsupported_bail!(
                "delegates with {} parameters are not supported (limit {})",
                parameters.len(),
                limit
            );
        }
        let lambda = InterpretedLambda::new(
            self.state.this.clone(),
            parameters.iter().map(|p| p.name.clone()).collect(),
            body.clone(),
            frame.clone(),
            delegate_type,
        );
        Ok(Value::Delegate(Arc::new(lambda)))
    }
}
