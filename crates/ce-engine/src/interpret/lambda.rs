use super::*;
use ce_core::runtime::Invocable;
use std::fmt;
use std::sync::{Arc, Weak};

/// An anonymous function closed over the frame it was created in.
pub struct InterpretedLambda {
    state: Weak<EngineState>,
    parameters: Vec<String>,
    body: Operation,
    frame: Frame,
    delegate_type: Option<RtType>,
}

impl InterpretedLambda {
    pub(crate) fn new(
        state: Weak<EngineState>,
        parameters: Vec<String>,
        body: Operation,
        frame: Frame,
        delegate_type: Option<RtType>,
    ) -> Self {
        Self {
            state,
            parameters,
            body,
            frame,
            delegate_type,
        }
    }
}

impl fmt::Debug for InterpretedLambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lambda({}) => {}", self.parameters.join(", "), self.body.kind_name())
    }
}

impl Invocable for InterpretedLambda {
    fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    fn invoke(&self, _loader: &dyn TypeLoader, arguments: Vec<Value>) -> Result<Value> {
        let state = self
            .state
            .upgrade()
            .ok_or_else(|| Error::state("the engine that created this lambda was dropped"))?;
        if arguments.len() != self.parameters.len() {
            return Err(Error::resolution(format!(
                "lambda expects {} argument(s), got {}",
                self.parameters.len(),
                arguments.len()
            )));
        }
        let _depth = state.enter()?;
        let scope = Frame::scope(&self.frame);
        for (name, argument) in self.parameters.iter().zip(arguments) {
            scope.define(name, argument)?;
        }
        let interpreter = Interpreter::new(&state);
        match &self.body.kind {
            OperationKind::Block { .. } | OperationKind::MethodBody { .. } => {
                interpreter.run(&self.body, &scope)
            }
            _ => interpreter.evaluate(&self.body, &scope),
        }
    }

    fn delegate_type(&self) -> Option<RtType> {
        self.delegate_type.clone()
    }
}

/// Combined delegate produced by event `+=`; invokes its targets in order.
#[derive(Debug)]
pub struct Multicast {
    targets: Vec<Arc<dyn Invocable>>,
}

fn targets_of(value: &Value) -> Result<Vec<Arc<dyn Invocable>>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Delegate(target) => Ok(target
            .invocation_list()
            .unwrap_or_else(|| vec![target.clone()])),
        other => Err(Error::state(format!(
            "expected a delegate, got {}",
            other.kind_name()
        ))),
    }
}

fn same_target(a: &Arc<dyn Invocable>, b: &Arc<dyn Invocable>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Multicast {
    fn pack(mut targets: Vec<Arc<dyn Invocable>>) -> Value {
        match targets.len() {
            0 => Value::Null,
            1 => targets.pop().map(Value::Delegate).unwrap_or(Value::Null),
            _ => Value::Delegate(Arc::new(Multicast { targets })),
        }
    }

    pub fn combine(current: &Value, added: &Value) -> Result<Value> {
        let mut targets = targets_of(current)?;
        targets.extend(targets_of(added)?);
        Ok(Self::pack(targets))
    }

    /// Remove the last occurrence of `removed`'s invocation list.
    pub fn remove(current: &Value, removed: &Value) -> Result<Value> {
        let mut targets = targets_of(current)?;
        let removed = targets_of(removed)?;
        if removed.is_empty() || removed.len() > targets.len() {
            return Ok(current.clone());
        }
        let found = (0..=targets.len() - removed.len()).rev().find(|start| {
            targets[*start..*start + removed.len()]
                .iter()
                .zip(&removed)
                .all(|(a, b)| same_target(a, b))
        });
        match found {
            Some(start) => {
                targets.drain(start..start + removed.len());
                Ok(Self::pack(targets))
            }
            None => Ok(current.clone()),
        }
    }
}

impl Invocable for Multicast {
    fn parameter_count(&self) -> usize {
        self.targets.first().map_or(0, |target| target.parameter_count())
    }

    fn invoke(&self, loader: &dyn TypeLoader, arguments: Vec<Value>) -> Result<Value> {
        let mut result = Value::Void;
        for target in &self.targets {
            result = target.invoke(loader, arguments.clone())?;
        }
        Ok(result)
    }

    fn delegate_type(&self) -> Option<RtType> {
        self.targets.last().and_then(|target| target.delegate_type())
    }

    fn invocation_list(&self) -> Option<Vec<Arc<dyn Invocable>>> {
        Some(self.targets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Constant(i32);

    impl Invocable for Constant {
        fn parameter_count(&self) -> usize {
            0
        }

        fn invoke(&self, _loader: &dyn TypeLoader, _arguments: Vec<Value>) -> Result<Value> {
            Ok(Value::Int32(self.0))
        }
    }

    #[test]
    fn multicast_adds_and_removes_by_identity() {
        let one: Arc<dyn Invocable> = Arc::new(Constant(1));
        let two: Arc<dyn Invocable> = Arc::new(Constant(2));
        let combined = Multicast::combine(&Value::Null, &Value::Delegate(one.clone())).unwrap();
        assert!(matches!(&combined, Value::Delegate(d) if same_target(d, &one)));

        let combined = Multicast::combine(&combined, &Value::Delegate(two.clone())).unwrap();
        assert_eq!(targets_of(&combined).unwrap().len(), 2);

        let remaining = Multicast::remove(&combined, &Value::Delegate(one)).unwrap();
        assert!(matches!(&remaining, Value::Delegate(d) if same_target(d, &two)));
        let empty = Multicast::remove(&remaining, &Value::Delegate(two)).unwrap();
        assert!(empty.is_null());
    }
}
