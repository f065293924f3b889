use super::*;
use ce_core::ops::VariableDeclarator;
use ce_core::runtime::Enumeration;

impl<'a> Interpreter<'a> {
    pub(super) fn execute_block(&self, operations: &[Operation], frame: &Frame) -> Result<Flow> {
        let scope = Frame::scope(frame);
        for operation in operations {
            match self.execute(operation, &scope)? {
                Flow::Normal(_) => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(Value::Void))
    }

    pub(super) fn declare_locals(&self, declarators: &[VariableDeclarator], frame: &Frame) -> Result<Flow> {
        for declarator in declarators {
            match &declarator.initializer {
                Some(initializer) => {
                    let value = self.evaluate(initializer, frame)?;
                    frame.define(&declarator.name, value)?;
                }
                None => frame.declare(&declarator.name)?,
            }
        }
        Ok(Flow::Normal(Value::Void))
    }

    pub(super) fn execute_if(
        &self,
        condition: &Operation,
        when_true: &Operation,
        when_false: Option<&Operation>,
        frame: &Frame,
    ) -> Result<Flow> {
        if self.evaluate(condition, frame)?.as_bool()? {
            self.execute(when_true, frame)
        } else {
            match when_false {
                Some(when_false) => self.execute(when_false, frame),
                None => Ok(Flow::Normal(Value::Void)),
            }
        }
    }

    /// Run one loop body; `Some` carries a flow that leaves the loop.
    fn loop_body(&self, body: &Operation, frame: &Frame) -> Result<Option<Flow>> {
        match self.execute(body, frame)? {
            Flow::Normal(_) | Flow::Continue => Ok(None),
            Flow::Break => Ok(Some(Flow::Normal(Value::Void))),
            flow @ Flow::Return(_) => Ok(Some(flow)),
        }
    }

    pub(super) fn execute_for(
        &self,
        before: &[Operation],
        condition: Option<&Operation>,
        at_loop_bottom: &[Operation],
        body: &Operation,
        frame: &Frame,
    ) -> Result<Flow> {
        let scope = Frame::scope(frame);
        for operation in before {
            self.execute(operation, &scope)?;
        }
        loop {
            if let Some(condition) = condition {
                if !self.evaluate(condition, &scope)?.as_bool()? {
                    break;
                }
            }
            if let Some(exit) = self.loop_body(body, &scope)? {
                return Ok(exit);
            }
            for operation in at_loop_bottom {
                self.execute(operation, &scope)?;
            }
        }
        Ok(Flow::Normal(Value::Void))
    }

    pub(super) fn execute_while(&self, condition: &Operation, body: &Operation, frame: &Frame) -> Result<Flow> {
        while self.evaluate(condition, frame)?.as_bool()? {
            if let Some(exit) = self.loop_body(body, frame)? {
                return Ok(exit);
            }
        }
        Ok(Flow::Normal(Value::Void))
    }

    pub(super) fn execute_do_while(&self, condition: &Operation, body: &Operation, frame: &Frame) -> Result<Flow> {
        loop {
            if let Some(exit) = self.loop_body(body, frame)? {
                return Ok(exit);
            }
            if !self.evaluate(condition, frame)?.as_bool()? {
                return Ok(Flow::Normal(Value::Void));
            }
        }
    }

    pub(super) fn execute_foreach(
        &self,
        variable: &str,
        collection: &Operation,
        body: &Operation,
        frame: &Frame,
    ) -> Result<Flow> {
        let source = self.evaluate(collection, frame)?;
        // arrays and lists are snapshotted; enumerators advance once per iteration
        for item in Enumeration::new(self.loader(), &source)? {
            let item = item?;
            let scope = Frame::scope(frame);
            scope.define(variable, item)?;
            if let Some(exit) = self.loop_body(body, &scope)? {
                return Ok(exit);
            }
        }
        Ok(Flow::Normal(Value::Void))
    }

    /// The error a `throw` raises. `Err` means evaluating the exception itself failed.
    pub(super) fn throw(&self, exception: Option<&Operation>, frame: &Frame) -> Result<Error> {
        let Some(exception) = exception else {
            unsupported_bail!("rethrow outside of a catch clause");
        };
        let value = self.evaluate(exception, frame)?;
        let loader = self.loader();
        let ty = loader.type_of(&value)?;
        let message = match loader.find_property(&ty, "Message")? {
            Some((owner, property)) => match &property.getter {
                Some(getter) => {
                    let handle = ce_core::runtime::MethodHandle {
                        owner,
                        method: getter.clone(),
                    };
                    loader.invoke(&handle, value.clone(), &[], Vec::new(), true)?
                }
                None => value.clone(),
            },
            None => value.clone(),
        };
        Ok(Error::Thrown(format!("{}: {}", ty.full_name(), message)))
    }
}
