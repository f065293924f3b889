//! Lexical frames: chained variable environments used while interpreting.
//!
//! Every frame owns the same kind of storage. The kind only decides what the frame
//! contributes to a lookup: a type frame carries the declaring type, an instance frame
//! carries the receiver, a method frame carries the concrete generic environment of the
//! call, and a scope frame carries nothing but its locals.

use ce_core::error::{Error, Result};
use ce_core::runtime::{ObjRef, Object, RtType, Value, ValueSource};
use ce_core::state_bail;
use ce_reflect::GenericEnv;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Type,
    Instance,
    Method,
    Scope,
}

#[derive(Debug, Clone)]
enum Slot {
    Unassigned,
    Value(Value),
}

struct FrameData {
    kind: FrameKind,
    parent: Option<Frame>,
    slots: Mutex<HashMap<String, Slot>>,
    declaring: Option<RtType>,
    receiver: Option<Weak<Object>>,
    env: Option<GenericEnv>,
}

/// A shared handle to one frame of the chain.
#[derive(Clone)]
pub struct Frame(Arc<FrameData>);

impl Frame {
    fn create(
        kind: FrameKind,
        parent: Option<&Frame>,
        declaring: Option<RtType>,
        receiver: Option<Weak<Object>>,
        env: Option<GenericEnv>,
    ) -> Self {
        Frame(Arc::new(FrameData {
            kind,
            parent: parent.cloned(),
            slots: Mutex::new(HashMap::new()),
            declaring,
            receiver,
            env,
        }))
    }

    /// An outermost frame with no declaring type, for running loose statements.
    pub fn root() -> Self {
        Self::create(FrameKind::Type, None, None, None, Some(GenericEnv::new()))
    }

    pub fn for_type(declaring: &RtType, env: GenericEnv) -> Self {
        Self::create(FrameKind::Type, None, Some(declaring.clone()), None, Some(env))
    }

    /// The receiver is held weakly; objects cache their own instance frame.
    pub fn for_instance(parent: &Frame, receiver: &ObjRef) -> Self {
        Self::create(
            FrameKind::Instance,
            Some(parent),
            None,
            Some(Arc::downgrade(receiver)),
            None,
        )
    }

    pub fn for_method(parent: &Frame, declaring: &RtType, env: GenericEnv) -> Self {
        Self::create(
            FrameKind::Method,
            Some(parent),
            Some(declaring.clone()),
            None,
            Some(env),
        )
    }

    pub fn scope(parent: &Frame) -> Self {
        Self::create(FrameKind::Scope, Some(parent), None, None, None)
    }

    pub fn kind(&self) -> FrameKind {
        self.0.kind
    }

    pub fn parent(&self) -> Option<&Frame> {
        self.0.parent.as_ref()
    }

    fn slots(&self) -> Result<MutexGuard<'_, HashMap<String, Slot>>> {
        self.0
            .slots
            .lock()
            .map_err(|_| Error::state("frame storage is poisoned"))
    }

    /// Reserve `name` in this frame without a value.
    pub fn declare(&self, name: &str) -> Result<()> {
        let mut slots = self.slots()?;
        if slots.contains_key(name) {
            state_bail!("a local named `{}` is already defined in this scope", name);
        }
        slots.insert(name.to_string(), Slot::Unassigned);
        Ok(())
    }

    /// Bind `name` in this frame. A slot reserved by [`Frame::declare`] may be filled once.
    pub fn define(&self, name: &str, value: Value) -> Result<()> {
        let mut slots = self.slots()?;
        if let Some(Slot::Value(_)) = slots.get(name) {
            state_bail!("a local named `{}` is already defined in this scope", name);
        }
        slots.insert(name.to_string(), Slot::Value(value));
        Ok(())
    }

    /// Assign in the frame that owns `name`, or define it here when no frame does.
    pub fn define_or_assign(&self, name: &str, value: Value) -> Result<()> {
        match self.owner_of(name)? {
            Some(owner) => owner.store(name, value),
            None => self.define(name, value),
        }
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        match self.owner_of(name)? {
            Some(owner) => owner.store(name, value),
            None => state_bail!("the name `{}` does not exist in the current context", name),
        }
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        let mut current = Some(self);
        while let Some(frame) = current {
            if let Some(slot) = frame.slots()?.get(name) {
                return match slot {
                    Slot::Value(value) => Ok(value.clone()),
                    Slot::Unassigned => {
                        state_bail!("use of unassigned variable `{}`", name)
                    }
                };
            }
            current = frame.parent();
        }
        state_bail!("the name `{}` does not exist in the current context", name)
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.owner_of(name)?.is_some())
    }

    /// Names bound in this frame only, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.slots()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn owner_of(&self, name: &str) -> Result<Option<&Frame>> {
        let mut current = Some(self);
        while let Some(frame) = current {
            if frame.slots()?.contains_key(name) {
                return Ok(Some(frame));
            }
            current = frame.parent();
        }
        Ok(None)
    }

    fn store(&self, name: &str, value: Value) -> Result<()> {
        self.slots()?.insert(name.to_string(), Slot::Value(value));
        Ok(())
    }

    /// The receiver of the nearest instance frame.
    pub fn this(&self) -> Result<Value> {
        let mut current = Some(self);
        while let Some(frame) = current {
            if let Some(receiver) = &frame.0.receiver {
                return receiver
                    .upgrade()
                    .map(Value::Object)
                    .ok_or_else(|| Error::state("the receiver of this frame was dropped"));
            }
            current = frame.parent();
        }
        state_bail!("`this` is not available in a static context")
    }

    pub fn declaring_type(&self) -> Option<&RtType> {
        match &self.0.declaring {
            Some(declaring) => Some(declaring),
            None => self.parent()?.declaring_type(),
        }
    }

    /// Concrete generic bindings of the nearest frame that carries any.
    pub fn env(&self) -> Option<&GenericEnv> {
        match &self.0.env {
            Some(env) => Some(env),
            None => self.parent()?.env(),
        }
    }
}

impl ValueSource for Frame {
    fn get_value(&self, name: &str) -> Result<Value> {
        self.get(name)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names().unwrap_or_default();
        f.debug_struct("Frame")
            .field("kind", &self.0.kind)
            .field("names", &names)
            .field("parent", &self.0.parent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_core::error::ErrorKind;

    #[test]
    fn lookups_walk_outward_and_writes_land_in_the_owner() {
        let outer = Frame::root();
        outer.define("total", Value::Int32(0)).unwrap();
        let inner = Frame::scope(&outer);
        inner.assign("total", Value::Int32(3)).unwrap();
        assert_eq!(outer.get("total").unwrap(), Value::Int32(3));
        assert!(inner.names().unwrap().is_empty());

        inner.define_or_assign("fresh", Value::Bool(true)).unwrap();
        assert_eq!(inner.names().unwrap(), vec!["fresh".to_string()]);
        assert!(!outer.contains("fresh").unwrap());
    }

    #[test]
    fn contract_violations_are_state_errors() {
        let frame = Frame::root();
        frame.declare("x").unwrap();
        let err = frame.get("x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(err.to_string().contains("use of unassigned variable"));

        frame.define("x", Value::Int32(1)).unwrap();
        let err = frame.define("x", Value::Int32(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        let err = frame.assign("missing", Value::Null).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(frame.get("missing").is_err());
    }

    #[test]
    fn static_frames_have_no_receiver() {
        let err = Frame::scope(&Frame::root()).this().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }
}
