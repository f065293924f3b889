use super::types::RtType;
use super::value::Value;
use crate::error::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

pub type ObjRef = Arc<Object>;
pub type ArrayRef = Arc<ArrayObject>;

/// Host-side state of builtin reference types.
#[derive(Debug, Clone, Default)]
pub enum NativeData {
    #[default]
    None,
    List(Vec<Value>),
    Enumerator { items: Vec<Value>, position: isize },
    Exception { message: String },
}

/// A heap instance. Field storage is keyed by [`super::RtField::slot`].
pub struct Object {
    ty: RtType,
    fields: Mutex<HashMap<Arc<str>, Value>>,
    native: Mutex<NativeData>,
    extension: OnceLock<Arc<dyn Any + Send + Sync>>,
}

impl Object {
    pub fn new(ty: &RtType) -> ObjRef {
        Arc::new(Self {
            ty: ty.clone(),
            fields: Mutex::new(HashMap::new()),
            native: Mutex::new(NativeData::None),
            extension: OnceLock::new(),
        })
    }

    pub fn ty(&self) -> &RtType {
        &self.ty
    }

    fn lock_fields(&self) -> Result<MutexGuard<'_, HashMap<Arc<str>, Value>>> {
        self.fields
            .lock()
            .map_err(|_| Error::state(format!("field storage of {} is poisoned", self.ty)))
    }

    pub fn get_field(&self, slot: &str) -> Result<Value> {
        self.lock_fields()?
            .get(slot)
            .cloned()
            .ok_or_else(|| Error::resolution(format!("{} has no field slot {}", self.ty, slot)))
    }

    pub fn set_field(&self, slot: Arc<str>, value: Value) -> Result<()> {
        self.lock_fields()?.insert(slot, value);
        Ok(())
    }

    pub fn has_field(&self, slot: &str) -> bool {
        self.fields
            .lock()
            .map(|fields| fields.contains_key(slot))
            .unwrap_or(false)
    }

    pub fn with_native<R>(&self, f: impl FnOnce(&mut NativeData) -> R) -> Result<R> {
        let mut native = self
            .native
            .lock()
            .map_err(|_| Error::state(format!("native state of {} is poisoned", self.ty)))?;
        Ok(f(&mut native))
    }

    /// Per-instance data attached by the engine on first use.
    pub fn extension(&self) -> &OnceLock<Arc<dyn Any + Send + Sync>> {
        &self.extension
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({} @ {:p})", self.ty, self as *const Object)
    }
}

pub struct ArrayObject {
    element: RtType,
    items: Mutex<Vec<Value>>,
}

impl ArrayObject {
    pub fn new(element: &RtType, items: Vec<Value>) -> ArrayRef {
        Arc::new(Self {
            element: element.clone(),
            items: Mutex::new(items),
        })
    }

    pub fn element_type(&self) -> &RtType {
        &self.element
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Value>>> {
        self.items
            .lock()
            .map_err(|_| Error::state("array storage is poisoned"))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn get(&self, index: i64) -> Result<Value> {
        let items = self.lock()?;
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or_else(out_of_range)
    }

    pub fn set(&self, index: i64, value: Value) -> Result<()> {
        let mut items = self.lock()?;
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| items.get_mut(i))
            .ok_or_else(out_of_range)?;
        *slot = value;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Vec<Value>> {
        Ok(self.lock()?.clone())
    }
}

impl fmt::Debug for ArrayObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array({}[])", self.element)
    }
}

pub(crate) fn out_of_range() -> Error {
    Error::Thrown(
        "System.IndexOutOfRangeException: Index was outside the bounds of the array.".to_string(),
    )
}
