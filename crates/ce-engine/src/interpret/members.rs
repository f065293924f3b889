use super::*;
use ce_core::ops::BinaryOperator;
use ce_core::runtime::{operators, ArrayRef, FieldHandle, MethodHandle, PROXY_OF_ATTRIBUTE};
use ce_core::symbols::{MemberRef, MethodKind};
use ce_reflect::{MethodInfo, PropertyInfo};

/// A location an assignment can write to. Receivers and indices are evaluated once,
/// when the place is formed.
pub(super) enum Place {
    Local(String),
    Field {
        handle: FieldHandle,
        receiver: Value,
        constant: Option<Value>,
    },
    Property {
        property: PropertyInfo,
        receiver: Value,
        arguments: Vec<Value>,
    },
    Element {
        array: ArrayRef,
        index: i64,
    },
    Character {
        text: Value,
        index: i64,
    },
}

/// Nested places of a deconstruction target.
pub(super) enum PlaceTree {
    Leaf(Place),
    Tuple(Vec<PlaceTree>),
}

impl<'a> Interpreter<'a> {
    fn receiver(&self, instance: Option<&Operation>, frame: &Frame) -> Result<Value> {
        match instance {
            Some(instance) => self.evaluate(instance, frame),
            None => Ok(Value::Null),
        }
    }

    pub(super) fn place(&self, target: &Operation, frame: &Frame) -> Result<Place> {
        match &target.kind {
            OperationKind::LocalReference { name } | OperationKind::ParameterReference { name } => {
                Ok(Place::Local(name.clone()))
            }
            OperationKind::FieldReference { instance, field } => {
                let field = self.metadata().field_ref(field, &GenericContext::Root)?;
                let receiver = self.receiver(instance.as_deref(), frame)?;
                let constant = match field.field_symbol().and_then(|f| f.constant.as_ref()) {
                    Some(literal) if field.is_const() => Some(Value::from_literal(literal)?),
                    _ => None,
                };
                let handle = self.metadata().resolve_field(&field, frame.env())?;
                Ok(Place::Field {
                    handle,
                    receiver,
                    constant,
                })
            }
            OperationKind::PropertyReference {
                instance,
                property,
                arguments,
            } => {
                let property = self.metadata().property_ref(property, &GenericContext::Root)?;
                let receiver = self.receiver(instance.as_deref(), frame)?;
                let arguments = self.evaluate_all(arguments, frame)?;
                Ok(Place::Property {
                    property,
                    receiver,
                    arguments,
                })
            }
            OperationKind::ArrayElementReference { array, indices } => {
                let target = self.evaluate(array, frame)?;
                let [index] = indices.as_slice() else {
                    unsupported_bail!("multi-dimensional element access");
                };
                let index = self.evaluate(index, frame)?.as_i64()?;
                match target {
                    Value::Array(array) => Ok(Place::Element { array, index }),
                    text @ Value::String(_) => Ok(Place::Character { text, index }),
                    Value::Null => Err(Error::Thrown(
                        "System.NullReferenceException: Object reference not set to an instance of an object."
                            .to_string(),
                    )),
                    other => unsupported_bail!("element access on a {} value", other.kind_name()),
                }
            }
            other => state_bail!("{} is not assignable", other.name()),
        }
    }

    pub(super) fn load(&self, place: &Place, frame: &Frame) -> Result<Value> {
        match place {
            Place::Local(name) => frame.get(name),
            Place::Field {
                constant: Some(value),
                ..
            } => Ok(value.clone()),
            Place::Field {
                handle, receiver, ..
            } => self.loader().get_field(handle, receiver),
            Place::Property {
                property,
                receiver,
                arguments,
            } => self.read_property(property, receiver, arguments.clone(), frame),
            Place::Element { array, index } => array.get(*index),
            Place::Character { text, index } => {
                let text = text.as_str()?;
                usize::try_from(*index)
                    .ok()
                    .and_then(|index| text.chars().nth(index))
                    .map(Value::Char)
                    .ok_or_else(|| {
                        Error::Thrown(
                            "System.IndexOutOfRangeException: Index was outside the bounds of the array."
                                .to_string(),
                        )
                    })
            }
        }
    }

    pub(super) fn store(&self, place: &Place, value: Value, frame: &Frame) -> Result<()> {
        match place {
            Place::Local(name) => frame.define_or_assign(name, value),
            Place::Field {
                constant: Some(_),
                handle,
                ..
            } => state_bail!("cannot assign to constant {}", handle.field.name),
            Place::Field {
                handle, receiver, ..
            } => self.loader().set_field(handle, receiver, value),
            Place::Property {
                property,
                receiver,
                arguments,
            } => self.write_property(property, receiver, arguments.clone(), value, frame),
            Place::Element { array, index } => array.set(*index, value),
            Place::Character { .. } => state_bail!("strings are immutable"),
        }
    }

    /// Auto-properties that cannot be overridden are read and written through their
    /// backing field.
    fn backing_handle(&self, property: &PropertyInfo, frame: &Frame) -> Result<Option<FieldHandle>> {
        if property.is_virtual || property.is_abstract || !property.declaring.is_source() {
            return Ok(None);
        }
        match self.metadata().backing_field(property)? {
            Some(field) => Ok(Some(self.metadata().resolve_field(&field, frame.env())?)),
            None => Ok(None),
        }
    }

    fn read_property(&self, property: &PropertyInfo, receiver: &Value, arguments: Vec<Value>, frame: &Frame) -> Result<Value> {
        if let Some(handle) = self.backing_handle(property, frame)? {
            return self.loader().get_field(&handle, receiver);
        }
        let getter = self.metadata().getter(property)?.ok_or_else(|| {
            Error::resolution(format!("property {} has no getter", property.member()))
        })?;
        self.call(&getter, receiver.clone(), arguments, true, frame)
    }

    fn write_property(
        &self,
        property: &PropertyInfo,
        receiver: &Value,
        mut arguments: Vec<Value>,
        value: Value,
        frame: &Frame,
    ) -> Result<()> {
        if let Some(handle) = self.backing_handle(property, frame)? {
            return self.loader().set_field(&handle, receiver, value);
        }
        let setter = self.metadata().setter(property)?.ok_or_else(|| {
            Error::resolution(format!("property {} has no setter", property.member()))
        })?;
        arguments.push(value);
        self.call(&setter, receiver.clone(), arguments, true, frame)?;
        Ok(())
    }

    pub(super) fn assign(&self, target: &Operation, value: &Operation, frame: &Frame) -> Result<Value> {
        let place = self.place(target, frame)?;
        let value = self.evaluate(value, frame)?;
        self.store(&place, value.clone(), frame)?;
        Ok(value)
    }

    pub(super) fn compound_assign(
        &self,
        operator: BinaryOperator,
        target: &Operation,
        value: &Operation,
        frame: &Frame,
    ) -> Result<Value> {
        let place = self.place(target, frame)?;
        let current = self.load(&place, frame)?;
        let operand = self.evaluate(value, frame)?;
        let combined = operators::narrow_to(&current, operators::binary(operator, &current, &operand)?);
        self.store(&place, combined.clone(), frame)?;
        Ok(combined)
    }

    pub(super) fn increment(&self, target: &Operation, decrement: bool, postfix: bool, frame: &Frame) -> Result<Value> {
        let place = self.place(target, frame)?;
        let current = self.load(&place, frame)?;
        let stepped = operators::step(&current, decrement)?;
        self.store(&place, stepped.clone(), frame)?;
        Ok(if postfix { current } else { stepped })
    }

    fn place_tree(&self, target: &Operation, frame: &Frame) -> Result<PlaceTree> {
        match &target.kind {
            OperationKind::Tuple { elements } => Ok(PlaceTree::Tuple(
                elements
                    .iter()
                    .map(|element| self.place_tree(element, frame))
                    .collect::<Result<Vec<_>>>()?,
            )),
            _ => Ok(PlaceTree::Leaf(self.place(target, frame)?)),
        }
    }

    fn store_tree(&self, tree: &PlaceTree, value: Value, frame: &Frame) -> Result<()> {
        match tree {
            PlaceTree::Leaf(place) => self.store(place, value, frame),
            PlaceTree::Tuple(places) => {
                let Value::Tuple(items) = value else {
                    state_bail!("cannot deconstruct a {} value", value.kind_name());
                };
                if items.len() != places.len() {
                    state_bail!(
                        "cannot deconstruct a tuple of {} element(s) into {} target(s)",
                        items.len(),
                        places.len()
                    );
                }
                for (place, item) in places.iter().zip(items.iter()) {
                    self.store_tree(place, item.clone(), frame)?;
                }
                Ok(())
            }
        }
    }

    pub(super) fn deconstruct(&self, target: &Operation, value: &Operation, frame: &Frame) -> Result<Value> {
        let places = self.place_tree(target, frame)?;
        let value = self.evaluate(value, frame)?;
        self.store_tree(&places, value.clone(), frame)?;
        Ok(value)
    }

    /// Call a resolved method with already-evaluated arguments.
    pub(crate) fn call(
        &self,
        method: &MethodInfo,
        receiver: Value,
        arguments: Vec<Value>,
        is_virtual: bool,
        frame: &Frame,
    ) -> Result<Value> {
        if let (Value::Delegate(target), "Invoke") = (&receiver, method.name.as_str()) {
            return target.invoke(self.loader(), arguments);
        }
        let (handle, type_arguments) = self.metadata().resolve_method(method, frame.env())?;
        self.loader()
            .invoke(&handle, receiver, &type_arguments, arguments, is_virtual)
    }

    pub(super) fn invocation(
        &self,
        method: &MemberRef,
        instance: Option<&Operation>,
        arguments: &[Operation],
        is_virtual: bool,
        frame: &Frame,
    ) -> Result<Value> {
        let method = self.metadata().method_ref(method, &GenericContext::Root)?;
        let receiver = self.receiver(instance, frame)?;
        let arguments = self.evaluate_all(arguments, frame)?;
        if method.is_constructor() {
            let (handle, _) = self.metadata().resolve_method(&method, frame.env())?;
            self.chain_constructor(handle, &receiver, arguments, frame)?;
            return Ok(Value::Void);
        }
        self.call(&method, receiver, arguments, is_virtual, frame)
    }

    /// `base(...)`/`this(...)` from a constructor. When the instance actually derives from
    /// a proxy standing in for the targeted base, the proxy constructor with the same
    /// parameter list receives every argument.
    fn chain_constructor(&self, target: MethodHandle, this: &Value, arguments: Vec<Value>, frame: &Frame) -> Result<()> {
        let loader = self.loader();
        let proxy = match frame.declaring_type() {
            Some(declaring) => loader
                .base_type(declaring)?
                .filter(|base| {
                    base.has_attribute(PROXY_OF_ATTRIBUTE)
                        && base.generic_definition() != target.owner.generic_definition()
                        && declaring.generic_definition() != target.owner.generic_definition()
                }),
            None => None,
        };
        let Some(proxy) = proxy else {
            return loader.invoke_constructor(&target, this, arguments);
        };
        let forwarded = proxy
            .members()?
            .constructors
            .iter()
            .find(|candidate| {
                candidate.kind == MethodKind::Constructor
                    && candidate.parameters.len() == target.method.parameters.len()
                    && candidate
                        .parameters
                        .iter()
                        .zip(&target.method.parameters)
                        .all(|(a, b)| a.ty.signature_matches(&b.ty))
            })
            .cloned()
            .ok_or_else(|| {
                Error::resolution(format!(
                    "proxy {} has no constructor matching {}.{}",
                    proxy, target.owner, target.method.name
                ))
            })?;
        let handle = MethodHandle {
            owner: proxy,
            method: forwarded,
        };
        loader.invoke_constructor(&handle, this, arguments)
    }

    pub(super) fn create_object(&self, constructor: &MemberRef, arguments: &[Operation], frame: &Frame) -> Result<Value> {
        let constructor = self.metadata().method_ref(constructor, &GenericContext::Root)?;
        let arguments = self.evaluate_all(arguments, frame)?;
        let (handle, _) = self.metadata().resolve_method(&constructor, frame.env())?;
        self.loader().construct(&handle.owner, Some(&handle), arguments)
    }

    fn initializer_receiver(&self, is_static: bool, frame: &Frame) -> Result<Value> {
        if is_static {
            Ok(Value::Null)
        } else {
            frame.this()
        }
    }

    pub(super) fn initialize_fields(&self, fields: &[MemberRef], value: &Operation, frame: &Frame) -> Result<()> {
        let value = self.evaluate(value, frame)?;
        for field in fields {
            let field = self.metadata().field_ref(field, &GenericContext::Root)?;
            let receiver = self.initializer_receiver(field.is_static, frame)?;
            let handle = self.metadata().resolve_field(&field, frame.env())?;
            self.loader().set_field(&handle, &receiver, value.clone())?;
        }
        Ok(())
    }

    pub(super) fn initialize_properties(&self, properties: &[MemberRef], value: &Operation, frame: &Frame) -> Result<()> {
        let value = self.evaluate(value, frame)?;
        for property in properties {
            let property = self.metadata().property_ref(property, &GenericContext::Root)?;
            let receiver = self.initializer_receiver(property.is_static, frame)?;
            // get-only auto-properties have no setter to go through
            match self.metadata().backing_field(&property)? {
                Some(field) => {
                    let handle = self.metadata().resolve_field(&field, frame.env())?;
                    self.loader().set_field(&handle, &receiver, value.clone())?;
                }
                None => {
                    self.write_property(&property, &receiver, Vec::new(), value.clone(), frame)?;
                }
            }
        }
        Ok(())
    }
}
