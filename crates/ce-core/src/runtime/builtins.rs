//! Builtin host types with native member bodies.
//!
//! Installed in two passes like any other host type: every type is declared first so
//! signatures can refer to each other, then each is finished with its members.

use super::host::{TypeRegistry, PLAIN_PROXY, PROXY_MARKER, PROXY_NAMESPACE};
use super::loader::{TypeDeclaration, TypeLoader};
use super::object::{NativeData, Object};
use super::types::{
    MethodHandle, NativeCall, PrimitiveKind, RtBody, RtField, RtMethod, RtParameter, RtProperty, RtType,
    RtTypeKind, TypeMembers,
};
use super::expression::CompiledExpression;
use super::value::{null_reference, Value};
use crate::config::MAX_DELEGATE_PARAMETERS;
use crate::error::{Error, Result};
use crate::symbols::MethodKind;
use std::sync::Arc;

const MAX_TUPLE_ARITY: usize = 7;
const COLLECTIONS: &str = "System.Collections.Generic";
const EXPRESSIONS: &str = "System.Linq.Expressions";

#[derive(Debug, Clone)]
pub struct Builtins {
    pub object: RtType,
    pub value_type: RtType,
    pub void: RtType,
    pub boolean: RtType,
    pub char: RtType,
    pub sbyte: RtType,
    pub byte: RtType,
    pub int16: RtType,
    pub uint16: RtType,
    pub int32: RtType,
    pub uint32: RtType,
    pub int64: RtType,
    pub uint64: RtType,
    pub single: RtType,
    pub double: RtType,
    pub string: RtType,
    pub type_: RtType,
    pub array: RtType,
    pub exception: RtType,
    pub delegate: RtType,
    pub ienumerable: RtType,
    pub ienumerator: RtType,
    pub list: RtType,
    pub list_enumerator: RtType,
    /// `ValueTuple` definitions; index 0 has arity 1.
    pub tuples: Vec<RtType>,
    /// `Func` definitions indexed by parameter count.
    pub funcs: Vec<RtType>,
    /// `Action` definitions indexed by parameter count.
    pub actions: Vec<RtType>,
    pub expression: RtType,
    pub iproxy: RtType,
    pub object_proxy: RtType,
}

impl Builtins {
    pub fn tuple(&self, arity: usize) -> Result<&RtType> {
        arity
            .checked_sub(1)
            .and_then(|index| self.tuples.get(index))
            .ok_or_else(|| Error::not_supported(format!("tuples of arity {}", arity)))
    }

    pub fn func(&self, parameters: usize) -> Result<&RtType> {
        self.funcs.get(parameters).ok_or_else(|| {
            Error::not_supported(format!("delegates with {} parameters", parameters))
        })
    }

    pub fn action(&self, parameters: usize) -> Result<&RtType> {
        self.actions.get(parameters).ok_or_else(|| {
            Error::not_supported(format!("delegates with {} parameters", parameters))
        })
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> &RtType {
        match kind {
            PrimitiveKind::Boolean => &self.boolean,
            PrimitiveKind::Char => &self.char,
            PrimitiveKind::SByte => &self.sbyte,
            PrimitiveKind::Byte => &self.byte,
            PrimitiveKind::Int16 => &self.int16,
            PrimitiveKind::UInt16 => &self.uint16,
            PrimitiveKind::Int32 => &self.int32,
            PrimitiveKind::UInt32 => &self.uint32,
            PrimitiveKind::Int64 => &self.int64,
            PrimitiveKind::UInt64 => &self.uint64,
            PrimitiveKind::Single => &self.single,
            PrimitiveKind::Double => &self.double,
            PrimitiveKind::String => &self.string,
        }
    }
}

fn thrown(exception: &str, message: impl AsRef<str>) -> Error {
    Error::Thrown(format!("System.{}: {}", exception, message.as_ref()))
}

fn parameter(ty: &RtType, position: usize) -> Result<RtType> {
    ty.generic_parameters
        .get(position)
        .cloned()
        .ok_or_else(|| Error::state(format!("{} has no generic parameter {}", ty, position)))
}

fn native_constructor(
    parameters: Vec<RtParameter>,
    body: impl Fn(&NativeCall<'_>) -> Result<Value> + Send + Sync + 'static,
) -> RtMethod {
    RtMethod::constructor(parameters, RtBody::Native(Arc::new(body)))
}

fn generic_names(count: usize, single: &str) -> Vec<String> {
    match count {
        0 => Vec::new(),
        1 => vec![single.to_string()],
        _ => (1..=count).map(|i| format!("T{}", i)).collect(),
    }
}

fn list_items(call: &NativeCall<'_>) -> Result<Vec<Value>> {
    call.this_object()?.with_native(|native| match native {
        NativeData::List(items) => Ok(items.clone()),
        _ => Err(Error::state("list storage is not initialized")),
    })?
}

fn with_list<R>(call: &NativeCall<'_>, f: impl FnOnce(&mut Vec<Value>) -> Result<R>) -> Result<R> {
    call.this_object()?.with_native(|native| match native {
        NativeData::List(items) => f(items),
        _ => Err(Error::state("list storage is not initialized")),
    })?
}

fn list_index(items: &[Value], index: i64) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < items.len())
        .ok_or_else(|| {
            thrown(
                "ArgumentOutOfRangeException",
                "Index was out of range. Must be non-negative and less than the size of the collection.",
            )
        })
}

fn exception_message(call: &NativeCall<'_>) -> Result<String> {
    let obj = call.this_object()?;
    let message = obj.with_native(|native| match native {
        NativeData::Exception { message } => Some(message.clone()),
        _ => None,
    })?;
    Ok(message.unwrap_or_else(|| format!("Exception of type '{}' was thrown.", obj.ty())))
}

fn invoke_delegate(call: &NativeCall<'_>) -> Result<Value> {
    match call.this {
        Value::Delegate(target) => target.invoke(call.loader, call.arguments.to_vec()),
        Value::Null => Err(null_reference()),
        other => Err(Error::state(format!(
            "cannot invoke a {} value as a delegate",
            other.kind_name()
        ))),
    }
}

/// One pass over an enumerable value. Arrays, strings and lists are read from a
/// snapshot; anything else is pulled through `GetEnumerator`/`MoveNext`/`Current`,
/// one item per step.
pub enum Enumeration<'a> {
    Items(std::vec::IntoIter<Value>),
    Enumerator {
        loader: &'a dyn TypeLoader,
        enumerator: Value,
        move_next: MethodHandle,
        current: MethodHandle,
    },
}

impl<'a> Enumeration<'a> {
    pub fn new(loader: &'a dyn TypeLoader, source: &Value) -> Result<Self> {
        let items = match source {
            Value::Null => return Err(null_reference()),
            Value::Array(array) => array.snapshot()?,
            Value::String(text) => text.chars().map(Value::Char).collect(),
            Value::Object(obj) => {
                let listed = obj.with_native(|native| match native {
                    NativeData::List(items) => Some(items.clone()),
                    _ => None,
                })?;
                match listed {
                    Some(items) => items,
                    None => return Self::through_enumerator(loader, source),
                }
            }
            other => {
                return Err(Error::not_supported(format!(
                    "enumerating a {} value",
                    other.kind_name()
                )))
            }
        };
        Ok(Enumeration::Items(items.into_iter()))
    }

    fn through_enumerator(loader: &'a dyn TypeLoader, source: &Value) -> Result<Self> {
        let ty = loader.type_of(source)?;
        let get_enumerator = loader
            .find_method(&ty, "GetEnumerator", 0)?
            .ok_or_else(|| Error::resolution(format!("{} is not enumerable", ty)))?;
        let enumerator = loader.invoke(&get_enumerator, source.clone(), &[], Vec::new(), true)?;
        let enumerator_type = loader.type_of(&enumerator)?;
        let move_next = loader
            .find_method(&enumerator_type, "MoveNext", 0)?
            .ok_or_else(|| Error::resolution(format!("{} has no MoveNext", enumerator_type)))?;
        let current = loader
            .find_method(&enumerator_type, "get_Current", 0)?
            .ok_or_else(|| Error::resolution(format!("{} has no Current", enumerator_type)))?;
        Ok(Enumeration::Enumerator {
            loader,
            enumerator,
            move_next,
            current,
        })
    }
}

impl Iterator for Enumeration<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Enumeration::Items(items) => items.next().map(Ok),
            Enumeration::Enumerator {
                loader,
                enumerator,
                move_next,
                current,
            } => {
                let advanced = loader
                    .invoke(move_next, enumerator.clone(), &[], Vec::new(), true)
                    .and_then(|moved| moved.as_bool());
                match advanced {
                    Ok(true) => Some(loader.invoke(current, enumerator.clone(), &[], Vec::new(), true)),
                    Ok(false) => None,
                    Err(err) => Some(Err(err)),
                }
            }
        }
    }
}

/// All items of an enumerable value.
pub fn enumerate(loader: &dyn TypeLoader, source: &Value) -> Result<Vec<Value>> {
    Enumeration::new(loader, source)?.collect()
}

pub(crate) fn install(registry: &TypeRegistry) -> Result<Builtins> {
    let system = |name: &str, kind: RtTypeKind| registry.declare(TypeDeclaration::new("System", name, kind));
    let primitive = |kind: PrimitiveKind| {
        registry.declare(
            TypeDeclaration::new("System", kind.metadata_name(), RtTypeKind::Primitive(kind))
                .with_sealed(true),
        )
    };

    let object = system("Object", RtTypeKind::Class)?;
    let value_type = registry.declare(TypeDeclaration::class("System", "ValueType").with_abstract(true))?;
    let void = system("Void", RtTypeKind::Void)?;
    let boolean = primitive(PrimitiveKind::Boolean)?;
    let char = primitive(PrimitiveKind::Char)?;
    let sbyte = primitive(PrimitiveKind::SByte)?;
    let byte = primitive(PrimitiveKind::Byte)?;
    let int16 = primitive(PrimitiveKind::Int16)?;
    let uint16 = primitive(PrimitiveKind::UInt16)?;
    let int32 = primitive(PrimitiveKind::Int32)?;
    let uint32 = primitive(PrimitiveKind::UInt32)?;
    let int64 = primitive(PrimitiveKind::Int64)?;
    let uint64 = primitive(PrimitiveKind::UInt64)?;
    let single = primitive(PrimitiveKind::Single)?;
    let double = primitive(PrimitiveKind::Double)?;
    let string = primitive(PrimitiveKind::String)?;
    let type_ = registry.declare(TypeDeclaration::class("System", "Type").with_abstract(true))?;
    let array = registry.declare(TypeDeclaration::class("System", "Array").with_abstract(true))?;
    let exception = system("Exception", RtTypeKind::Class)?;
    let delegate = registry.declare(TypeDeclaration::class("System", "Delegate").with_abstract(true))?;
    let attribute = registry.declare(TypeDeclaration::class("System", "Attribute").with_abstract(true))?;

    let ienumerable = registry.declare(TypeDeclaration::interface(COLLECTIONS, "IEnumerable").with_generic_parameters(&["T"]))?;
    let ienumerator = registry.declare(TypeDeclaration::interface(COLLECTIONS, "IEnumerator").with_generic_parameters(&["T"]))?;
    let list = registry.declare(TypeDeclaration::class(COLLECTIONS, "List").with_generic_parameters(&["T"]))?;
    let list_enumerator = registry.declare(
        TypeDeclaration::class(COLLECTIONS, "Enumerator")
            .with_generic_parameters(&["T"])
            .with_sealed(true),
    )?;

    let tuples = (1..=MAX_TUPLE_ARITY)
        .map(|arity| {
            registry.declare(
                TypeDeclaration::new("System", "ValueTuple", RtTypeKind::Struct)
                    .with_generic_parameters(&generic_names(arity.max(2), "T")[..arity])
                    .with_sealed(true),
            )
        })
        .collect::<Result<Vec<_>>>()?;
    let funcs = (0..=MAX_DELEGATE_PARAMETERS)
        .map(|count| {
            let mut names = generic_names(count, "T");
            names.push("TResult".to_string());
            registry.declare(
                TypeDeclaration::class("System", "Func")
                    .with_generic_parameters(&names[..])
                    .with_sealed(true),
            )
        })
        .collect::<Result<Vec<_>>>()?;
    let actions = (0..=MAX_DELEGATE_PARAMETERS)
        .map(|count| {
            registry.declare(
                TypeDeclaration::class("System", "Action")
                    .with_generic_parameters(&generic_names(count, "T")[..])
                    .with_sealed(true),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let expression = registry.declare(
        TypeDeclaration::class(EXPRESSIONS, "Expression")
            .with_generic_parameters(&["TDelegate"])
            .with_sealed(true),
    )?;
    let iproxy = registry.declare(TypeDeclaration::interface(PROXY_NAMESPACE, PROXY_MARKER).in_assembly(PROXY_NAMESPACE))?;
    let object_proxy = registry.declare(TypeDeclaration::class(PROXY_NAMESPACE, PLAIN_PROXY).in_assembly(PROXY_NAMESPACE))?;
    let proxy_of = registry.declare(
        TypeDeclaration::class(PROXY_NAMESPACE, "ProxyOfAttribute")
            .in_assembly(PROXY_NAMESPACE)
            .with_sealed(true),
    )?;

    // System.Object
    let mut members = TypeMembers::default();
    members.constructor(native_constructor(Vec::new(), |_| Ok(Value::Void)));
    members.method(
        RtMethod::native("ToString", Vec::new(), Some(&string), |call| {
            Ok(Value::string(call.this.to_string()))
        })
        .with_virtual(true),
    );
    members.method(
        RtMethod::native(
            "Equals",
            vec![RtParameter::new("obj", &object)],
            Some(&boolean),
            |call| Ok(Value::Bool(call.this == call.arg(0)?)),
        )
        .with_virtual(true),
    );
    members.method(RtMethod::native("GetType", Vec::new(), Some(&type_), |call| {
        Ok(Value::Type(call.loader.type_of(call.this)?))
    }));
    registry.finish(&object, members)?;

    registry.finish(&value_type, TypeMembers::with_base(&object))?;
    registry.finish(&void, TypeMembers::default())?;
    for ty in [
        &boolean, &char, &sbyte, &byte, &int16, &uint16, &int32, &uint32, &int64, &uint64, &single, &double,
    ] {
        registry.finish(ty, TypeMembers::with_base(&value_type))?;
    }

    // System.String
    let mut members = TypeMembers::with_base(&object);
    members.getter("Length", &int32, |call| {
        Ok(Value::Int32(call.this.as_str()?.chars().count() as i32))
    });
    members.method(RtMethod::native("ToUpper", Vec::new(), Some(&string), |call| {
        Ok(Value::string(call.this.as_str()?.to_uppercase()))
    }));
    members.method(RtMethod::native("ToLower", Vec::new(), Some(&string), |call| {
        Ok(Value::string(call.this.as_str()?.to_lowercase()))
    }));
    members.method(RtMethod::native(
        "Substring",
        vec![RtParameter::new("startIndex", &int32)],
        Some(&string),
        |call| {
            let text = call.this.as_str()?;
            let start = call.arg(0)?.as_i64()?;
            let count = text.chars().count() as i64;
            if start < 0 || start > count {
                return Err(thrown("ArgumentOutOfRangeException", "startIndex cannot be larger than length of string."));
            }
            Ok(Value::string(text.chars().skip(start as usize).collect::<String>()))
        },
    ));
    members.method(RtMethod::native(
        "Substring",
        vec![RtParameter::new("startIndex", &int32), RtParameter::new("length", &int32)],
        Some(&string),
        |call| {
            let text = call.this.as_str()?;
            let start = call.arg(0)?.as_i64()?;
            let length = call.arg(1)?.as_i64()?;
            let count = text.chars().count() as i64;
            if start < 0 || length < 0 || start + length > count {
                return Err(thrown("ArgumentOutOfRangeException", "Index and length must refer to a location within the string."));
            }
            Ok(Value::string(
                text.chars().skip(start as usize).take(length as usize).collect::<String>(),
            ))
        },
    ));
    members.method(RtMethod::native(
        "Contains",
        vec![RtParameter::new("value", &string)],
        Some(&boolean),
        |call| match call.arg(0)? {
            Value::Null => Err(thrown("ArgumentNullException", "Value cannot be null. (Parameter 'value')")),
            value => Ok(Value::Bool(call.this.as_str()?.contains(value.as_str()?))),
        },
    ));
    members.method(
        RtMethod::native(
            "Concat",
            vec![RtParameter::new("str0", &string), RtParameter::new("str1", &string)],
            Some(&string),
            |call| Ok(Value::string(format!("{}{}", call.arg(0)?, call.arg(1)?))),
        )
        .with_static(true),
    );
    members.method(
        RtMethod::native(
            "IsNullOrEmpty",
            vec![RtParameter::new("value", &string)],
            Some(&boolean),
            |call| {
                Ok(Value::Bool(match call.arg(0)? {
                    Value::Null => true,
                    value => value.as_str()?.is_empty(),
                }))
            },
        )
        .with_static(true),
    );
    registry.finish(&string, members)?;

    // System.Type
    let mut members = TypeMembers::with_base(&object);
    let described = |call: &NativeCall<'_>| match call.this {
        Value::Type(ty) => Ok(ty.clone()),
        other => Err(Error::state(format!("expected a type, got {}", other.kind_name()))),
    };
    members.getter("Name", &string, move |call| Ok(Value::string(&described(call)?.name)));
    members.getter("FullName", &string, move |call| Ok(Value::string(described(call)?.full_name())));
    members.getter("Namespace", &string, move |call| Ok(Value::string(&described(call)?.namespace)));
    registry.finish(&type_, members)?;

    // System.Array
    let mut members = TypeMembers::with_base(&object);
    members.getter("Length", &int32, |call| match call.this {
        Value::Array(array) => Ok(Value::Int32(array.len()? as i32)),
        other => Err(Error::state(format!("expected an array, got {}", other.kind_name()))),
    });
    registry.finish(&array, members)?;

    // System.Exception
    let mut members = TypeMembers::with_base(&object);
    members.constructor(native_constructor(Vec::new(), |_| Ok(Value::Void)));
    members.constructor(native_constructor(
        vec![RtParameter::new("message", &string)],
        |call| {
            let message = call.arg(0)?.to_string();
            call.this_object()?
                .with_native(|native| *native = NativeData::Exception { message })?;
            Ok(Value::Void)
        },
    ));
    members.getter("Message", &string, |call| Ok(Value::string(exception_message(call)?)));
    members.method(
        RtMethod::native("ToString", Vec::new(), Some(&string), |call| {
            let message = exception_message(call)?;
            Ok(Value::string(format!("{}: {}", call.this_object()?.ty(), message)))
        })
        .with_virtual(true),
    );
    registry.finish(&exception, members)?;

    registry.finish(&delegate, TypeMembers::with_base(&object))?;
    let mut members = TypeMembers::with_base(&object);
    members.constructor(native_constructor(Vec::new(), |_| Ok(Value::Void)));
    registry.finish(&attribute, members)?;

    // IEnumerable<T> / IEnumerator<T>
    let element = parameter(&ienumerable, 0)?;
    let enumerator_of_element = registry.make_generic(&ienumerator, vec![element])?;
    let mut members = TypeMembers::default();
    members.method(RtMethod::abstract_method("GetEnumerator", Vec::new(), Some(&enumerator_of_element)));
    registry.finish(&ienumerable, members)?;

    let element = parameter(&ienumerator, 0)?;
    let mut members = TypeMembers::default();
    members.method(RtMethod::abstract_method("MoveNext", Vec::new(), Some(&boolean)));
    let current = members.method(
        RtMethod::abstract_method("get_Current", Vec::new(), Some(&element)).with_kind(MethodKind::PropertyGet),
    );
    members.property(RtProperty {
        name: "Current".to_string(),
        ty: element,
        is_static: false,
        parameters: Vec::new(),
        getter: Some(current),
        setter: None,
    });
    registry.finish(&ienumerator, members)?;

    // List<T>
    let element = parameter(&list, 0)?;
    let enumerable_of_element = registry.make_generic(&ienumerable, vec![element.clone()])?;
    let enumerator_of_element = registry.make_generic(&ienumerator, vec![element.clone()])?;
    let mut members = TypeMembers::default();
    members.interface(&enumerable_of_element);
    members.constructor(native_constructor(Vec::new(), |call| {
        call.this_object()?
            .with_native(|native| *native = NativeData::List(Vec::new()))?;
        Ok(Value::Void)
    }));
    members.constructor(native_constructor(
        vec![RtParameter::new("collection", &enumerable_of_element)],
        |call| {
            let items = enumerate(call.loader, call.arg(0)?)?;
            call.this_object()?
                .with_native(|native| *native = NativeData::List(items))?;
            Ok(Value::Void)
        },
    ));
    members.method(RtMethod::native(
        "Add",
        vec![RtParameter::new("item", &element)],
        None,
        |call| {
            let item = call.arg(0)?.clone();
            with_list(call, |items| {
                items.push(item);
                Ok(Value::Void)
            })
        },
    ));
    members.method(RtMethod::native("Clear", Vec::new(), None, |call| {
        with_list(call, |items| {
            items.clear();
            Ok(Value::Void)
        })
    }));
    members.method(RtMethod::native(
        "Contains",
        vec![RtParameter::new("item", &element)],
        Some(&boolean),
        |call| {
            let item = call.arg(0)?;
            Ok(Value::Bool(list_items(call)?.contains(item)))
        },
    ));
    members.getter("Count", &int32, |call| Ok(Value::Int32(list_items(call)?.len() as i32)));
    let get_item = members.method(
        RtMethod::native(
            "get_Item",
            vec![RtParameter::new("index", &int32)],
            Some(&element),
            |call| {
                let index = call.arg(0)?.as_i64()?;
                with_list(call, |items| Ok(items[list_index(items, index)?].clone()))
            },
        )
        .with_kind(MethodKind::PropertyGet),
    );
    let set_item = members.method(
        RtMethod::native(
            "set_Item",
            vec![RtParameter::new("index", &int32), RtParameter::new("value", &element)],
            None,
            |call| {
                let index = call.arg(0)?.as_i64()?;
                let value = call.arg(1)?.clone();
                with_list(call, |items| {
                    let slot = list_index(items, index)?;
                    items[slot] = value;
                    Ok(Value::Void)
                })
            },
        )
        .with_kind(MethodKind::PropertySet),
    );
    members.property(RtProperty {
        name: "Item".to_string(),
        ty: element.clone(),
        is_static: false,
        parameters: vec![RtParameter::new("index", &int32)],
        getter: Some(get_item),
        setter: Some(set_item),
    });
    let enumerator_definition = list_enumerator.clone();
    members.method(
        RtMethod::native("GetEnumerator", Vec::new(), Some(&enumerator_of_element), move |call| {
            let items = list_items(call)?;
            let ty = call
                .loader
                .make_generic(&enumerator_definition, call.owner.generic_arguments().to_vec())?;
            let enumerator = Object::new(&ty);
            enumerator.with_native(|native| *native = NativeData::Enumerator { items, position: -1 })?;
            Ok(Value::Object(enumerator))
        })
        .with_virtual(true),
    );
    registry.finish(&list, members)?;

    // List<T>.Enumerator
    let element = parameter(&list_enumerator, 0)?;
    let enumerator_of_element = registry.make_generic(&ienumerator, vec![element.clone()])?;
    let mut members = TypeMembers::default();
    members.interface(&enumerator_of_element);
    members.method(
        RtMethod::native("MoveNext", Vec::new(), Some(&boolean), |call| {
            call.this_object()?.with_native(|native| match native {
                NativeData::Enumerator { items, position } => {
                    if (*position as i64) < items.len() as i64 {
                        *position += 1;
                    }
                    Ok(Value::Bool((*position as i64) < items.len() as i64))
                }
                _ => Err(Error::state("enumerator storage is not initialized")),
            })?
        })
        .with_virtual(true),
    );
    let current = members.method(
        RtMethod::native("get_Current", Vec::new(), Some(&element), |call| {
            call.this_object()?.with_native(|native| match native {
                NativeData::Enumerator { items, position } => usize::try_from(*position)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or_else(|| {
                        thrown("InvalidOperationException", "Enumeration has either not started or has already finished.")
                    }),
                _ => Err(Error::state("enumerator storage is not initialized")),
            })?
        })
        .with_kind(MethodKind::PropertyGet)
        .with_virtual(true),
    );
    members.property(RtProperty {
        name: "Current".to_string(),
        ty: element,
        is_static: false,
        parameters: Vec::new(),
        getter: Some(current),
        setter: None,
    });
    registry.finish(&list_enumerator, members)?;

    for tuple in &tuples {
        let mut members = TypeMembers::with_base(&value_type);
        for (position, item) in tuple.generic_parameters.iter().enumerate() {
            members.field(RtField::new(tuple, format!("Item{}", position + 1), item));
        }
        registry.finish(tuple, members)?;
    }

    for func in &funcs {
        let arity = func.generic_parameters.len();
        let parameters = func.generic_parameters[..arity - 1]
            .iter()
            .enumerate()
            .map(|(i, ty)| RtParameter::new(format!("arg{}", i + 1), ty))
            .collect();
        let result = parameter(func, arity - 1)?;
        let mut members = TypeMembers::with_base(&delegate);
        members.method(RtMethod::native("Invoke", parameters, Some(&result), invoke_delegate));
        registry.finish(func, members)?;
    }
    for action in &actions {
        let parameters = action
            .generic_parameters
            .iter()
            .enumerate()
            .map(|(i, ty)| RtParameter::new(format!("arg{}", i + 1), ty))
            .collect();
        let mut members = TypeMembers::with_base(&delegate);
        members.method(RtMethod::native("Invoke", parameters, None, |call| {
            invoke_delegate(call).map(|_| Value::Void)
        }));
        registry.finish(action, members)?;
    }

    // Expression<TDelegate>
    let delegate_parameter = parameter(&expression, 0)?;
    let mut members = TypeMembers::with_base(&object);
    members.method(RtMethod::native("Compile", Vec::new(), Some(&delegate_parameter), |call| {
        match call.this {
            Value::Expression(expr) => Ok(Value::Delegate(Arc::new(CompiledExpression::new(expr.clone())))),
            Value::Null => Err(null_reference()),
            other => Err(Error::state(format!("expected an expression, got {}", other.kind_name()))),
        }
    }));
    registry.finish(&expression, members)?;

    registry.finish(&iproxy, TypeMembers::default())?;
    let mut members = TypeMembers::with_base(&object);
    members.interface(&iproxy);
    members.constructor(native_constructor(Vec::new(), |_| Ok(Value::Void)));
    registry.finish(&object_proxy, members)?;

    let mut members = TypeMembers::with_base(&attribute);
    members.constructor(native_constructor(vec![RtParameter::new("proxee", &type_)], |_| Ok(Value::Void)));
    registry.finish(&proxy_of, members)?;

    Ok(Builtins {
        object,
        value_type,
        void,
        boolean,
        char,
        sbyte,
        byte,
        int16,
        uint16,
        int32,
        uint32,
        int64,
        uint64,
        single,
        double,
        string,
        type_,
        array,
        exception,
        delegate,
        ienumerable,
        ienumerator,
        list,
        list_enumerator,
        tuples,
        funcs,
        actions,
        expression,
        iproxy,
        object_proxy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{HostRuntime, MethodHandle, TypeDescriptor};
    use pretty_assertions::assert_eq;

    fn call(host: &HostRuntime, ty: &RtType, name: &str, this: Value, args: Vec<Value>) -> Value {
        let method = host.find_method(ty, name, args.len()).unwrap().unwrap();
        host.invoke(&method, this, &[], args, true).unwrap()
    }

    #[test]
    fn generic_definitions_use_metadata_names() {
        let host = HostRuntime::new().unwrap();
        let b = host.builtins();
        assert_eq!(b.list.name, "List`1");
        assert_eq!(b.func(2).unwrap().name, "Func`3");
        assert_eq!(b.action(0).unwrap().name, "Action");
        assert_eq!(b.tuple(2).unwrap().name, "ValueTuple`2");
        let loaded = host
            .load(&TypeDescriptor::new("System.Collections.Generic", "List", 1))
            .unwrap();
        assert_eq!(loaded, b.list);
    }

    #[test]
    fn list_members_work_on_constructed_lists() {
        let host = HostRuntime::new().unwrap();
        let b = host.builtins().clone();
        let list_of_int = host.make_generic(&b.list, vec![b.int32.clone()]).unwrap();
        let list = host.construct(&list_of_int, None, Vec::new()).unwrap();
        call(&host, &list_of_int, "Add", list.clone(), vec![Value::Int32(4)]);
        call(&host, &list_of_int, "Add", list.clone(), vec![Value::Int32(9)]);
        assert_eq!(call(&host, &list_of_int, "get_Count", list.clone(), vec![]), Value::Int32(2));
        assert_eq!(call(&host, &list_of_int, "get_Item", list.clone(), vec![Value::Int32(1)]), Value::Int32(9));
        assert_eq!(enumerate(&host, &list).unwrap(), vec![Value::Int32(4), Value::Int32(9)]);
    }

    #[test]
    fn list_copies_from_arrays() {
        let host = HostRuntime::new().unwrap();
        let b = host.builtins().clone();
        let list_of_int = host.make_generic(&b.list, vec![b.int32.clone()]).unwrap();
        let source = host
            .new_array(&b.int32, vec![Value::Int32(1), Value::Int32(2)])
            .unwrap();
        let list = host.construct(&list_of_int, None, vec![source]).unwrap();
        assert_eq!(call(&host, &list_of_int, "get_Count", list, vec![]), Value::Int32(2));
    }

    #[test]
    fn list_enumerator_is_reachable_through_the_interface() {
        let host = HostRuntime::new().unwrap();
        let b = host.builtins().clone();
        let list_of_string = host.make_generic(&b.list, vec![b.string.clone()]).unwrap();
        let list = host.construct(&list_of_string, None, Vec::new()).unwrap();
        call(&host, &list_of_string, "Add", list.clone(), vec![Value::from("a")]);
        let enumerable = host.make_generic(&b.ienumerable, vec![b.string.clone()]).unwrap();
        let get_enumerator = MethodHandle {
            owner: enumerable.clone(),
            method: b.ienumerable.methods_named("GetEnumerator", 0).unwrap()[0].clone(),
        };
        let enumerator = host
            .invoke(&get_enumerator, list, &[], Vec::new(), true)
            .unwrap();
        let enumerator_type = host.type_of(&enumerator).unwrap();
        assert_eq!(enumerator_type.generic_definition(), b.list_enumerator);
        assert!(host.is_assignable(&enumerable, &list_of_string).unwrap());
    }

    #[test]
    fn string_members() {
        let host = HostRuntime::new().unwrap();
        let string = host.builtins().string.clone();
        let text = Value::from("Hello");
        assert_eq!(call(&host, &string, "get_Length", text.clone(), vec![]), Value::Int32(5));
        assert_eq!(call(&host, &string, "ToUpper", text.clone(), vec![]), Value::from("HELLO"));
        assert_eq!(
            call(&host, &string, "Substring", text.clone(), vec![Value::Int32(1), Value::Int32(3)]),
            Value::from("ell")
        );
        let method = host.find_method(&string, "Substring", 1).unwrap().unwrap();
        let err = host
            .invoke(&method, text, &[], vec![Value::Int32(9)], true)
            .unwrap_err();
        assert!(err.to_string().contains("ArgumentOutOfRangeException"));
    }

    #[test]
    fn type_names_are_metadata_names() {
        let host = HostRuntime::new().unwrap();
        let b = host.builtins().clone();
        let name = call(&host, &b.type_, "get_Name", Value::Type(b.string.clone()), vec![]);
        assert_eq!(name, Value::from("String"));
        let full = call(&host, &b.type_, "get_FullName", Value::Type(b.char.clone()), vec![]);
        assert_eq!(full, Value::from("System.Char"));
    }

    #[test]
    fn exception_message_flows_into_to_string() {
        let host = HostRuntime::new().unwrap();
        let b = host.builtins().clone();
        let exception = host
            .construct(&b.exception, None, vec![Value::from("boom")])
            .unwrap();
        assert_eq!(
            call(&host, &b.object, "ToString", exception, vec![]),
            Value::from("System.Exception: boom")
        );
    }

    #[test]
    fn arrays_are_enumerable() {
        let host = HostRuntime::new().unwrap();
        let b = host.builtins().clone();
        let array = host.make_array(&b.int32, 1).unwrap();
        let enumerable = host.make_generic(&b.ienumerable, vec![b.int32.clone()]).unwrap();
        assert!(host.is_assignable(&enumerable, &array).unwrap());
    }
}
