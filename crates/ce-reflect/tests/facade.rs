use ce_core::error::ErrorKind;
use ce_core::runtime::{HostRuntime, TypeLoader};
use ce_core::semantic::CompilationBuilder;
use ce_core::symbols::{Accessibility, ParameterSymbol, SymbolId, TypeRef};
use ce_reflect::{BindingFlags, ContextKind, GenericEnv, Metadata, Shallow, Structural, TypeShape};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

struct Fixture {
    host: Arc<HostRuntime>,
    metadata: Metadata,
    boxed: SymbolId,
    int_box: SymbolId,
    util: SymbolId,
}

/// `Box<T> { public T Value; T Get(); int Count { get; set; } }`, `IntBox : Box<int>` and
/// `static class Util { static U Echo<U>(U x); }`.
fn fixture() -> Fixture {
    let host = Arc::new(HostRuntime::new().unwrap());
    let mut builder = CompilationBuilder::referencing(&host).unwrap();
    let int = builder.system("Int32").unwrap();

    let boxed = builder.add_class("Demo", "Box");
    let t = builder.add_type_parameter(boxed, "T").unwrap();
    let value = builder.add_field(boxed, "Value", TypeRef::parameter(t)).unwrap();
    builder
        .update_field(value, |f| f.accessibility = Accessibility::Public)
        .unwrap();
    builder
        .add_method(boxed, "Get", Vec::new(), Some(TypeRef::parameter(t)))
        .unwrap();
    builder.add_auto_property(boxed, "Count", int.clone(), true).unwrap();

    let int_box = builder.add_class("Demo", "IntBox");
    builder
        .set_base(int_box, TypeRef::generic(boxed, vec![int]))
        .unwrap();

    let util = builder.add_class("Demo", "Util");
    let echo = builder.add_method(util, "Echo", Vec::new(), None).unwrap();
    let u = builder.add_type_parameter(echo, "U").unwrap();
    builder
        .update_method(echo, |m| {
            m.is_static = true;
            m.parameters = vec![ParameterSymbol::new("x", TypeRef::parameter(u))];
            m.return_type = Some(TypeRef::parameter(u));
        })
        .unwrap();

    let compilation = builder.build().unwrap();
    let metadata = Metadata::new(Arc::new(compilation), host.clone());
    Fixture {
        host,
        metadata,
        boxed,
        int_box,
        util,
    }
}

#[test]
fn inherited_members_are_observed_through_the_constructed_base() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let int = metadata.system_type("Int32").unwrap();
    let int_box = metadata.type_of_symbol(fx.int_box).unwrap();

    let field = metadata.field(&int_box, "Value").unwrap();
    assert_eq!(field.field_type(), &int);
    assert_eq!(field.reflected, int_box);

    let declaring = metadata.get_declaring_type(field.member()).unwrap();
    assert!(declaring.is_constructed());
    assert_eq!(Some(declaring), metadata.base_type(&int_box).unwrap());

    let get = metadata.method(&int_box, "Get", 0).unwrap();
    assert_eq!(get.return_type(), Some(&int));
}

#[test]
fn definitions_keep_their_own_parameters() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let boxed = metadata.type_of_symbol(fx.boxed).unwrap();
    assert!(boxed.is_generic_type_definition());

    let get = metadata.method(&boxed, "Get", 0).unwrap();
    let returned = get.return_type().unwrap();
    assert!(returned.is_generic_parameter());
    assert_eq!(returned, &boxed.generic_arguments()[0]);
}

#[test]
fn constructed_types_compare_structurally() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let int = metadata.system_type("Int32").unwrap();
    let string = metadata.system_type("String").unwrap();
    let list = metadata
        .find_type("System.Collections.Generic", "List", 1)
        .unwrap();

    let of_int = metadata.make_generic_type(&list, vec![int.clone()]).unwrap();
    let again = metadata.make_generic_type(&list, vec![int.clone()]).unwrap();
    let of_string = metadata.make_generic_type(&list, vec![string]).unwrap();
    assert_eq!(of_int, again);
    assert_ne!(of_int, of_string);
    assert_eq!(metadata.get_generic_type_definition(&of_int).unwrap(), list);

    let err = metadata.make_generic_type(&of_int, vec![int.clone()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    let err = metadata.make_generic_type(&list, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = metadata.get_generic_type_definition(&int).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test]
fn generic_methods_switch_between_definition_and_construction() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let int = metadata.system_type("Int32").unwrap();
    let util = metadata.type_of_symbol(fx.util).unwrap();

    let echo = metadata.method(&util, "Echo", 1).unwrap();
    assert!(echo.is_generic_method_definition());

    let closed = metadata.make_generic_method(&echo, vec![int.clone()]).unwrap();
    assert_eq!(closed.context.kind(), ContextKind::Method);
    assert_eq!(closed.return_type(), Some(&int));
    assert_eq!(closed.parameters[0].ty, int);
    assert!(!closed.is_generic_method_definition());

    assert_eq!(metadata.get_generic_method_definition(&closed).unwrap(), echo);

    let err = metadata.make_generic_method(&closed, vec![int.clone()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    let err = metadata.make_generic_method(&echo, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = metadata.get_base_definition(&closed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test]
fn shallow_equality_ignores_generic_arguments() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let boxed = metadata.type_of_symbol(fx.boxed).unwrap();
    let of_int = metadata
        .make_generic_type(&boxed, vec![metadata.system_type("Int32").unwrap()])
        .unwrap();
    let of_string = metadata
        .make_generic_type(&boxed, vec![metadata.system_type("String").unwrap()])
        .unwrap();

    let a = metadata.method(&of_int, "Get", 0).unwrap();
    let b = metadata.method(&of_string, "Get", 0).unwrap();
    assert!(!a.deep_eq(&b));
    assert!(a.shallow_eq(&b));

    let left: HashSet<Shallow<_>> = metadata
        .methods(&of_int, BindingFlags::DEFAULT | BindingFlags::DECLARED_ONLY)
        .unwrap()
        .into_iter()
        .map(Shallow)
        .collect();
    let right: HashSet<Shallow<_>> = metadata
        .methods(&of_string, BindingFlags::DEFAULT | BindingFlags::DECLARED_ONLY)
        .unwrap()
        .into_iter()
        .map(Shallow)
        .collect();
    assert_eq!(left.len(), 3);
    assert!(left == right);
}

#[test]
fn auto_properties_expose_accessors_and_backing_field() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let boxed = metadata.type_of_symbol(fx.boxed).unwrap();
    let count = metadata.property(&boxed, "Count").unwrap();
    assert!(count.is_auto_property());

    let getter = metadata.getter(&count).unwrap().unwrap();
    assert_eq!(getter.name, "get_Count");
    assert_eq!(getter.associated(), Some(count.symbol));
    let setter = metadata.setter(&count).unwrap().unwrap();
    assert_eq!(setter.parameters.len(), 1);

    let field = metadata.backing_field(&count).unwrap().unwrap();
    assert_eq!(field.name, "<Count>k__BackingField");
    assert!(!field.is_readonly());
    assert_eq!(field.associated(), Some(count.symbol));

    let public_fields = metadata
        .fields(&boxed, BindingFlags::INSTANCE | BindingFlags::PUBLIC)
        .unwrap();
    assert_eq!(public_fields.len(), 1);
    assert_eq!(public_fields[0].name, "Value");
}

#[test]
fn field_like_events_expose_their_accessors() {
    let host = Arc::new(HostRuntime::new().unwrap());
    let mut builder = CompilationBuilder::referencing(&host).unwrap();
    let object = builder.system("Object").unwrap();
    let button = builder.add_class("Demo", "Button");
    builder.add_event(button, "Clicked", object).unwrap();
    let metadata = Metadata::new(Arc::new(builder.build().unwrap()), host);

    let ty = metadata.type_of_symbol(button).unwrap();
    let events = metadata.events(&ty, BindingFlags::ALL).unwrap();
    assert_eq!(events.len(), 1);
    let clicked = &events[0];
    assert_eq!(clicked.name, "Clicked");
    assert_eq!(clicked.handler_type(), &metadata.system_type("Object").unwrap());

    let methods: HashSet<String> = metadata
        .methods(&ty, BindingFlags::ALL | BindingFlags::DECLARED_ONLY)
        .unwrap()
        .into_iter()
        .map(|m| m.name.clone())
        .collect();
    assert!(methods.contains("add_Clicked"));
    assert!(methods.contains("remove_Clicked"));
    assert!(clicked.add_symbol().is_some());
    assert_ne!(clicked.add_symbol(), clicked.remove_symbol());
}

#[test]
fn resolution_maps_facade_types_to_runtime_types() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let builtins = fx.host.builtins();
    let int = metadata.system_type("Int32").unwrap();
    assert_eq!(metadata.resolve_type(&int, None).unwrap(), builtins.int32);

    let list = metadata
        .find_type("System.Collections.Generic", "List", 1)
        .unwrap();
    let of_int = metadata.make_generic_type(&list, vec![int.clone()]).unwrap();
    let concrete = metadata.resolve_type(&of_int, None).unwrap();
    assert_eq!(concrete.generic_definition(), builtins.list);
    assert_eq!(concrete.type_arguments, vec![builtins.int32.clone()]);
    assert_eq!(metadata.type_from_runtime(&concrete).unwrap(), of_int);

    let add = metadata.method(&of_int, "Add", 1).unwrap();
    let (handle, type_arguments) = metadata.resolve_method(&add, None).unwrap();
    assert_eq!(handle.method.name, "Add");
    assert_eq!(handle.owner, concrete);
    assert!(type_arguments.is_empty());

    let array = fx.host.make_array(&builtins.string, 1).unwrap();
    let facade = metadata.type_from_runtime(&array).unwrap();
    assert!(matches!(facade.shape(), TypeShape::Array { rank: 1, .. }));
}

#[test]
fn generic_parameters_resolve_through_environments() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let boxed = metadata.type_of_symbol(fx.boxed).unwrap();
    let parameter = boxed.generic_arguments()[0].clone();
    let TypeShape::Parameter { symbol, .. } = parameter.shape() else {
        panic!("expected a generic parameter");
    };

    let err = metadata.resolve_type(&parameter, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.to_string().contains("cannot resolve generic parameter T"));

    let string = fx.host.builtins().string.clone();
    let env = GenericEnv::new().with(*symbol, string.clone());
    assert_eq!(metadata.resolve_type(&parameter, Some(&env)).unwrap(), string);

    let ambient = metadata
        .with_ambient(env, || metadata.resolve_type(&parameter, None))
        .unwrap();
    assert_eq!(ambient, string);
    assert!(metadata.resolve_type(&parameter, None).is_err());
}

#[test]
fn source_types_need_a_realizer() {
    let fx = fixture();
    let metadata = &fx.metadata;
    let int_box = metadata.type_of_symbol(fx.int_box).unwrap();
    let err = metadata.resolve_type(&int_box, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}
