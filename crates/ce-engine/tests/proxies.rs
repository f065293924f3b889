use ce_core::error::{ErrorKind, Result};
use ce_core::ops::Operation;
use ce_core::runtime::{
    HostRuntime, NativeCall, RtAttribute, RtBody, RtMethod, RtParameter, RtType, TypeDeclaration, TypeLoader,
    Value, PROXY_OF_ATTRIBUTE,
};
use ce_core::semantic::CompilationBuilder;
use ce_core::symbols::{ParameterSymbol, SymbolId};
use ce_core::EngineOptions;
use ce_engine::Engine;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

struct Host {
    runtime: Arc<HostRuntime>,
    widget_proxy: RtType,
    gizmo_proxy: RtType,
    shelf_proxy: RtType,
    unmarked: RtType,
    misplaced: RtType,
    overreaching: RtType,
    markerless: RtType,
    forwarded: Arc<AtomicI32>,
}

struct Fixture {
    host: Host,
    engine: Engine,
    plain: SymbolId,
    gadget: SymbolId,
    trinket: SymbolId,
    both: SymbolId,
    books: SymbolId,
}

fn constructor(parameters: Vec<RtParameter>, body: impl Fn(&NativeCall<'_>) -> Result<Value> + Send + Sync + 'static) -> RtMethod {
    RtMethod::constructor(parameters, RtBody::Native(Arc::new(body)))
}

fn proxy_of(proxee: &RtType) -> RtAttribute {
    RtAttribute::new(PROXY_OF_ATTRIBUTE, vec![proxee.clone()])
}

/// `Widget(int)` with `WidgetProxy`, `IGizmo` with `GizmoProxy`, `Shelf<T>` with
/// `ShelfProxy<T>`, plus malformed proxies: `Unmarked` has no annotation, `Misplaced`
/// does not derive from `Widget`, `Overreaching` also implements `IGizmo` and
/// `Markerless` lacks `IProxy`.
fn host() -> Host {
    let runtime = Arc::new(HostRuntime::new().unwrap());
    let builtins = runtime.builtins().clone();
    let int = builtins.int32.clone();
    let forwarded = Arc::new(AtomicI32::new(0));

    let widget = runtime
        .define_native(TypeDeclaration::class("Demo", "Widget"), |_, members| {
            members.base = Some(builtins.object.clone());
            members.constructor(constructor(vec![RtParameter::new("size", &int)], |_| Ok(Value::Void)));
            Ok(())
        })
        .unwrap();
    let seen = forwarded.clone();
    let widget_proxy = runtime
        .define_native(
            TypeDeclaration::class("Demo", "WidgetProxy").with_attribute(proxy_of(&widget)),
            |_, members| {
                members.base = Some(widget.clone());
                members.interface(&builtins.iproxy);
                members.constructor(constructor(vec![RtParameter::new("size", &int)], move |call| {
                    if let Value::Int32(size) = call.arg(0)? {
                        seen.store(*size, Ordering::SeqCst);
                    }
                    Ok(Value::Void)
                }));
                Ok(())
            },
        )
        .unwrap();

    let gizmo = runtime
        .define_native(TypeDeclaration::interface("Demo", "IGizmo"), |_, _| Ok(()))
        .unwrap();
    let gizmo_proxy = runtime
        .define_native(
            TypeDeclaration::class("Demo", "GizmoProxy").with_attribute(proxy_of(&gizmo)),
            |_, members| {
                members.base = Some(builtins.object.clone());
                members.interface(&gizmo);
                members.interface(&builtins.iproxy);
                members.constructor(constructor(Vec::new(), |_| Ok(Value::Void)));
                Ok(())
            },
        )
        .unwrap();

    let shelf = runtime
        .define_native(
            TypeDeclaration::class("Demo", "Shelf").with_generic_parameters(&["T"]),
            |_, members| {
                members.base = Some(builtins.object.clone());
                members.constructor(constructor(Vec::new(), |_| Ok(Value::Void)));
                Ok(())
            },
        )
        .unwrap();
    let shelf_proxy = runtime
        .define_native(
            TypeDeclaration::class("Demo", "ShelfProxy")
                .with_generic_parameters(&["T"])
                .with_attribute(proxy_of(&shelf)),
            |ty, members| {
                members.base = Some(runtime.make_generic(&shelf, ty.generic_parameters.clone())?);
                members.interface(&builtins.iproxy);
                members.constructor(constructor(Vec::new(), |_| Ok(Value::Void)));
                Ok(())
            },
        )
        .unwrap();

    let unmarked = runtime
        .define_native(TypeDeclaration::class("Demo", "Unmarked"), |_, members| {
            members.base = Some(widget.clone());
            members.interface(&builtins.iproxy);
            Ok(())
        })
        .unwrap();

    let misplaced = runtime
        .define_native(
            TypeDeclaration::class("Demo", "Misplaced").with_attribute(proxy_of(&widget)),
            |_, members| {
                members.base = Some(builtins.object.clone());
                members.interface(&builtins.iproxy);
                Ok(())
            },
        )
        .unwrap();
    let overreaching = runtime
        .define_native(
            TypeDeclaration::class("Demo", "Overreaching").with_attribute(proxy_of(&widget)),
            |_, members| {
                members.base = Some(widget.clone());
                members.interface(&builtins.iproxy);
                members.interface(&gizmo);
                Ok(())
            },
        )
        .unwrap();
    let markerless = runtime
        .define_native(
            TypeDeclaration::class("Demo", "Markerless").with_attribute(proxy_of(&gizmo)),
            |_, members| {
                members.base = Some(builtins.object.clone());
                members.interface(&gizmo);
                Ok(())
            },
        )
        .unwrap();

    Host {
        runtime,
        widget_proxy,
        gizmo_proxy,
        shelf_proxy,
        unmarked,
        misplaced,
        overreaching,
        markerless,
        forwarded,
    }
}

/// `Plain`, `Gadget : Widget` with `Gadget(int x) : base(x)`, `Trinket : IGizmo`,
/// `Both : Widget, IGizmo` and `Books : Shelf<string>`.
fn fixture() -> Fixture {
    ce_core::logging::init_for_tests();
    let host = host();
    let mut builder = CompilationBuilder::referencing(&host.runtime).unwrap();
    let int = builder.system("Int32").unwrap();
    let string = builder.system("String").unwrap();
    let widget = builder.type_named("Demo", "Widget", Vec::new()).unwrap();
    let gizmo = builder.type_named("Demo", "IGizmo", Vec::new()).unwrap();
    let shelf_of_string = builder.type_named("Demo", "Shelf", vec![string]).unwrap();
    let widget_ctor = builder.constructor(&widget, 1).unwrap();

    let plain = builder.add_class("Demo", "Plain");

    let gadget = builder.add_class("Demo", "Gadget");
    builder.set_base(gadget, widget.clone()).unwrap();
    let ctor = builder
        .add_constructor(gadget, vec![ParameterSymbol::new("x", int)])
        .unwrap();
    let chain = Operation::invoke_base(widget_ctor, vec![Operation::parameter("x")]);
    builder.set_body(ctor, Operation::constructor_body(Some(chain), None)).unwrap();

    let trinket = builder.add_class("Demo", "Trinket");
    builder.implement(trinket, gizmo.clone()).unwrap();

    let both = builder.add_class("Demo", "Both");
    builder.set_base(both, widget).unwrap();
    builder.implement(both, gizmo).unwrap();

    let books = builder.add_class("Demo", "Books");
    builder.set_base(books, shelf_of_string).unwrap();

    let compilation = builder.build().unwrap();
    let engine = Engine::new(Arc::new(compilation), host.runtime.clone(), EngineOptions::default()).unwrap();
    for proxy in [&host.widget_proxy, &host.gizmo_proxy, &host.shelf_proxy] {
        engine.register_proxy(proxy).unwrap();
    }
    Fixture {
        host,
        engine,
        plain,
        gadget,
        trinket,
        both,
        books,
    }
}

#[test]
fn unrelated_classes_derive_from_the_plain_proxy() {
    let fx = fixture();
    let plain = fx.engine.metadata().type_of_symbol(fx.plain).unwrap();
    let proxy = fx.engine.proxy_type(&plain).unwrap();
    assert_eq!(proxy, fx.host.runtime.builtins().object_proxy);

    let realized = fx.engine.realize(&plain).unwrap();
    assert_eq!(realized.declared_base(), Some(proxy));
}

#[test]
fn base_constructor_calls_are_forwarded_to_the_proxy() {
    let fx = fixture();
    let gadget = fx.engine.metadata().type_of_symbol(fx.gadget).unwrap();

    let realized = fx.engine.realize(&gadget).unwrap();
    assert_eq!(realized.declared_base(), Some(fx.host.widget_proxy.clone()));

    let instance = fx.engine.construct(&gadget, vec![Value::Int32(7)]).unwrap();
    assert_eq!(fx.host.forwarded.load(Ordering::SeqCst), 7);
    assert_eq!(fx.host.runtime.type_of(&instance).unwrap(), realized);
}

#[test]
fn implemented_interfaces_select_their_proxy() {
    let fx = fixture();
    let trinket = fx.engine.metadata().type_of_symbol(fx.trinket).unwrap();
    assert_eq!(fx.engine.proxy_type(&trinket).unwrap(), fx.host.gizmo_proxy);
}

#[test]
fn two_matching_proxies_are_ambiguous() {
    let fx = fixture();
    let both = fx.engine.metadata().type_of_symbol(fx.both).unwrap();
    let err = fx.engine.proxy_type(&both).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("ambiguous"));
}

#[test]
fn generic_proxies_take_the_arguments_of_the_matched_base() {
    let fx = fixture();
    let books = fx.engine.metadata().type_of_symbol(fx.books).unwrap();
    let proxy = fx.engine.proxy_type(&books).unwrap();

    assert_eq!(proxy.generic_definition(), fx.host.shelf_proxy);
    assert_eq!(
        proxy.generic_arguments().to_vec(),
        vec![fx.host.runtime.builtins().string.clone()]
    );
}

#[test]
fn proxies_without_an_annotation_are_rejected() {
    let fx = fixture();
    let err = fx.engine.register_proxy(&fx.host.unmarked).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn class_proxies_must_derive_from_their_proxee() {
    let fx = fixture();
    let err = fx.engine.register_proxy(&fx.host.misplaced).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("must derive directly"));
}

#[test]
fn class_proxies_implement_nothing_but_the_marker() {
    let fx = fixture();
    let err = fx.engine.register_proxy(&fx.host.overreaching).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("must implement only"));
}

#[test]
fn interface_proxies_need_the_marker() {
    let fx = fixture();
    let err = fx.engine.register_proxy(&fx.host.markerless).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("must implement exactly"));
}

#[test]
fn a_type_has_at_most_one_proxy() {
    let fx = fixture();
    assert_eq!(fx.engine.proxies().len(), 3);
    let err = fx.engine.register_proxy(&fx.host.widget_proxy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("already has the proxy"));
}
