use ce_core::diagnostics::Diagnostic;
use ce_core::error::ErrorKind;
use ce_core::ops::{BinaryOperator, Operation};
use ce_core::runtime::{HostRuntime, RtTypeKind, Value};
use ce_core::semantic::CompilationBuilder;
use ce_core::symbols::{ParameterSymbol, SymbolId, TypeRef};
use ce_core::EngineOptions;
use ce_engine::Engine;
use ce_reflect::{BindingFlags, MemberSignature};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

struct Fixture {
    engine: Engine,
    counter: SymbolId,
    gauge: SymbolId,
    shape: SymbolId,
    square: SymbolId,
    broken: SymbolId,
    recur: SymbolId,
    pulls: SymbolId,
    tally: SymbolId,
}

fn this_field(builder: &CompilationBuilder, field: SymbolId) -> Operation {
    Operation::field(Some(Operation::this()), builder.member_ref(field).unwrap())
}

fn static_field(builder: &CompilationBuilder, field: SymbolId) -> Operation {
    Operation::field(None, builder.member_ref(field).unwrap())
}

fn returns(value: Operation) -> Operation {
    Operation::method_body(Operation::block(vec![Operation::ret(Some(value))]))
}

/// ```text
/// class Counter {
///     int count = 5;
///     static int Base = 40;
///     static int Seed;
///     static Counter() { Seed = Base + 60; }
///     Counter(int start) { count += start; }
///     int Next() { return ++count; }
///     string Name { get; set; }
/// }
/// class Gauge<T> { int Measure() => typeof(T).Name.Length; int MeasureOf<U>() => typeof(U).Name.Length; }
/// interface IShape { int Area(); }
/// class Square : IShape { int Area() => 4; }
/// class Broken { }   // carries a compile error
/// class Recur { static int Down(int n) => Down(n + 1); }
/// class Pulls {
///     int pulled;
///     Pulls GetEnumerator() => this;
///     bool MoveNext() { pulled++; return pulled <= 3; }
///     int Current => pulled;
///     int FirstPull() { foreach (var item in this) { break; } return pulled; }
/// }
/// class Tally<T> { static int Count = 5; static Tally() { Count += 1; } int Get() => Count; }
/// ```
fn fixture(options: EngineOptions) -> Fixture {
    ce_core::logging::init_for_tests();
    let host = Arc::new(HostRuntime::new().unwrap());
    let mut builder = CompilationBuilder::referencing(&host).unwrap();
    let int = builder.system("Int32").unwrap();
    let string = builder.system("String").unwrap();
    let type_name = builder.member(&builder.system("Type").unwrap(), "Name").unwrap();
    let string_length = builder.member(&string, "Length").unwrap();
    let name_length = |ty: TypeRef| {
        Operation::property(
            Some(Operation::property(Some(Operation::type_of(ty)), type_name.clone())),
            string_length.clone(),
        )
    };

    let counter = builder.add_class("Demo", "Counter");
    let count = builder.add_field(counter, "count", int.clone()).unwrap();
    builder.set_initializer(count, Operation::int(5)).unwrap();
    let base = builder.add_field(counter, "Base", int.clone()).unwrap();
    builder.update_field(base, |f| f.is_static = true).unwrap();
    builder.set_initializer(base, Operation::int(40)).unwrap();
    let seed = builder.add_field(counter, "Seed", int.clone()).unwrap();
    builder.update_field(seed, |f| f.is_static = true).unwrap();
    let cctor = builder.add_static_constructor(counter).unwrap();
    let seed_value = Operation::binary(BinaryOperator::Add, static_field(&builder, base), Operation::int(60));
    builder
        .set_body(
            cctor,
            Operation::constructor_body(
                None,
                Some(Operation::block(vec![Operation::statement(Operation::assign(
                    static_field(&builder, seed),
                    seed_value,
                ))])),
            ),
        )
        .unwrap();
    let ctor = builder
        .add_constructor(counter, vec![ParameterSymbol::new("start", int.clone())])
        .unwrap();
    let add_start = Operation::compound_assign(
        BinaryOperator::Add,
        this_field(&builder, count),
        Operation::parameter("start"),
    );
    builder
        .set_body(
            ctor,
            Operation::constructor_body(None, Some(Operation::block(vec![Operation::statement(add_start)]))),
        )
        .unwrap();
    let next = builder.add_method(counter, "Next", Vec::new(), Some(int.clone())).unwrap();
    let bump = Operation::increment(this_field(&builder, count), false);
    builder.set_body(next, returns(bump)).unwrap();
    builder.add_auto_property(counter, "Name", string.clone(), true).unwrap();

    let gauge = builder.add_class("Demo", "Gauge");
    let t = builder.add_type_parameter(gauge, "T").unwrap();
    let measure = builder.add_method(gauge, "Measure", Vec::new(), Some(int.clone())).unwrap();
    builder.set_body(measure, returns(name_length(TypeRef::parameter(t)))).unwrap();
    let measure_of = builder.add_method(gauge, "MeasureOf", Vec::new(), Some(int.clone())).unwrap();
    let u = builder.add_type_parameter(measure_of, "U").unwrap();
    builder.set_body(measure_of, returns(name_length(TypeRef::parameter(u)))).unwrap();

    let shape = builder.add_interface("Demo", "IShape");
    builder.add_method(shape, "Area", Vec::new(), Some(int.clone())).unwrap();
    let square = builder.add_class("Demo", "Square");
    let shape_ref = builder.self_ref(shape).unwrap();
    builder.implement(square, shape_ref).unwrap();
    let area = builder.add_method(square, "Area", Vec::new(), Some(int.clone())).unwrap();
    builder.set_body(area, returns(Operation::int(4))).unwrap();

    let broken = builder.add_class("Demo", "Broken");
    builder.report(broken, Diagnostic::error("the name `missing` does not exist"));

    let recur = builder.add_class("Demo", "Recur");
    let down = builder
        .add_method(recur, "Down", vec![ParameterSymbol::new("n", int.clone())], Some(int.clone()))
        .unwrap();
    builder.update_method(down, |m| m.is_static = true).unwrap();
    let call = Operation::invoke(
        builder.member_ref(down).unwrap(),
        None,
        vec![Operation::binary(BinaryOperator::Add, Operation::parameter("n"), Operation::int(1))],
    );
    builder.set_body(down, returns(call)).unwrap();

    let boolean = builder.system("Boolean").unwrap();
    let pulls = builder.add_class("Demo", "Pulls");
    let pulled = builder.add_field(pulls, "pulled", int.clone()).unwrap();
    let pulls_ref = builder.self_ref(pulls).unwrap();
    let get_enumerator = builder
        .add_method(pulls, "GetEnumerator", Vec::new(), Some(pulls_ref))
        .unwrap();
    builder.set_body(get_enumerator, returns(Operation::this())).unwrap();
    let move_next = builder.add_method(pulls, "MoveNext", Vec::new(), Some(boolean)).unwrap();
    let pull = Operation::statement(Operation::increment(this_field(&builder, pulled), true));
    let more = Operation::binary(
        BinaryOperator::LessThanOrEqual,
        this_field(&builder, pulled),
        Operation::int(3),
    );
    builder
        .set_body(
            move_next,
            Operation::method_body(Operation::block(vec![pull, Operation::ret(Some(more))])),
        )
        .unwrap();
    let current = builder.add_property(pulls, "Current", int.clone(), true, false).unwrap();
    let get_current = builder.symbols().property(current).unwrap().getter.unwrap();
    builder.set_body(get_current, returns(this_field(&builder, pulled))).unwrap();
    let first_pull = builder.add_method(pulls, "FirstPull", Vec::new(), Some(int.clone())).unwrap();
    let first_pull_body = Operation::block(vec![
        Operation::for_each("item", Operation::this(), Operation::block(vec![Operation::brk()])),
        Operation::ret(Some(this_field(&builder, pulled))),
    ]);
    builder.set_body(first_pull, Operation::method_body(first_pull_body)).unwrap();

    let tally = builder.add_class("Demo", "Tally");
    builder.add_type_parameter(tally, "T").unwrap();
    let count_field = builder.add_field(tally, "Count", int.clone()).unwrap();
    builder.update_field(count_field, |f| f.is_static = true).unwrap();
    builder.set_initializer(count_field, Operation::int(5)).unwrap();
    let tally_cctor = builder.add_static_constructor(tally).unwrap();
    let add_one = Operation::compound_assign(
        BinaryOperator::Add,
        static_field(&builder, count_field),
        Operation::int(1),
    );
    builder
        .set_body(
            tally_cctor,
            Operation::constructor_body(None, Some(Operation::block(vec![Operation::statement(add_one)]))),
        )
        .unwrap();
    let get = builder.add_method(tally, "Get", Vec::new(), Some(int.clone())).unwrap();
    builder.set_body(get, returns(static_field(&builder, count_field))).unwrap();

    let compilation = builder.build().unwrap();
    let engine = Engine::new(Arc::new(compilation), host.clone(), options).unwrap();
    Fixture {
        engine,
        counter,
        gauge,
        shape,
        square,
        broken,
        recur,
        pulls,
        tally,
    }
}

#[test]
fn constructed_instances_run_initializers_before_the_constructor_body() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let counter = metadata.type_of_symbol(fx.counter).unwrap();

    let instance = fx.engine.construct(&counter, vec![Value::Int32(2)]).unwrap();
    let count = metadata.field(&counter, "count").unwrap();
    assert_eq!(fx.engine.get_field(&count, &instance).unwrap(), Value::Int32(7));

    let next = metadata.method(&counter, "Next", 0).unwrap();
    assert_eq!(fx.engine.execute(&next, instance.clone(), Vec::new()).unwrap(), Value::Int32(8));
    assert_eq!(fx.engine.execute(&next, instance, Vec::new()).unwrap(), Value::Int32(9));
}

#[test]
fn static_initializers_run_before_the_static_constructor() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let counter = metadata.type_of_symbol(fx.counter).unwrap();
    fx.engine.realize(&counter).unwrap();

    let seed = metadata.field(&counter, "Seed").unwrap();
    assert_eq!(fx.engine.get_field(&seed, &Value::Null).unwrap(), Value::Int32(100));
}

#[test]
fn auto_properties_store_into_their_backing_field() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let counter = metadata.type_of_symbol(fx.counter).unwrap();
    let instance = fx.engine.construct(&counter, vec![Value::Int32(0)]).unwrap();

    let name = metadata.property(&counter, "Name").unwrap();
    assert_eq!(fx.engine.get_property(&name, instance.clone()).unwrap(), Value::Null);
    let setter = metadata.setter(&name).unwrap().unwrap();
    fx.engine
        .execute(&setter, instance.clone(), vec![Value::from("north")])
        .unwrap();
    assert_eq!(fx.engine.get_property(&name, instance).unwrap(), Value::from("north"));
}

#[test]
fn every_declared_method_resolves_onto_the_synthesized_type() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let counter = metadata.type_of_symbol(fx.counter).unwrap();
    let realized = fx.engine.realize(&counter).unwrap();
    assert!(realized.is_synthesized);

    let methods = metadata
        .methods(&counter, BindingFlags::ALL | BindingFlags::DECLARED_ONLY)
        .unwrap();
    let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Next", "get_Name", "set_Name"]);
    for method in &methods {
        let (handle, _) = metadata.resolve_method(method, None).unwrap();
        assert_eq!(handle.owner, realized);
        assert_eq!(handle.method.name, method.name);
    }
}

#[test]
fn synthesized_members_match_the_declared_members() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let counter = metadata.type_of_symbol(fx.counter).unwrap();
    let realized = fx.engine.realize(&counter).unwrap();
    let runtime = realized.members().unwrap();
    let declared = BindingFlags::ALL | BindingFlags::DECLARED_ONLY;

    let fields: HashSet<_> = metadata
        .fields(&counter, declared)
        .unwrap()
        .iter()
        .map(|f| MemberSignature::of(f))
        .collect();
    let runtime_fields: HashSet<_> = runtime
        .fields
        .iter()
        .map(|f| MemberSignature::of_runtime_field(&realized, f))
        .collect();
    assert_eq!(fields.len(), 4);
    assert_eq!(fields, runtime_fields);

    let properties: HashSet<_> = metadata
        .properties(&counter, declared)
        .unwrap()
        .iter()
        .map(|p| MemberSignature::of(p))
        .collect();
    let runtime_properties: HashSet<_> = runtime
        .properties
        .iter()
        .map(|p| MemberSignature::of_runtime_property(&realized, p))
        .collect();
    assert_eq!(properties, runtime_properties);

    let methods: HashSet<_> = metadata
        .methods(&counter, declared)
        .unwrap()
        .iter()
        .map(|m| MemberSignature::of(m))
        .collect();
    let runtime_methods: HashSet<_> = runtime
        .methods
        .iter()
        .map(|m| MemberSignature::of_runtime_method(&realized, m))
        .collect();
    assert_eq!(methods, runtime_methods);

    let constructors: HashSet<_> = metadata
        .constructors(&counter, BindingFlags::ALL)
        .unwrap()
        .iter()
        .map(|c| MemberSignature::of(c))
        .collect();
    let runtime_constructors: HashSet<_> = runtime
        .constructors
        .iter()
        .map(|c| MemberSignature::of_runtime_method(&realized, c))
        .collect();
    assert_eq!(constructors.len(), 2);
    assert_eq!(constructors, runtime_constructors);
}

#[test]
fn foreach_pulls_from_an_interpreted_enumerator_one_item_at_a_time() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let pulls = metadata.type_of_symbol(fx.pulls).unwrap();
    let instance = fx.engine.construct(&pulls, Vec::new()).unwrap();

    let first_pull = metadata.method(&pulls, "FirstPull", 0).unwrap();
    assert_eq!(fx.engine.execute(&first_pull, instance, Vec::new()).unwrap(), Value::Int32(1));
}

#[test]
fn each_closed_generic_type_initializes_its_statics_once() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let tally = metadata.type_of_symbol(fx.tally).unwrap();
    let string = metadata.system_type("String").unwrap();
    let char_type = metadata.system_type("Char").unwrap();

    let of_string = metadata.make_generic_type(&tally, vec![string]).unwrap();
    let get = metadata.method(&of_string, "Get", 0).unwrap();
    let first = fx.engine.construct(&of_string, Vec::new()).unwrap();
    assert_eq!(fx.engine.execute(&get, first, Vec::new()).unwrap(), Value::Int32(6));
    let second = fx.engine.construct(&of_string, Vec::new()).unwrap();
    assert_eq!(fx.engine.execute(&get, second, Vec::new()).unwrap(), Value::Int32(6));

    let of_char = metadata.make_generic_type(&tally, vec![char_type]).unwrap();
    let get = metadata.method(&of_char, "Get", 0).unwrap();
    let instance = fx.engine.construct(&of_char, Vec::new()).unwrap();
    assert_eq!(fx.engine.execute(&get, instance, Vec::new()).unwrap(), Value::Int32(6));
}

#[test]
fn generic_bodies_see_the_arguments_of_their_instantiation() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let gauge = metadata.type_of_symbol(fx.gauge).unwrap();
    let string = metadata.system_type("String").unwrap();
    let char_type = metadata.system_type("Char").unwrap();

    let closed = metadata.make_generic_type(&gauge, vec![string]).unwrap();
    let instance = fx.engine.construct(&closed, Vec::new()).unwrap();

    let measure = metadata.method(&closed, "Measure", 0).unwrap();
    assert_eq!(fx.engine.execute(&measure, instance.clone(), Vec::new()).unwrap(), Value::Int32(6));

    let measure_of = metadata.method(&closed, "MeasureOf", 0).unwrap();
    let measure_char = metadata.make_generic_method(&measure_of, vec![char_type]).unwrap();
    assert_eq!(fx.engine.execute(&measure_char, instance, Vec::new()).unwrap(), Value::Int32(4));
}

#[test]
fn generic_definitions_cannot_be_instantiated_directly() {
    let fx = fixture(EngineOptions::default());
    let gauge = fx.engine.metadata().type_of_symbol(fx.gauge).unwrap();
    let err = fx.engine.construct(&gauge, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn interface_calls_dispatch_to_the_implementing_class() {
    let fx = fixture(EngineOptions::default());
    let metadata = fx.engine.metadata();
    let shape = metadata.type_of_symbol(fx.shape).unwrap();
    let square = metadata.type_of_symbol(fx.square).unwrap();

    let realized = fx.engine.realize(&shape).unwrap();
    assert_eq!(realized.kind, RtTypeKind::Interface);

    let instance = fx.engine.construct(&square, Vec::new()).unwrap();
    let area = metadata.method(&shape, "Area", 0).unwrap();
    assert_eq!(fx.engine.execute(&area, instance, Vec::new()).unwrap(), Value::Int32(4));
}

#[test]
fn types_with_compile_errors_are_not_synthesized() {
    let fx = fixture(EngineOptions::default());
    let broken = fx.engine.metadata().type_of_symbol(fx.broken).unwrap();

    assert!(fx.engine.build_type(&broken).unwrap().is_none());
    assert!(fx.engine.diagnostics().has_errors());
    let err = fx.engine.realize(&broken).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compilation);
}

#[test]
fn runaway_recursion_stops_at_the_call_depth_limit() {
    let options = EngineOptions {
        max_call_depth: 16,
        ..EngineOptions::default()
    };
    let fx = fixture(options);
    let metadata = fx.engine.metadata();
    let recur = metadata.type_of_symbol(fx.recur).unwrap();
    let down = metadata.method(&recur, "Down", 1).unwrap();

    let err = fx
        .engine
        .execute(&down, Value::Null, vec![Value::Int32(0)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert!(err.to_string().contains("call depth"));
}

#[test]
fn cancelled_engines_refuse_to_synthesize() {
    let fx = fixture(EngineOptions::default());
    let counter = fx.engine.metadata().type_of_symbol(fx.counter).unwrap();
    fx.engine.cancellation().cancel();

    let err = fx.engine.build_type(&counter).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
