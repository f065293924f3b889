use ce_core::error::ErrorKind;
use ce_core::ops::{BinaryOperator, InterpolatedPart, Operation};
use ce_core::runtime::{ExpressionKind, HostRuntime, Value};
use ce_core::semantic::CompilationBuilder;
use ce_core::symbols::{MemberRef, ParameterSymbol, TypeRef};
use ce_core::EngineOptions;
use ce_engine::{Engine, Frame};
use pretty_assertions::assert_eq;
use std::sync::Arc;

struct Fixture {
    host: Arc<HostRuntime>,
    engine: Engine,
    int: TypeRef,
    new_exception: MemberRef,
}

fn fixture() -> Fixture {
    ce_core::logging::init_for_tests();
    let host = Arc::new(HostRuntime::new().unwrap());
    let builder = CompilationBuilder::referencing(&host).unwrap();
    let int = builder.system("Int32").unwrap();
    let exception = builder.system("Exception").unwrap();
    let new_exception = builder.constructor(&exception, 1).unwrap();
    let compilation = builder.build().unwrap();
    let engine = Engine::new(Arc::new(compilation), host.clone(), EngineOptions::default()).unwrap();
    Fixture {
        host,
        engine,
        int,
        new_exception,
    }
}

fn add(left: Operation, right: Operation) -> Operation {
    Operation::binary(BinaryOperator::Add, left, right)
}

#[test]
fn assignment_to_an_unknown_name_defines_it_in_the_current_frame() {
    let fx = fixture();
    let frame = Frame::root();
    let assign = Operation::statement(Operation::assign(Operation::local("x"), Operation::int(1)));
    fx.engine.interpret(&assign, &frame).unwrap();

    assert_eq!(frame.names().unwrap(), vec!["x".to_string()]);
    assert_eq!(frame.get("x").unwrap(), Value::Int32(1));
}

#[test]
fn deconstruction_assigns_each_tuple_element() {
    let fx = fixture();
    let frame = Frame::root();
    let deconstruct = Operation::statement(Operation::deconstruct(
        vec![Operation::local("x"), Operation::local("y")],
        Operation::tuple(vec![Operation::int(2), Operation::string("str")]),
    ));
    fx.engine.interpret(&deconstruct, &frame).unwrap();

    assert_eq!(frame.get("x").unwrap(), Value::Int32(2));
    assert_eq!(frame.get("y").unwrap(), Value::from("str"));
}

#[test]
fn for_loop_accumulates_into_an_outer_local() {
    let fx = fixture();
    let body = Operation::block(vec![
        Operation::declare("total", Some(Operation::int(0))),
        Operation::for_loop(
            vec![Operation::declare("i", Some(Operation::int(0)))],
            Some(Operation::binary(
                BinaryOperator::LessThan,
                Operation::local("i"),
                Operation::int(5),
            )),
            vec![Operation::statement(Operation::increment(Operation::local("i"), true))],
            Operation::statement(Operation::compound_assign(
                BinaryOperator::Add,
                Operation::local("total"),
                Operation::local("i"),
            )),
        ),
        Operation::ret(Some(Operation::local("total"))),
    ]);

    let total = fx.engine.interpret(&body, &Frame::root()).unwrap();
    assert_eq!(total, Value::Int32(10));
}

#[test]
fn foreach_walks_array_items_and_break_leaves_the_loop() {
    let fx = fixture();
    let items = Operation::new_array(
        fx.int.clone(),
        vec![Operation::int(1), Operation::int(2), Operation::int(3), Operation::int(0)],
    );
    let body = Operation::block(vec![
        Operation::declare("product", Some(Operation::int(1))),
        Operation::for_each(
            "item",
            items,
            Operation::block(vec![
                Operation::conditional(
                    Operation::binary(BinaryOperator::Equals, Operation::local("item"), Operation::int(0)),
                    Operation::brk(),
                    None,
                ),
                Operation::statement(Operation::compound_assign(
                    BinaryOperator::Multiply,
                    Operation::local("product"),
                    Operation::local("item"),
                )),
            ]),
        ),
        Operation::ret(Some(Operation::local("product"))),
    ]);

    let product = fx.engine.interpret(&body, &Frame::root()).unwrap();
    assert_eq!(product, Value::Int32(6));
}

fn local_equals(name: &str, value: i32) -> Operation {
    Operation::binary(BinaryOperator::Equals, Operation::local(name), Operation::int(value))
}

fn local_below(name: &str, bound: i32) -> Operation {
    Operation::binary(BinaryOperator::LessThan, Operation::local(name), Operation::int(bound))
}

fn bump(name: &str) -> Operation {
    Operation::statement(Operation::increment(Operation::local(name), true))
}

fn accumulate(total: &str, item: &str) -> Operation {
    Operation::statement(Operation::compound_assign(
        BinaryOperator::Add,
        Operation::local(total),
        Operation::local(item),
    ))
}

#[test]
fn continue_in_a_for_loop_still_runs_the_increment() {
    let fx = fixture();
    let body = Operation::block(vec![
        Operation::declare("total", Some(Operation::int(0))),
        Operation::for_loop(
            vec![Operation::declare("i", Some(Operation::int(0)))],
            Some(local_below("i", 5)),
            vec![bump("i")],
            Operation::block(vec![
                Operation::conditional(local_equals("i", 2), Operation::cont(), None),
                accumulate("total", "i"),
            ]),
        ),
        Operation::ret(Some(Operation::local("total"))),
    ]);

    assert_eq!(fx.engine.interpret(&body, &Frame::root()).unwrap(), Value::Int32(8));
}

#[test]
fn continue_in_a_while_loop_rechecks_the_condition() {
    let fx = fixture();
    let odd = Operation::binary(
        BinaryOperator::Equals,
        Operation::binary(BinaryOperator::Remainder, Operation::local("i"), Operation::int(2)),
        Operation::int(0),
    );
    let body = Operation::block(vec![
        Operation::declare("i", Some(Operation::int(0))),
        Operation::declare("total", Some(Operation::int(0))),
        Operation::while_loop(
            local_below("i", 6),
            Operation::block(vec![
                bump("i"),
                Operation::conditional(odd, Operation::cont(), None),
                accumulate("total", "i"),
            ]),
        ),
        Operation::ret(Some(Operation::local("total"))),
    ]);

    assert_eq!(fx.engine.interpret(&body, &Frame::root()).unwrap(), Value::Int32(9));
}

#[test]
fn do_while_runs_its_body_before_the_first_check() {
    let fx = fixture();
    let body = Operation::block(vec![
        Operation::declare("n", Some(Operation::int(10))),
        Operation::do_while(local_below("n", 5), bump("n")),
        Operation::ret(Some(Operation::local("n"))),
    ]);

    assert_eq!(fx.engine.interpret(&body, &Frame::root()).unwrap(), Value::Int32(11));
}

#[test]
fn continue_in_a_do_while_loop_evaluates_the_condition() {
    let fx = fixture();
    let body = Operation::block(vec![
        Operation::declare("n", Some(Operation::int(0))),
        Operation::declare("hits", Some(Operation::int(0))),
        Operation::do_while(
            local_below("n", 5),
            Operation::block(vec![
                bump("n"),
                Operation::conditional(local_below("n", 3), Operation::cont(), None),
                bump("hits"),
            ]),
        ),
        Operation::ret(Some(Operation::local("hits"))),
    ]);

    assert_eq!(fx.engine.interpret(&body, &Frame::root()).unwrap(), Value::Int32(3));
}

#[test]
fn conditional_returns_pick_a_branch() {
    let fx = fixture();
    let body = Operation::block(vec![Operation::conditional(
        Operation::binary(BinaryOperator::Equals, Operation::parameter("n"), Operation::int(0)),
        Operation::ret(Some(Operation::string("zero"))),
        Some(Operation::ret(Some(Operation::string("not zero")))),
    )]);

    let zero = Frame::root();
    zero.define("n", Value::Int32(0)).unwrap();
    assert_eq!(fx.engine.interpret(&body, &zero).unwrap(), Value::from("zero"));

    let seven = Frame::root();
    seven.define("n", Value::Int32(7)).unwrap();
    assert_eq!(fx.engine.interpret(&body, &seven).unwrap(), Value::from("not zero"));
}

#[test]
fn redeclaring_a_local_in_the_same_scope_fails() {
    let fx = fixture();
    let body = Operation::block(vec![
        Operation::declare("x", Some(Operation::int(1))),
        Operation::declare("x", Some(Operation::int(2))),
    ]);
    let err = fx.engine.interpret(&body, &Frame::root()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn unsupported_operations_are_reported() {
    let fx = fixture();
    let err = fx
        .engine
        .interpret(&Operation::statement(Operation::unsupported("Await")), &Frame::root())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert!(err.to_string().contains("Await"));
}

#[test]
fn lambdas_observe_later_writes_to_captured_locals() {
    let fx = fixture();
    let frame = Frame::root();
    frame.define("k", Value::Int32(3)).unwrap();
    let lambda = Operation::lambda(
        vec![ParameterSymbol::new("x", fx.int.clone())],
        add(Operation::parameter("x"), Operation::local("k")),
    );

    let Value::Delegate(delegate) = fx.engine.interpret(&lambda, &frame).unwrap() else {
        panic!("expected a delegate");
    };
    assert_eq!(delegate.parameter_count(), 1);
    assert_eq!(
        delegate.invoke(fx.host.as_ref(), vec![Value::Int32(4)]).unwrap(),
        Value::Int32(7)
    );

    let write = Operation::statement(Operation::assign(Operation::local("k"), Operation::int(10)));
    fx.engine.interpret(&write, &frame).unwrap();
    assert_eq!(
        delegate.invoke(fx.host.as_ref(), vec![Value::Int32(4)]).unwrap(),
        Value::Int32(14)
    );
}

#[test]
fn lambdas_over_the_parameter_limit_are_rejected() {
    let fx = fixture();
    let limit = fx.engine.options().max_delegate_parameters;
    let parameters = (0..=limit)
        .map(|i| ParameterSymbol::new(format!("p{}", i), fx.int.clone()))
        .collect();
    let lambda = Operation::lambda(parameters, Operation::int(0));
    let err = fx.engine.interpret(&lambda, &Frame::root()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test]
fn projection_maps_parameters_by_position_and_captures_by_frame() {
    let fx = fixture();
    let frame = Frame::root();
    frame.define("k", Value::Int32(3)).unwrap();
    let lambda = Operation::lambda(
        vec![ParameterSymbol::new("x", fx.int.clone())],
        add(Operation::parameter("x"), Operation::local("k")),
    );

    let expression = fx.engine.project(&lambda, &frame).unwrap();
    let ExpressionKind::Lambda { parameters, body } = &expression.kind else {
        panic!("expected a lambda expression, got {:?}", expression.kind);
    };
    assert_eq!(parameters, &vec!["x".to_string()]);
    let ExpressionKind::Binary { left, right, .. } = &body.kind else {
        panic!("expected a binary body, got {:?}", body.kind);
    };
    assert!(matches!(&left.kind, ExpressionKind::Parameter { index: 0, .. }));
    assert!(matches!(&right.kind, ExpressionKind::FrameGet { name, .. } if name == "k"));

    frame.define_or_assign("k", Value::Int32(5)).unwrap();
    assert_eq!(
        body.evaluate(fx.host.as_ref(), &[Value::Int32(1)]).unwrap(),
        Value::Int32(6)
    );
}

#[test]
fn projection_rejects_multi_statement_bodies() {
    let fx = fixture();
    let lambda = Operation::lambda(
        Vec::new(),
        Operation::block(vec![
            Operation::declare("a", Some(Operation::int(1))),
            Operation::ret(Some(Operation::local("a"))),
        ]),
    );
    let err = fx.engine.project(&lambda, &Frame::root()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test]
fn interpolation_formats_each_hole() {
    let fx = fixture();
    let frame = Frame::root();
    frame.define("count", Value::Int32(3)).unwrap();
    let text = Operation::interpolated(vec![
        InterpolatedPart::Interpolation {
            expression: Operation::local("count"),
            alignment: None,
            format: None,
        },
        InterpolatedPart::Text(" items".to_string()),
    ]);
    assert_eq!(fx.engine.interpret(&text, &frame).unwrap(), Value::from("3 items"));
}

#[test]
fn throw_surfaces_the_exception_message() {
    let fx = fixture();
    let throw = Operation::throw(Some(Operation::new_object(
        fx.new_exception.clone(),
        vec![Operation::string("boom")],
    )));
    let err = fx.engine.interpret(&throw, &Frame::root()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Thrown);
    assert!(err.to_string().contains("System.Exception: boom"));
}
