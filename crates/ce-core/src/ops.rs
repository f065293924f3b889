//! The analyzed-operation tree produced by semantic analysis for bodies and initializers.
//!
//! The interpreter and the expression projector consume these shapes directly; synthesized
//! method bodies refer to them by operation id rather than embedding logic.

use crate::error::Result;
use crate::symbols::{MemberRef, ParameterSymbol, TypeRef};

common_enum! {
    pub enum Literal {
        Null,
        Bool(bool),
        Char(char),
        SByte(i8),
        Byte(u8),
        Int16(i16),
        UInt16(u16),
        Int32(i32),
        UInt32(u32),
        Int64(i64),
        UInt64(u64),
        Single(f32),
        Double(f64),
        String(String),
        /// Arbitrary-precision decimal, kept as source text.
        Decimal(String),
    }
}

impl Literal {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "bool",
            Literal::Char(_) => "char",
            Literal::SByte(_) => "sbyte",
            Literal::Byte(_) => "byte",
            Literal::Int16(_) => "short",
            Literal::UInt16(_) => "ushort",
            Literal::Int32(_) => "int",
            Literal::UInt32(_) => "uint",
            Literal::Int64(_) => "long",
            Literal::UInt64(_) => "ulong",
            Literal::Single(_) => "float",
            Literal::Double(_) => "double",
            Literal::String(_) => "string",
            Literal::Decimal(_) => "decimal",
        }
    }
}

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum BinaryOperator {
        Add,
        Subtract,
        Multiply,
        Divide,
        Remainder,
        LeftShift,
        RightShift,
        And,
        Or,
        ExclusiveOr,
        ConditionalAnd,
        ConditionalOr,
        Equals,
        NotEquals,
        LessThan,
        LessThanOrEqual,
        GreaterThan,
        GreaterThanOrEqual,
    }
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
            BinaryOperator::And => "&",
            BinaryOperator::Or => "|",
            BinaryOperator::ExclusiveOr => "^",
            BinaryOperator::ConditionalAnd => "&&",
            BinaryOperator::ConditionalOr => "||",
            BinaryOperator::Equals => "==",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
        )
    }
}

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum UnaryOperator {
        Plus,
        Minus,
        Not,
        BitwiseNegation,
    }
}

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum BranchKind {
        Break,
        Continue,
    }
}

common_struct! {
    pub struct VariableDeclarator {
        pub name: String,
        pub initializer: Option<Operation>,
    }
}

common_enum! {
    pub enum InterpolatedPart {
        Text(String),
        Interpolation {
            expression: Operation,
            alignment: Option<Operation>,
            format: Option<String>,
        },
    }
}

common_struct! {
    /// One node of an analyzed body; `ty` is the node's static type when it has one.
    pub struct Operation {
        pub kind: OperationKind,
        pub ty: Option<TypeRef>,
    }
}

common_enum! {
    pub enum OperationKind {
        Block { operations: Vec<Operation> },
        VariableDeclarationGroup { declarators: Vec<VariableDeclarator> },
        ExpressionStatement { operation: Box<Operation> },
        Empty,
        Literal(Literal),
        DefaultValue,
        LocalReference { name: String },
        ParameterReference { name: String },
        InstanceReference,
        FieldReference { instance: Option<Box<Operation>>, field: MemberRef },
        PropertyReference {
            instance: Option<Box<Operation>>,
            property: MemberRef,
            arguments: Vec<Operation>,
        },
        ArrayElementReference { array: Box<Operation>, indices: Vec<Operation> },
        SimpleAssignment { target: Box<Operation>, value: Box<Operation> },
        CompoundAssignment {
            operator: BinaryOperator,
            target: Box<Operation>,
            value: Box<Operation>,
        },
        Increment { target: Box<Operation>, decrement: bool, postfix: bool },
        DeconstructionAssignment { target: Box<Operation>, value: Box<Operation> },
        Tuple { elements: Vec<Operation> },
        Binary {
            operator: BinaryOperator,
            left: Box<Operation>,
            right: Box<Operation>,
        },
        Unary { operator: UnaryOperator, operand: Box<Operation> },
        Conditional {
            condition: Box<Operation>,
            when_true: Box<Operation>,
            when_false: Option<Box<Operation>>,
        },
        Coalesce { value: Box<Operation>, when_null: Box<Operation> },
        /// Conversion to the operation's own `ty`.
        Conversion { operand: Box<Operation>, checked: bool },
        IsType { operand: Box<Operation>, target: TypeRef },
        TypeOf { target: TypeRef },
        Invocation {
            method: MemberRef,
            instance: Option<Box<Operation>>,
            arguments: Vec<Operation>,
            is_virtual: bool,
        },
        ObjectCreation { constructor: MemberRef, arguments: Vec<Operation> },
        ArrayCreation {
            element_type: TypeRef,
            dimension_sizes: Vec<Operation>,
            initializer: Option<Vec<Operation>>,
        },
        InterpolatedString { parts: Vec<InterpolatedPart> },
        Return { value: Option<Box<Operation>> },
        Branch { kind: BranchKind },
        For {
            before: Vec<Operation>,
            condition: Option<Box<Operation>>,
            at_loop_bottom: Vec<Operation>,
            body: Box<Operation>,
        },
        While { condition: Box<Operation>, body: Box<Operation> },
        DoWhile { condition: Box<Operation>, body: Box<Operation> },
        ForEach {
            variable: String,
            collection: Box<Operation>,
            body: Box<Operation>,
        },
        Throw { exception: Option<Box<Operation>> },
        AnonymousFunction { parameters: Vec<ParameterSymbol>, body: Box<Operation> },
        FieldInitializer { fields: Vec<MemberRef>, value: Box<Operation> },
        PropertyInitializer { properties: Vec<MemberRef>, value: Box<Operation> },
        ConstructorBody {
            initializer: Option<Box<Operation>>,
            body: Option<Box<Operation>>,
        },
        MethodBody { body: Box<Operation> },
        /// A construct semantic analysis produced but the engine cannot execute.
        Unsupported { kind: String },
    }
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Block { .. } => "Block",
            OperationKind::VariableDeclarationGroup { .. } => "VariableDeclarationGroup",
            OperationKind::ExpressionStatement { .. } => "ExpressionStatement",
            OperationKind::Empty => "Empty",
            OperationKind::Literal(_) => "Literal",
            OperationKind::DefaultValue => "DefaultValue",
            OperationKind::LocalReference { .. } => "LocalReference",
            OperationKind::ParameterReference { .. } => "ParameterReference",
            OperationKind::InstanceReference => "InstanceReference",
            OperationKind::FieldReference { .. } => "FieldReference",
            OperationKind::PropertyReference { .. } => "PropertyReference",
            OperationKind::ArrayElementReference { .. } => "ArrayElementReference",
            OperationKind::SimpleAssignment { .. } => "SimpleAssignment",
            OperationKind::CompoundAssignment { .. } => "CompoundAssignment",
            OperationKind::Increment { .. } => "Increment",
            OperationKind::DeconstructionAssignment { .. } => "DeconstructionAssignment",
            OperationKind::Tuple { .. } => "Tuple",
            OperationKind::Binary { .. } => "Binary",
            OperationKind::Unary { .. } => "Unary",
            OperationKind::Conditional { .. } => "Conditional",
            OperationKind::Coalesce { .. } => "Coalesce",
            OperationKind::Conversion { .. } => "Conversion",
            OperationKind::IsType { .. } => "IsType",
            OperationKind::TypeOf { .. } => "TypeOf",
            OperationKind::Invocation { .. } => "Invocation",
            OperationKind::ObjectCreation { .. } => "ObjectCreation",
            OperationKind::ArrayCreation { .. } => "ArrayCreation",
            OperationKind::InterpolatedString { .. } => "InterpolatedString",
            OperationKind::Return { .. } => "Return",
            OperationKind::Branch { .. } => "Branch",
            OperationKind::For { .. } => "For",
            OperationKind::While { .. } => "While",
            OperationKind::DoWhile { .. } => "DoWhile",
            OperationKind::ForEach { .. } => "ForEach",
            OperationKind::Throw { .. } => "Throw",
            OperationKind::AnonymousFunction { .. } => "AnonymousFunction",
            OperationKind::FieldInitializer { .. } => "FieldInitializer",
            OperationKind::PropertyInitializer { .. } => "PropertyInitializer",
            OperationKind::ConstructorBody { .. } => "ConstructorBody",
            OperationKind::MethodBody { .. } => "MethodBody",
            OperationKind::Unsupported { .. } => "Unsupported",
        }
    }
}

// Constructors used by semantic-analysis adapters and fixtures.
impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self { kind, ty: None }
    }

    pub fn typed(mut self, ty: TypeRef) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn literal(literal: Literal) -> Self {
        Self::new(OperationKind::Literal(literal))
    }

    pub fn int(value: i32) -> Self {
        Self::literal(Literal::Int32(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::literal(Literal::String(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(Literal::Bool(value))
    }

    pub fn null() -> Self {
        Self::literal(Literal::Null)
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::new(OperationKind::LocalReference { name: name.into() })
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Self::new(OperationKind::ParameterReference { name: name.into() })
    }

    pub fn this() -> Self {
        Self::new(OperationKind::InstanceReference)
    }

    pub fn block(operations: Vec<Operation>) -> Self {
        Self::new(OperationKind::Block { operations })
    }

    pub fn statement(operation: Operation) -> Self {
        Self::new(OperationKind::ExpressionStatement {
            operation: Box::new(operation),
        })
    }

    pub fn declare(name: impl Into<String>, initializer: Option<Operation>) -> Self {
        Self::new(OperationKind::VariableDeclarationGroup {
            declarators: vec![VariableDeclarator {
                name: name.into(),
                initializer,
            }],
        })
    }

    pub fn assign(target: Operation, value: Operation) -> Self {
        Self::new(OperationKind::SimpleAssignment {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn compound_assign(operator: BinaryOperator, target: Operation, value: Operation) -> Self {
        Self::new(OperationKind::CompoundAssignment {
            operator,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn increment(target: Operation, postfix: bool) -> Self {
        Self::new(OperationKind::Increment {
            target: Box::new(target),
            decrement: false,
            postfix,
        })
    }

    pub fn decrement(target: Operation, postfix: bool) -> Self {
        Self::new(OperationKind::Increment {
            target: Box::new(target),
            decrement: true,
            postfix,
        })
    }

    pub fn deconstruct(targets: Vec<Operation>, value: Operation) -> Self {
        Self::new(OperationKind::DeconstructionAssignment {
            target: Box::new(Self::tuple(targets)),
            value: Box::new(value),
        })
    }

    pub fn tuple(elements: Vec<Operation>) -> Self {
        Self::new(OperationKind::Tuple { elements })
    }

    pub fn binary(operator: BinaryOperator, left: Operation, right: Operation) -> Self {
        Self::new(OperationKind::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(operator: UnaryOperator, operand: Operation) -> Self {
        Self::new(OperationKind::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    pub fn conditional(condition: Operation, when_true: Operation, when_false: Option<Operation>) -> Self {
        Self::new(OperationKind::Conditional {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: when_false.map(Box::new),
        })
    }

    pub fn coalesce(value: Operation, when_null: Operation) -> Self {
        Self::new(OperationKind::Coalesce {
            value: Box::new(value),
            when_null: Box::new(when_null),
        })
    }

    pub fn convert(operand: Operation, target: TypeRef) -> Self {
        Self::new(OperationKind::Conversion {
            operand: Box::new(operand),
            checked: false,
        })
        .typed(target)
    }

    pub fn is_type(operand: Operation, target: TypeRef) -> Self {
        Self::new(OperationKind::IsType {
            operand: Box::new(operand),
            target,
        })
    }

    pub fn type_of(target: TypeRef) -> Self {
        Self::new(OperationKind::TypeOf { target })
    }

    pub fn field(instance: Option<Operation>, field: MemberRef) -> Self {
        Self::new(OperationKind::FieldReference {
            instance: instance.map(Box::new),
            field,
        })
    }

    pub fn property(instance: Option<Operation>, property: MemberRef) -> Self {
        Self::new(OperationKind::PropertyReference {
            instance: instance.map(Box::new),
            property,
            arguments: Vec::new(),
        })
    }

    pub fn indexer(instance: Operation, property: MemberRef, arguments: Vec<Operation>) -> Self {
        Self::new(OperationKind::PropertyReference {
            instance: Some(Box::new(instance)),
            property,
            arguments,
        })
    }

    pub fn element(array: Operation, indices: Vec<Operation>) -> Self {
        Self::new(OperationKind::ArrayElementReference {
            array: Box::new(array),
            indices,
        })
    }

    pub fn invoke(method: MemberRef, instance: Option<Operation>, arguments: Vec<Operation>) -> Self {
        Self::new(OperationKind::Invocation {
            method,
            instance: instance.map(Box::new),
            arguments,
            is_virtual: true,
        })
    }

    /// Non-virtual invocation, as produced for `base.M()` calls.
    pub fn invoke_base(method: MemberRef, arguments: Vec<Operation>) -> Self {
        Self::new(OperationKind::Invocation {
            method,
            instance: Some(Box::new(Self::this())),
            arguments,
            is_virtual: false,
        })
    }

    pub fn new_object(constructor: MemberRef, arguments: Vec<Operation>) -> Self {
        Self::new(OperationKind::ObjectCreation {
            constructor,
            arguments,
        })
    }

    pub fn new_array(element_type: TypeRef, items: Vec<Operation>) -> Self {
        Self::new(OperationKind::ArrayCreation {
            element_type,
            dimension_sizes: vec![Self::int(items.len() as i32)],
            initializer: Some(items),
        })
    }

    pub fn interpolated(parts: Vec<InterpolatedPart>) -> Self {
        Self::new(OperationKind::InterpolatedString { parts })
    }

    pub fn ret(value: Option<Operation>) -> Self {
        Self::new(OperationKind::Return {
            value: value.map(Box::new),
        })
    }

    pub fn brk() -> Self {
        Self::new(OperationKind::Branch {
            kind: BranchKind::Break,
        })
    }

    pub fn cont() -> Self {
        Self::new(OperationKind::Branch {
            kind: BranchKind::Continue,
        })
    }

    pub fn for_loop(
        before: Vec<Operation>,
        condition: Option<Operation>,
        at_loop_bottom: Vec<Operation>,
        body: Operation,
    ) -> Self {
        Self::new(OperationKind::For {
            before,
            condition: condition.map(Box::new),
            at_loop_bottom,
            body: Box::new(body),
        })
    }

    pub fn while_loop(condition: Operation, body: Operation) -> Self {
        Self::new(OperationKind::While {
            condition: Box::new(condition),
            body: Box::new(body),
        })
    }

    pub fn do_while(condition: Operation, body: Operation) -> Self {
        Self::new(OperationKind::DoWhile {
            condition: Box::new(condition),
            body: Box::new(body),
        })
    }

    pub fn for_each(variable: impl Into<String>, collection: Operation, body: Operation) -> Self {
        Self::new(OperationKind::ForEach {
            variable: variable.into(),
            collection: Box::new(collection),
            body: Box::new(body),
        })
    }

    pub fn throw(exception: Option<Operation>) -> Self {
        Self::new(OperationKind::Throw {
            exception: exception.map(Box::new),
        })
    }

    pub fn lambda(parameters: Vec<ParameterSymbol>, body: Operation) -> Self {
        Self::new(OperationKind::AnonymousFunction {
            parameters,
            body: Box::new(body),
        })
    }

    pub fn method_body(body: Operation) -> Self {
        Self::new(OperationKind::MethodBody {
            body: Box::new(body),
        })
    }

    pub fn constructor_body(initializer: Option<Operation>, body: Option<Operation>) -> Self {
        Self::new(OperationKind::ConstructorBody {
            initializer: initializer.map(Box::new),
            body: body.map(Box::new),
        })
    }

    pub fn field_initializer(fields: Vec<MemberRef>, value: Operation) -> Self {
        Self::new(OperationKind::FieldInitializer {
            fields,
            value: Box::new(value),
        })
    }

    pub fn property_initializer(properties: Vec<MemberRef>, value: Operation) -> Self {
        Self::new(OperationKind::PropertyInitializer {
            properties,
            value: Box::new(value),
        })
    }

    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::new(OperationKind::Unsupported { kind: kind.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn operation_tree_survives_json() {
        let op = Operation::block(vec![
            Operation::declare("x", Some(Operation::int(1))),
            Operation::statement(Operation::assign(
                Operation::local("x"),
                Operation::binary(BinaryOperator::Add, Operation::local("x"), Operation::int(2)),
            )),
        ]);
        let json = op.to_json().unwrap();
        assert_eq!(Operation::from_json(&json).unwrap(), op);
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(Operation::brk().kind_name(), "Branch");
        assert_eq!(Operation::unsupported("Await").kind_name(), "Unsupported");
        assert_eq!(Literal::Decimal("1.5".into()).kind_name(), "decimal");
    }
}
