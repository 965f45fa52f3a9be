//! Lifted operators, executed.

mod common;

use bumpalo::Bump;
use common::{CallLog, Counter, Value, Vm, call, int, nbool, nint};
use sharplower::prelude::*;

const INTS: [Option<i64>; 3] = [None, Some(1), Some(2)];
const BOOLS: [Option<bool>; 3] = [None, Some(false), Some(true)];

/// `R f(A a, B b) { return a <op> b; }`
fn binary_function(registry: &TypeRegistry, operand: TypeHash, result: TypeHash, op: BinaryOp) -> CompiledModule {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let body = [ast.ret(Some(ast.binary(ast.ident("a"), op, ast.ident("b"))))];
    let decl = FunctionDecl::new("f", result)
        .param("a", operand)
        .param("b", operand);
    common::compile(registry, &decl, &body)
}

#[test]
fn lifted_equality_truth_table() {
    let registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let eq = binary_function(&registry, nullable_int, primitives::BOOL, BinaryOp::Equal);
    let ne = binary_function(&registry, nullable_int, primitives::BOOL, BinaryOp::NotEqual);

    for a in INTS {
        for b in INTS {
            let expected = match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            let args = [nint(a), nint(b)];
            let mut vm = Vm::new(&registry, &eq.constants);
            assert_eq!(call(&mut vm, &eq, &args), Some(Value::Bool(expected)), "{a:?} == {b:?}");
            let mut vm = Vm::new(&registry, &ne.constants);
            assert_eq!(call(&mut vm, &ne, &args), Some(Value::Bool(!expected)), "{a:?} != {b:?}");
        }
    }
}

#[test]
fn same_operand_equality() {
    let registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let body = [ast.ret(Some(ast.binary(ast.ident("a"), BinaryOp::Equal, ast.ident("a"))))];
    let decl = FunctionDecl::new("f", primitives::BOOL).param("a", nullable_int);
    let module = common::compile(&registry, &decl, &body);

    for a in INTS {
        let mut vm = Vm::new(&registry, &module.constants);
        assert_eq!(call(&mut vm, &module, &[nint(a)]), Some(Value::Bool(true)));
    }
}

#[test]
fn three_valued_and_or_truth_tables() {
    let registry = TypeRegistry::with_primitives();
    let nullable_bool = registry.nullable_of(primitives::BOOL).unwrap();
    let and = binary_function(&registry, nullable_bool, nullable_bool, BinaryOp::BitwiseAnd);
    let or = binary_function(&registry, nullable_bool, nullable_bool, BinaryOp::BitwiseOr);

    for a in BOOLS {
        for b in BOOLS {
            let expected_and = match (a, b) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            };
            let expected_or = match (a, b) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            };
            let args = [nbool(a), nbool(b)];
            let mut vm = Vm::new(&registry, &and.constants);
            assert_eq!(call(&mut vm, &and, &args), Some(nbool(expected_and)), "{a:?} & {b:?}");
            let mut vm = Vm::new(&registry, &or.constants);
            assert_eq!(call(&mut vm, &or, &args), Some(nbool(expected_or)), "{a:?} | {b:?}");
        }
    }
}

#[test]
fn sum_with_missing_operand_has_no_value() {
    let registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let add = binary_function(&registry, nullable_int, nullable_int, BinaryOp::Add);

    let mut vm = Vm::new(&registry, &add.constants);
    assert_eq!(call(&mut vm, &add, &[nint(Some(5)), nint(None)]), Some(nint(None)));
    assert_eq!(call(&mut vm, &add, &[nint(Some(5)), nint(Some(6))]), Some(nint(Some(11))));
}

#[test]
fn null_or_true_is_true() {
    let registry = TypeRegistry::with_primitives();
    let nullable_bool = registry.nullable_of(primitives::BOOL).unwrap();
    let or = binary_function(&registry, nullable_bool, nullable_bool, BinaryOp::BitwiseOr);

    let mut vm = Vm::new(&registry, &or.constants);
    assert_eq!(
        call(&mut vm, &or, &[nbool(None), nbool(Some(true))]),
        Some(nbool(Some(true)))
    );
}

#[test]
fn three_valued_with_null_literal() {
    let registry = TypeRegistry::with_primitives();
    let nullable_bool = registry.nullable_of(primitives::BOOL).unwrap();
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    // bool? f(bool? a) { return a & null; }
    let body = [ast.ret(Some(ast.binary(ast.ident("a"), BinaryOp::BitwiseAnd, ast.null())))];
    let decl = FunctionDecl::new("f", nullable_bool).param("a", nullable_bool);
    let module = common::compile(&registry, &decl, &body);

    let mut vm = Vm::new(&registry, &module.constants);
    assert_eq!(call(&mut vm, &module, &[nbool(Some(false))]), Some(nbool(Some(false))));
    assert_eq!(call(&mut vm, &module, &[nbool(Some(true))]), Some(nbool(None)));
    assert_eq!(call(&mut vm, &module, &[nbool(None)]), Some(nbool(None)));
}

#[test]
fn ordering_with_missing_operand_is_false() {
    let registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let less = binary_function(&registry, nullable_int, primitives::BOOL, BinaryOp::Less);

    let mut vm = Vm::new(&registry, &less.constants);
    assert_eq!(call(&mut vm, &less, &[nint(Some(1)), nint(Some(2))]), Some(Value::Bool(true)));
    assert_eq!(call(&mut vm, &less, &[nint(None), nint(Some(2))]), Some(Value::Bool(false)));
    assert_eq!(call(&mut vm, &less, &[nint(Some(1)), nint(None)]), Some(Value::Bool(false)));
}

#[test]
fn mixed_operands_lift_the_plain_side() {
    let registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    // int? f(int? a, int b) { return a * b; }
    let body = [ast.ret(Some(ast.binary(ast.ident("a"), BinaryOp::Mul, ast.ident("b"))))];
    let decl = FunctionDecl::new("f", nullable_int)
        .param("a", nullable_int)
        .param("b", primitives::INT32);
    let module = common::compile(&registry, &decl, &body);

    let mut vm = Vm::new(&registry, &module.constants);
    assert_eq!(call(&mut vm, &module, &[nint(Some(6)), int(7)]), Some(nint(Some(42))));
    assert_eq!(call(&mut vm, &module, &[nint(None), int(7)]), Some(nint(None)));
}

#[test]
fn operands_run_left_to_right_before_any_check() {
    let mut registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let first = registry.add_function("first", &[], nullable_int);
    let second = registry.add_function("second", &[], primitives::INT32);
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let body = [ast.ret(Some(ast.binary(
        ast.call("first", &[]),
        BinaryOp::Add,
        ast.call("second", &[]),
    )))];
    let decl = FunctionDecl::new("f", nullable_int);
    let module = common::compile(&registry, &decl, &body);

    let log = CallLog::default();
    let mut vm = Vm::new(&registry, &module.constants);
    let l = log.clone();
    vm.bind(first, move |_| {
        l.push("first");
        Value::none()
    });
    let l = log.clone();
    vm.bind(second, move |_| {
        l.push("second");
        int(3)
    });

    assert_eq!(call(&mut vm, &module, &[]), Some(nint(None)));
    assert_eq!(log.entries(), vec!["first", "second"]);
}

#[test]
fn unwrapped_source_is_evaluated_once() {
    let mut registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let next = registry.add_function("next", &[], nullable_int);
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    // bool f() { return next() == 3; }
    let body = [ast.ret(Some(ast.binary(ast.call("next", &[]), BinaryOp::Equal, ast.int(3))))];
    let module = common::compile(&registry, &FunctionDecl::new("f", primitives::BOOL), &body);

    let counter = Counter::default();
    let mut vm = Vm::new(&registry, &module.constants);
    let c = counter.clone();
    vm.bind(next, move |_| nint(Some(c.bump() as i64 + 3)));

    assert_eq!(call(&mut vm, &module, &[]), Some(Value::Bool(true)));
    assert_eq!(counter.get(), 1);
    assert_eq!(call(&mut vm, &module, &[]), Some(Value::Bool(false)));
    assert_eq!(counter.get(), 2);
}

#[test]
fn lifted_unary_operators() {
    let registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let nullable_bool = registry.nullable_of(primitives::BOOL).unwrap();
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);

    let neg = common::compile(
        &registry,
        &FunctionDecl::new("neg", nullable_int).param("a", nullable_int),
        &[ast.ret(Some(ast.unary(UnaryOp::Neg, ast.ident("a"))))],
    );
    let not = common::compile(
        &registry,
        &FunctionDecl::new("not", nullable_bool).param("a", nullable_bool),
        &[ast.ret(Some(ast.unary(UnaryOp::LogicalNot, ast.ident("a"))))],
    );

    let mut vm = Vm::new(&registry, &neg.constants);
    assert_eq!(call(&mut vm, &neg, &[nint(Some(4))]), Some(nint(Some(-4))));
    assert_eq!(call(&mut vm, &neg, &[nint(None)]), Some(nint(None)));
    let mut vm = Vm::new(&registry, &not.constants);
    assert_eq!(call(&mut vm, &not, &[nbool(Some(true))]), Some(nbool(Some(false))));
    assert_eq!(call(&mut vm, &not, &[nbool(None)]), Some(nbool(None)));
}

#[test]
fn lifted_primitive_conversion() {
    let registry = TypeRegistry::with_primitives();
    let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
    let nullable_double = registry.nullable_of(primitives::DOUBLE).unwrap();
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let module = common::compile(
        &registry,
        &FunctionDecl::new("f", nullable_double).param("a", nullable_int),
        &[ast.ret(Some(ast.ident("a")))],
    );

    let mut vm = Vm::new(&registry, &module.constants);
    assert_eq!(
        call(&mut vm, &module, &[nint(Some(2))]),
        Some(Value::some(Value::Double(2.0)))
    );
    assert_eq!(call(&mut vm, &module, &[nint(None)]), Some(Value::none()));
}

#[test]
fn lifted_user_defined_conversion() {
    let mut registry = TypeRegistry::with_primitives();
    let meters = registry.add_struct("Meters", &[("Value", primitives::DOUBLE)]);
    let feet = registry.add_struct("Feet", &[("Value", primitives::DOUBLE)]);
    let to_feet = registry.add_conversion(meters, feet, true);
    let nullable_meters = registry.nullable_of(meters).unwrap();
    let nullable_feet = registry.nullable_of(feet).unwrap();

    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let module = common::compile(
        &registry,
        &FunctionDecl::new("f", nullable_feet).param("m", nullable_meters),
        &[ast.ret(Some(ast.ident("m")))],
    );

    let counter = Counter::default();
    let mut vm = Vm::new(&registry, &module.constants);
    let c = counter.clone();
    vm.bind(to_feet, move |args| {
        c.bump();
        match &args[0] {
            Value::Struct(fields) => match fields[0] {
                Value::Double(m) => Value::Struct(vec![Value::Double(m * 2.0)]),
                _ => Value::Null,
            },
            _ => Value::Null,
        }
    });

    let two = Value::Struct(vec![Value::Double(2.0)]);
    assert_eq!(
        call(&mut vm, &module, &[Value::some(two)]),
        Some(Value::some(Value::Struct(vec![Value::Double(4.0)])))
    );
    assert_eq!(call(&mut vm, &module, &[Value::none()]), Some(Value::none()));
    // The conversion runs only when there is a value.
    assert_eq!(counter.get(), 1);
}
