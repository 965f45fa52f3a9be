//! Shared helpers for the integration tests.
#![allow(dead_code)]

pub mod vm;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sharplower::prelude::*;
use sharplower::sharplower_compiler::ast::Stmt;

#[allow(unused_imports)]
pub use vm::{Value, Vm, VmError};

/// Compile one body, panicking with the diagnostics if it fails.
pub fn compile(registry: &TypeRegistry, decl: &FunctionDecl, body: &[Stmt<'_>]) -> CompiledModule {
    let result = compile_with(registry, CompilerOptions::default(), decl, body);
    assert!(
        result.is_success() && !result.module.functions.is_empty(),
        "compilation of '{}' failed:\n{}",
        decl.name,
        result.diagnostics
    );
    result.module
}

pub fn compile_with(
    registry: &TypeRegistry,
    options: CompilerOptions,
    decl: &FunctionDecl,
    body: &[Stmt<'_>],
) -> CompilationResult {
    let mut compilation = Compilation::new(registry).with_options(options);
    compilation.compile(decl, body);
    compilation.finish()
}

/// Run the first function of `module`, which must succeed.
pub fn call(vm: &mut Vm<'_>, module: &CompiledModule, args: &[Value]) -> Option<Value> {
    let function = &module.functions[0];
    vm.run(function, args)
        .unwrap_or_else(|err| panic!("'{}' failed: {err}\n{}", function.name, function.chunk))
}

pub fn int(v: i64) -> Value {
    Value::Int(v)
}

pub fn nint(v: Option<i64>) -> Value {
    Value::from_option(v.map(Value::Int))
}

pub fn nbool(v: Option<bool>) -> Value {
    Value::from_option(v.map(Value::Bool))
}

/// A call counter shared with a native.
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<usize>>);

impl Counter {
    pub fn bump(&self) -> usize {
        let n = self.0.get();
        self.0.set(n + 1);
        n
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// An ordered record of which natives ran.
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<&'static str>>>);

impl CallLog {
    pub fn push(&self, name: &'static str) {
        self.0.borrow_mut().push(name);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.borrow().clone()
    }
}
