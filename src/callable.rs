//! Function values: the [`Callable`] capability, host-provided natives and
//! user functions with their captured closures.

use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{EnvRef, Environment};
use crate::error::Result;
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Anything a `Call` expression can invoke.
///
/// The interpreter checks `arguments.len() == arity()` before calling, so
/// implementations may index `arguments` freely.
pub trait Callable {
    fn arity(&self) -> usize;

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value>;
}

// ─────────────────────────────────────────────────────────────────────────
// Native functions
// ─────────────────────────────────────────────────────────────────────────

pub struct NativeFunction {
    name: &'static str,
    arity: usize,
    func: fn(&[Value]) -> Value,
}

impl NativeFunction {
    pub const fn new(name: &'static str, arity: usize, func: fn(&[Value]) -> Value) -> Self {
        Self { name, arity, func }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Seconds since the Unix epoch, with millisecond precision.
    pub fn clock() -> Self {
        Self::new("clock", 0, |_args| {
            Value::Number(Utc::now().timestamp_millis() as f64 / 1000.0)
        })
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, _interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        let result = (self.func)(&arguments);

        info!("Native function '{}' returned: {}", self.name, result);

        Ok(result)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────
// User functions
// ─────────────────────────────────────────────────────────────────────────

/// A function declaration paired with the environment it was declared in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    /// Set for methods named `init`: calling one always yields `this`.
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// A copy of this method whose closure gains one layer binding `this`.
    /// The unbound original is left untouched.
    pub fn bind(&self, instance: Rc<LoxInstance>) -> LoxFunction {
        debug!("Binding method '{}' to an instance", self.name());

        let environment = Environment::new_child(&self.closure);
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    fn bound_this(&self) -> Result<Value> {
        Environment::get_at(&self.closure, 0, &Token::synthetic("this"))
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        // Parent is the closure, never the caller's scope.
        let environment = Environment::new_child(&self.closure);
        {
            let mut frame = environment.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                debug!("Binding parameter '{}' to {}", param.lexeme, argument);
                frame.define(&param.lexeme, argument);
            }
        }

        let flow = interpreter.execute_block(&self.declaration.body, &environment)?;

        if self.is_initializer {
            return self.bound_this();
        }

        let result = match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        };

        info!("Function '{}' returned: {}", self.name(), result);

        Ok(result)
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
