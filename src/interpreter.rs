//! Tree‑walking evaluator.
//!
//! The active scope is threaded through [`Interpreter::execute`] and
//! [`Interpreter::evaluate_in`] as an explicit `&EnvRef` argument instead of
//! living in a mutable "current environment" field, so a block's scope is
//! gone the moment its call returns, whichever way it returns.
//!
//! `return` travels as [`Flow::Return`] through block/if/while execution
//! until the function call that owns the frame turns it into the call's
//! result. Errors travel separately as `Err(LoxError)`.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{LoxFunction, NativeFunction};
use crate::class::{LoxClass, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell off the end; continue with the next statement.
    Normal,
    /// A `return` is unwinding to the enclosing call.
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter printing to stdout, with the native `clock`
    /// defined in its globals.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates an interpreter whose `print` statements write to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Environment::new_global();

        debug!("Defining native function 'clock'");

        globals
            .borrow_mut()
            .define("clock", Value::NativeFunction(Rc::new(NativeFunction::clock())));

        Self {
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Merges a resolver side table. Entries from earlier programs (previous
    /// REPL lines) stay valid because node ids are never reused.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Recording {} resolved reference(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Runs a program's top‑level statements in the global scope. The first
    /// runtime error aborts the remaining statements.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let globals = Rc::clone(&self.globals);
        let result = statements
            .iter()
            // Top-level `return` is rejected by the resolver.
            .try_for_each(|stmt| self.execute(stmt, &globals).map(|_| ()));

        // Output printed before a runtime error still reaches the sink.
        self.out.flush()?;
        result?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Evaluates a lone expression in the global scope.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        let globals = Rc::clone(&self.globals);
        self.evaluate_in(expr, &globals)
    }

    /// Runs `statements` with `env` as their scope.
    pub fn execute_block(&mut self, statements: &[Stmt], env: &EnvRef) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt, env)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt, env: &EnvRef) -> Result<Flow> {
        match stmt {
            Stmt::Block(statements) => {
                debug!("Entering block with {} statements", statements.len());
                let scope = Environment::new_child(env);
                self.execute_block(statements, &scope)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Defining class '{}'", name.lexeme);

                let superclass: Option<Rc<LoxClass>> = match superclass {
                    Some(expr) => match self.evaluate_in(expr, env)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            let token = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(LoxError::runtime(token, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                env.borrow_mut().define(&name.lexeme, Value::Nil);

                // Methods of a subclass close over a scope binding `super`.
                let method_env = match &superclass {
                    Some(class) => {
                        let scope = Environment::new_child(env);
                        scope
                            .borrow_mut()
                            .define("super", Value::Class(Rc::clone(class)));
                        scope
                    }
                    None => Rc::clone(env),
                };

                let methods: HashMap<String, Rc<LoxFunction>> = methods
                    .iter()
                    .map(|decl| {
                        let function = LoxFunction::new(
                            Rc::clone(decl),
                            Rc::clone(&method_env),
                            decl.name.lexeme == INITIALIZER,
                        );
                        (decl.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme.clone(), superclass, methods);
                env.borrow_mut()
                    .define(&name.lexeme, Value::Class(Rc::new(class)));

                info!("Class '{}' defined", name.lexeme);
                Ok(Flow::Normal)
            }

            Stmt::Expression(expr) => {
                self.evaluate_in(expr, env)?;
                Ok(Flow::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                // The current scope becomes the closure.
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(env), false);
                env.borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_in(condition, env)?.is_truthy() {
                    self.execute(then_branch, env)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt, env)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::Print(expr) => {
                let value = self.evaluate_in(expr, env)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate_in(expr, env)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate_in(expr, env)?,
                    None => Value::Nil,
                };
                debug!("Variable '{}' defined with value: {}", name.lexeme, value);
                env.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::While { condition, body } => {
                while self.evaluate_in(condition, env)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
        }
    }

    /// Evaluates an expression in scope `env`.
    pub fn evaluate_in(&mut self, expr: &Expr, env: &EnvRef) -> Result<Value> {
        match expr {
            Expr::Assign { id, name, value } => {
                let value = self.evaluate_in(value, env)?;
                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(env, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }
                Ok(value)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate_in(left, env)?;
                let right = self.evaluate_in(right, env)?;
                binary(operator, left, right)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate_in(callee, env)?;

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate_in(argument, env)?);
                }

                self.call_value(&callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate_in(object, env)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Grouping(inner) => self.evaluate_in(inner, env),

            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate_in(left, env)?;

                let short_circuit = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate_in(right, env)
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate_in(object, env)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate_in(value, env)?;
                instance.set(name, value.clone());
                Ok(value)
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method, env),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword, env),

            Expr::Unary { operator, right } => {
                let right = self.evaluate_in(right, env)?;
                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name, env),
        }
    }

    /// Resolved references hop straight to their scope; anything the resolver
    /// left out of the table is looked up in the globals.
    fn look_up_variable(&self, id: ExprId, name: &Token, env: &EnvRef) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(env, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
        env: &EnvRef,
    ) -> Result<Value> {
        let distance = self.locals.get(&id).copied().ok_or_else(|| {
            LoxError::runtime(keyword, "Can't use 'super' in a class with no superclass.")
        })?;

        let Value::Class(superclass) = Environment::get_at(env, distance, keyword)? else {
            return Err(LoxError::runtime(keyword, "Superclass must be a class."));
        };

        // `this` is bound one scope inside the one binding `super`.
        let this_token = Token::new(TokenType::THIS, "this", keyword.line);
        let Value::Instance(object) =
            Environment::get_at(env, distance.saturating_sub(1), &this_token)?
        else {
            return Err(LoxError::runtime(keyword, "Can't use 'this' outside of a class."));
        };

        let Some(found) = superclass.find_method(&method.lexeme) else {
            return Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            ));
        };

        Ok(Value::Function(Rc::new(found.bind(object))))
    }

    /// Checks callability and arity once, for every kind of callable.
    fn call_value(&mut self, callee: &Value, paren: &Token, arguments: Vec<Value>) -> Result<Value> {
        let Some(callable) = callee.as_callable() else {
            return Err(LoxError::runtime(paren, "Can only call functions and classes."));
        };

        if arguments.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            ));
        }

        debug!("Calling {} with {} argument(s)", callee, arguments.len());

        callable.call(self, arguments)
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::PLUS => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{}{}", a, b))),
            _ => Err(LoxError::runtime(
                operator,
                "Operands must be two numbers or two strings.",
            )),
        },
        TokenType::MINUS => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(a - b))
        }
        TokenType::STAR => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(a * b))
        }
        // IEEE semantics: x / 0 is ±inf or NaN, not an error.
        TokenType::SLASH => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(a / b))
        }
        TokenType::GREATER => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a > b))
        }
        TokenType::GREATER_EQUAL => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a >= b))
        }
        TokenType::LESS => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a < b))
        }
        TokenType::LESS_EQUAL => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(a <= b))
        }
        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),
        _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
    }
}
