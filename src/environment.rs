use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Shared handle to one scope. Blocks, call frames and every closure
/// created inside them hold these, so a scope lives as long as its
/// longest‑lived holder.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Root scope, wrapped for sharing.
    pub fn new_global() -> EnvRef {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Child scope of `enclosing`, wrapped for sharing.
    pub fn new_child(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self::with_enclosing(Rc::clone(enclosing))))
    }

    /// Binds `name` in this scope, shadowing any outer binding and
    /// overwriting an existing one here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Searches this scope and then each enclosing one.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined_variable(name))
        }
    }

    /// Updates the nearest existing binding. Never creates one.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined_variable(name))
        }
    }

    /// Walks exactly `distance` enclosing links from `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let next = current.borrow().enclosing.clone()?;
            current = next;
        }
        Some(current)
    }

    /// Reads `name` from the scope `distance` hops out, without searching.
    pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value> {
        debug!("get_at '{}' distance {}", name.lexeme, distance);

        Self::ancestor(env, distance)
            .and_then(|scope| scope.borrow().values.get(&name.lexeme).cloned())
            .ok_or_else(|| undefined_variable(name))
    }

    /// Writes `name` in the scope `distance` hops out, without searching.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<()> {
        debug!("assign_at '{}' distance {}", name.lexeme, distance);

        let scope = Self::ancestor(env, distance).ok_or_else(|| undefined_variable(name))?;
        scope.borrow_mut().values.insert(name.lexeme.clone(), value);
        Ok(())
    }

    /// Whether this scope itself (not an ancestor) binds `name`.
    pub fn contains_local(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

fn undefined_variable(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}
