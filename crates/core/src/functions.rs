//! Prompt functions: named callables that templates can invoke.
//!
//! A template expression such as `{{getWeather 'Seattle'}}` is resolved by
//! handing the name and arguments to a [`PromptFunctions`] implementation.
//! Resolution failures are fatal for the render call that triggered them.

use crate::error::ResolutionError;
use crate::state::TurnState;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Resolves named functions referenced inside templates.
#[async_trait]
pub trait PromptFunctions: Send + Sync {
    /// Whether a function with this name can be invoked.
    fn has_function(&self, name: &str) -> bool;

    /// Invoke a function and return its raw result.
    async fn invoke(
        &self,
        name: &str,
        args: &[String],
        state: &dyn TurnState,
    ) -> Result<Value, ResolutionError>;
}

/// A single named function.
#[async_trait]
pub trait PromptFunction: Send + Sync {
    async fn call(&self, args: &[String], state: &dyn TurnState) -> Result<Value, ResolutionError>;
}

/// Adapter so plain closures can be registered as functions.
struct SyncFunction<F>(F);

#[async_trait]
impl<F> PromptFunction for SyncFunction<F>
where
    F: Fn(&[String], &dyn TurnState) -> Result<Value, ResolutionError> + Send + Sync,
{
    async fn call(&self, args: &[String], state: &dyn TurnState) -> Result<Value, ResolutionError> {
        (self.0)(args, state)
    }
}

/// A registry of named prompt functions.
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn PromptFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a function. Replaces any existing function with the same name.
    pub fn register(&mut self, name: impl Into<String>, function: Box<dyn PromptFunction>) {
        self.functions.insert(name.into(), function);
    }

    /// Register a synchronous closure.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[String], &dyn TurnState) -> Result<Value, ResolutionError> + Send + Sync + 'static,
    {
        self.register(name, Box::new(SyncFunction(f)));
    }

    /// List all registered function names.
    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[async_trait]
impl PromptFunctions for FunctionRegistry {
    fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    async fn invoke(
        &self,
        name: &str,
        args: &[String],
        state: &dyn TurnState,
    ) -> Result<Value, ResolutionError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| ResolutionError::FunctionNotFound(name.to_string()))?;
        function.call(args, state).await
    }
}
