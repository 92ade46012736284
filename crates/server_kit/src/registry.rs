//! # Function Registry
//!
//! Owns every function of the process, wires each to the shared
//! [`FunctionContext`], and drives initialization and shutdown in
//! registration order.

use crate::error::FunctionError;
use crate::function::{Function, FunctionContext};
use crate::lifecycle::{FunctionLifecycle, FunctionStatus, ManagedFunction};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of [`FunctionRegistry::initialize_all`].
#[derive(Debug, Default)]
pub struct InitializationReport {
    /// Functions that initialized, whether or not they are running.
    pub initialized: Vec<String>,
    /// Functions that failed, with the reason.
    pub failed: Vec<(String, FunctionError)>,
}

impl InitializationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The set of functions running in one process.
///
/// Functions are kept in registration order. Lifecycle calls are made on a
/// copy of the list, so a function may look up others through the registry
/// while it transitions.
pub struct FunctionRegistry {
    ctx: FunctionContext,
    functions: RwLock<Vec<Arc<dyn ManagedFunction>>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    /// Creates an empty registry; every function registered later shares `ctx`.
    pub fn new(ctx: FunctionContext) -> Self {
        Self {
            ctx,
            functions: RwLock::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &FunctionContext {
        &self.ctx
    }

    /// Adds a function and declares its settings section.
    ///
    /// The function is not started; call [`initialize_all`](Self::initialize_all)
    /// or initialize the returned lifecycle directly.
    pub fn register<F: Function>(
        &self,
        function: F,
    ) -> Result<Arc<FunctionLifecycle<F>>, FunctionError> {
        let mut functions = self.functions.write();
        if functions.iter().any(|f| f.name() == function.name()) {
            return Err(FunctionError::DuplicateFunction(function.name().to_string()));
        }
        self.ctx.settings().register::<F::Settings>()?;

        let lifecycle = FunctionLifecycle::new(function, self.ctx.clone());
        functions.push(lifecycle.clone() as Arc<dyn ManagedFunction>);
        info!(function = %lifecycle.name(), "Function registered");
        Ok(lifecycle)
    }

    /// Initializes every registered function.
    ///
    /// A failing function is logged and reported; the remaining functions
    /// are still initialized.
    pub fn initialize_all(&self) -> InitializationReport {
        let mut report = InitializationReport::default();
        for function in self.snapshot() {
            match function.initialize() {
                Ok(()) => report.initialized.push(function.name().to_string()),
                Err(e) => {
                    error!(function = %function.name(), error = %e, "Function failed to initialize");
                    report.failed.push((function.name().to_string(), e));
                }
            }
        }
        info!(
            initialized = report.initialized.len(),
            failed = report.failed.len(),
            "Functions initialized"
        );
        report
    }

    /// Stops every function in reverse registration order.
    pub fn shutdown_all(&self) -> Vec<(String, FunctionError)> {
        let mut failures = Vec::new();
        for function in self.snapshot().into_iter().rev() {
            if let Err(e) = function.shutdown() {
                error!(function = %function.name(), error = %e, "Function failed to shut down");
                failures.push((function.name().to_string(), e));
            }
        }
        failures
    }

    /// Looks a function up by name.
    ///
    /// # Returns
    ///
    /// The function's type-erased handle, or [`FunctionError::NotFound`].
    pub fn get(&self, name: &str) -> Result<Arc<dyn ManagedFunction>, FunctionError> {
        self.functions
            .read()
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .ok_or_else(|| FunctionError::NotFound(name.to_string()))
    }

    /// Function names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.functions.read().iter().map(|f| f.name().to_string()).collect()
    }

    /// Status of every function, in registration order.
    pub fn status(&self) -> Vec<FunctionStatus> {
        self.functions.read().iter().map(|f| f.status()).collect()
    }

    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }

    // Lifecycle calls re-enter the settings source; never hold our lock across them.
    fn snapshot(&self) -> Vec<Arc<dyn ManagedFunction>> {
        self.functions.read().clone()
    }
}
