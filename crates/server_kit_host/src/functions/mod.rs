//! Functions bundled with the host.

pub mod greeter;

use anyhow::Result;
use server_kit::FunctionRegistry;

/// Registers every bundled function with `registry`.
pub fn register_all(registry: &FunctionRegistry) -> Result<()> {
    registry.register(greeter::Greeter)?;
    Ok(())
}
