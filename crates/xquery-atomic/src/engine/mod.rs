//! Evaluation support: contexts and errors, collations, regex translation and
//! the function library with its overload registry.
pub mod collation;
pub mod functions;
pub mod regex;
pub mod registry;
pub mod runtime;

pub use functions::default_function_registry;
pub use registry::{CallCtx, CompiledCall, FunctionRegistry, FunctionSignature};
