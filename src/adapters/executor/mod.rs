//! Test executor adapters.

pub mod python;
pub mod script;

pub use python::PythonTraceExecutor;
pub use script::{assemble_test_module, extract_test_methods, sanitize_test_body, test_method_name};
