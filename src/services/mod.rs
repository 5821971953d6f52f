//! Service layer: coverage measurement, the quality gate and the
//! generation controller that composes them.

pub mod context;
pub mod coverage_matrix;
pub mod generation_controller;
pub mod quality_gate;
pub mod retry;

pub use context::{build_context, EDGE_CASE_QUERY};
pub use coverage_matrix::{CoverageMatrixBuilder, MeasuredTest, SuiteMeasurement};
pub use generation_controller::GenerationController;
pub use quality_gate::{GateIssue, GateReport, QualityGate};
pub use retry::RetryPolicy;
