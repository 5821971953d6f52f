//! Synthesis context assembly.

use crate::domain::models::GenerationSession;
use crate::domain::ports::SynthesisContext;

/// Query text used to retrieve exemplar tests from the redundancy index.
pub const EDGE_CASE_QUERY: &str = "Unit test that tests an edge case";

/// Snapshot the session's current coverage state as synthesis context.
pub fn build_context(session: &GenerationSession, exemplars: Vec<String>) -> SynthesisContext {
    SynthesisContext {
        module_name: session.source.module_name().to_string(),
        source: session.source.content().to_string(),
        uncovered: session.matrix.uncovered(),
        matrix_text: session.matrix.render_text(),
        exemplars,
    }
}
