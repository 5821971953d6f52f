pub mod candidate;
pub mod config;
pub mod coverage;
pub mod session;
pub mod source_unit;

pub use candidate::{CandidateStatus, CandidateTest, TestCorpus, TestOrigin};
pub use config::{
    ArtifactConfig, Config, EmbeddingConfig, EmbeddingProviderKind, ExecutorConfig,
    GenerationConfig, LoggingConfig, RetryConfig, SynthesisConfig,
};
pub use coverage::{CoverageMatrix, CoverageRow, ExecutionFailure, ExecutionOutcome, UncoveredLine};
pub use session::{
    ControllerState, FailureKind, FailureRecord, GateState, GenerationSession, SessionOutcome,
    SessionStatus, TransitionEvent, TransitionKind, WorkingCandidate,
};
pub use source_unit::{AddressableLine, CommentSyntax, SourceUnit, DEFAULT_MODULE_NAME};
