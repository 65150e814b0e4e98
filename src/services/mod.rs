pub mod approval;
pub mod approval_command;
pub mod coordinator;
pub mod detector;
pub mod dispatcher;
pub mod extractor;
pub mod inbound_guard;
pub mod messenger;
pub mod pipeline;
pub mod rateio;
pub mod staging;

pub use approval::ApprovalOutcome;
pub use approval_command::{interpret, Interpretation};
pub use dispatcher::{dispatch, DispatchOutcome};
pub use extractor::{DisabledExtractor, OpenAiExtractor, StructuredExtractor};
pub use inbound_guard::{GuardDecision, InboundGuard};
pub use messenger::{MessageSender, RecordingSender};
pub use pipeline::{OutcomeKind, PipelineOutcome, PreApontamentoPipeline};
pub use staging::{MemoryStagingStore, PgStagingStore, StagingError, StagingStore, UserRecord};
