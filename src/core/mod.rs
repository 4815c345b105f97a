//! 核心编排层：错误与恢复、阶段与结果、后端调用审计、状态机、意图队列

pub mod actuator;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod recovery;
pub mod state;

pub use error::{ErrorKind, OrchestratorError};
pub use orchestrator::Orchestrator;
pub use queue::{Intent, IntentQueue, IntentReply, IntentTicket, QueueError};
pub use recovery::{Disposition, RecoveryPolicy};
pub use state::{Failure, ManipulationIntent, ManipulationOutcome, OutcomeWarning, Phase};
