//! Agent pipeline - directive recognition through gated execution
//!
//! One user turn flows through this module:
//!
//! 1. **Parsing** (`parser`) - recover a `{tool, arguments}` directive from
//!    unreliable model output
//! 2. **Inference** (`infer`) - deterministic fallback/override against the
//!    user's own prompt
//! 3. **Policy** (`policy`) - gate the directive against user security
//!    settings
//! 4. **Normalization** (`normalize`) - canonicalize arguments per tool
//! 5. **Dispatch** (`dispatch`) - one non-retried native executor call
//! 6. **Orchestration** (`turn`) - the full two-model-call turn state machine

pub mod directive;
pub mod dispatch;
pub mod events;
pub mod infer;
pub mod normalize;
pub mod parser;
pub mod policy;
pub mod turn;

pub use directive::{Directive, DirectiveError, ToolId};
pub use dispatch::ActionDispatcher;
pub use events::{AgentTurnResult, ExecutionStatus, ToolExecutionEvent};
pub use infer::IntentInferencer;
pub use parser::DirectiveParser;
pub use policy::{GateDecision, PolicyGate};
pub use turn::{NominalSupervisor, RuntimeHealth, RuntimeSupervisor, TurnOrchestrator};
