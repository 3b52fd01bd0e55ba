//! Shared protocol definitions for the assessment stream.
//! Keeping the wire shapes in a dedicated crate lets the store and the
//! session client agree on one closed event type without pulling in the
//! networking stack.

pub mod codec;
pub mod event;
pub mod insights;
pub mod run;
pub mod view;

pub use codec::{decode_frame, encode_event, DecodeError};
pub use event::{AssessEvent, EventKind, ProgressPayload, StatusPayload, SummaryMeta, SummaryPayload};
pub use insights::{Insights, QuestionAverage, RunTotal};
pub use run::{identity_key, RunRecord};
pub use view::{compare_question_ids, ProgressBoard, TerminalOutcome};
