mod core;
mod models;

pub use self::core::{
    CancelHandle, ChatBuilder, ChatState, ChatView, GREETING_FALLBACK, GREETING_PROMPT,
    PendingTurn, TurnOutcome, TutorChat, analysis_steps,
};
pub use self::models::{ChatMessage, ChatRole, LOST_CONNECTION_MESSAGE, StreamEvent, Transcript};
