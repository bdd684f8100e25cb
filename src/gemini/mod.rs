mod chat;
mod core;

pub use self::chat::{GeminiGateway, GeminiSession};
pub use self::core::{Content, Part, Role, generate_content, stream_generate_content};
