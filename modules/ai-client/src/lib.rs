pub mod error;
pub mod openai;
pub mod tool;

pub use error::AiError;
pub use openai::{OpenAi, OpenAiHandle, StructuredOutput};
pub use tool::ToolDefinition;
