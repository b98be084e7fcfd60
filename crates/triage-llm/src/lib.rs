//! Chat model access: an OpenAI-compatible client and the structured-output
//! coercion every classifier goes through.

pub mod openai;
pub mod structured;

pub use openai::OpenAiChatModel;
pub use structured::{generate_structured, parse_structured};
