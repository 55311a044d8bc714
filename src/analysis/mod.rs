pub mod pipeline;
pub mod prompts;
pub mod trigger;
