//! External-capability clients: HTTP embedding provider and text
//! generation, plus prompt assembly and structured-result shaping.
//!
//! Generation of natural-language answers and checklists happens outside
//! this process; this crate only assembles prompts from evidence, forwards
//! them, and validates what comes back.

mod error;
pub use error::AiError;

mod embedding;
pub use embedding::{Embedder, HttpEmbedder};

mod generate;
pub use generate::{Card, Generator, HttpGenerator, is_failure_marker, shape_card};

mod prompt;
pub use prompt::{answer_prompt, card_prompt};
