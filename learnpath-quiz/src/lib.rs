//! learnpath-quiz - grounded multiple-choice quizzes over cached resource content
//!
//! Questions are drafted by a chat model and kept only when their citation appears
//! verbatim in the content of the resource they claim. Failing drafts are regenerated a
//! bounded number of times and never stored.

mod engine;
mod error;
mod generator;
mod grounding;
mod snippets;

pub use engine::{GenerateRequest, QuizConfig, QuizEngine, SubmitRequest};
pub use error::{QuizError, Result};
pub use generator::{DraftQuestion, ModelQuestionGenerator, QuestionGenerator};
pub use snippets::{HttpSnippetStore, MemorySnippetStore, Snippet, SnippetStore, SnippetStoreConfig};
