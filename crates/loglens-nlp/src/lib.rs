//! # LogLens NLP
//!
//! Translates natural-language questions about Azure Log Analytics data
//! into KQL.
//!
//! ## Features
//!
//! - **Lexical hints**: IPs, emails, status codes, time phrases and operator intent
//! - **Query catalog**: curated answers for common questions
//! - **Heuristic translation**: keyword-ranked table choice with default filters
//! - **Instruction overlay**: operator rules added to the AI prompt, reloadable at runtime
//! - **AI translation**: chat-completion delegate with validation and fallback
//!
//! ## Example
//!
//! ```rust,no_run
//! use loglens_nlp::{InstructionStore, Translator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let translator = Translator::new(InstructionStore::load("kql_instructions.yaml"));
//!     let kql = translator.translate("failed logins in the last hour", &[]).await;
//!     println!("{}", kql);
//! }
//! ```

pub mod catalog;
pub mod chat;
pub mod delegate;
pub mod engine;
pub mod error;
pub mod heuristic;
pub mod hints;
pub mod overlay;
pub mod prompt;

pub use catalog::{CatalogEntry, COMMON_TABLES, ENTRIES};
pub use chat::{ChatCompletion, ChatRequest, OpenAiChatClient, OpenAiChatClientBuilder};
pub use delegate::{AiDelegate, DelegateSettings};
pub use engine::{Translation, TranslationPath, Translator};
pub use error::{NlpError, Result};
pub use heuristic::{has_specific_intent, HeuristicPlan, TableSelection, TimeWindow};
pub use hints::{Aggregation, LexicalHints, RelativeTime, TimeUnit};
pub use overlay::{InstructionOverlay, InstructionStore, OverlaySnapshot, OverlayStatus};
