//! Agent-side resolution pipeline.
//!
//! Turns a buyer's free-text request into grounding text for the seller and
//! guide dialogues:
//! 1. **Store resolution** (`resolver::store`) - directory lookup through the
//!    query oracle, memoized per session
//! 2. **Inventory resolution** (`resolver::inventory`) - schema-aware lookup
//!    with a sequential fallback waterfall, memoized per session
//! 3. **Formatting** - `mall_core::summary` renders the result as opaque text
//!
//! # Key Types
//!
//! - `ResolutionRuntime` - facade used by the transport layer (see `runtime`)
//! - `LlmClient` - pluggable completion trait (OpenAI/Anthropic/Ollama)
//! - `LlmTextToQuery` - LLM-backed text-to-SQL oracle
//! - `ScriptedOracle` - deterministic oracle double
//!
//! The LLM only translates. Store choice, fallback order and price bands are
//! decided here, deterministically.

pub mod decomposer;
pub mod instructions;
pub mod llm;
pub mod prompts;
pub mod resolver;
pub mod runtime;
pub mod scripted;
pub mod translator;

pub use runtime::ResolutionRuntime;
pub use scripted::ScriptedOracle;
