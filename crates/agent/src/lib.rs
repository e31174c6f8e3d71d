//! The conversation loop — the heart of Toolpilot.
//!
//! One user turn follows an **Ask → Act → Observe** cycle:
//!
//! 1. **Append** the user's prompt to the conversation
//! 2. **Ask** the provider, sending the whole conversation plus tool definitions
//! 3. **If tool calls**: run them in order, append each result, go back to 2
//! 4. **If text only**: that text is the answer for the turn
//!
//! The cycle ends at the first text-only reply or when the iteration cap
//! is hit.

pub mod loop_runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS, MAX_ITERATIONS_REACHED};
