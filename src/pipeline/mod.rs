//! The event pipeline.
//!
//! Every inbound webhook flows through:
//! 1. `EventProcessor::process` — validation and integration lookup
//! 2. `normalizer::normalize` — canonical event extraction
//! 3. `filter::passes_filters` — declarative per-rule predicates
//! 4. `guards::GuardService` — rate limit and cooldown
//! 5. `dispatch::ActionDispatcher` — the actual side effect
//!
//! Rules are independent: one rule's failure never aborts its siblings.

pub mod filter;
pub mod guards;
pub mod processor;
pub mod types;
