//! Task contract parsing and validation.
//!
//! A task contract describes what an agent was asked to do and how its
//! output is verified. Legacy single-string context is normalized into a
//! list of context entries here, at construction time.

mod parser;
mod schema;

pub use parser::{
    normalize_legacy_context, ContextEntry, ContractError, TaskContract, DEFAULT_COUNCIL_SIZE,
    LEGACY_CONTEXT_ID, USER_MESSAGE,
};
pub use schema::{is_valid_contract, validate_contract_schema};
