#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_literal_bound,
    clippy::unused_self,
    clippy::cast_precision_loss
)]

//! Helios: a natural-language front end for an ERP database.
//!
//! A request is routed by an intent classifier to one of four domain agents
//! (sales, finance, inventory, analytics). Each agent runs a bounded
//! think/act/observe loop against a completion service, calling named tools
//! that read or write the ERP store, until it produces a final answer.

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod memory;
pub mod observability;
pub mod providers;
pub mod sessions;
pub mod store;
pub mod tools;

pub use config::Config;
pub use dispatch::{DispatchRequest, DispatchResponse, Dispatcher};

