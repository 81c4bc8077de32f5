//! End-to-end tests through the public storage and pipeline APIs.
//!
//! Each test file covers a specific scenario, using deterministic inputs
//! to verify complete behavior rather than individual functions.

#![cfg(test)]

mod helpers;

mod test_delete_reinsert;
mod test_model_equivalence;
mod test_pipeline;
mod test_sample_scenario;
mod test_sentinel_key;
mod test_simulation;
mod test_upsert;
