// Life of a message:
// 1. A line arrives on the SBS-1 feed socket
// 2. Parse it into a transmission message, drop it if malformed
// 3. Queue it for the single writer task
// 4. The writer folds it into the aircraft's record:
//     - Existing aircraft: append changed values to its series
//     - New aircraft: look up the tail number, create the record
// 5. The eviction sweep archives aircraft that went quiet and removes them
//
// System components:
//  - Keyed storage (B-tree, or hash map)
//  - Feed reader
//  - Writer queue
//  - Eviction sweep and SQLite archive
//  - Status API

pub mod aircraft;
pub mod config;
pub mod eviction;
pub mod feed;
pub mod lookup;
pub mod queue;
pub mod simulation;
pub mod status;
pub mod storage;

#[cfg(test)]
mod e2e_tests;
