//! Application layer containing the business logic orchestration.
//!
//! `LoanCoordinator` is the entry point for lending and returning books. It runs
//! each operation as one unit of work so the loan records and the stock counters
//! never disagree. The catalog, partner and staff services cover the bookkeeping
//! around it.

pub mod catalog;
pub mod coordinator;
pub mod members;
pub mod staff;
