//! Domain layer: library entities, the fine rule and the storage ports.

pub mod book;
pub mod fine;
pub mod loan;
pub mod partner;
pub mod ports;
pub mod user;
