//! # Domain Layer (Inner Hexagon)
//!
//! Pure types and functions for contract simulation.
//! NO I/O, NO async.

pub mod entities;
pub mod services;
pub mod transactions;
pub mod value_objects;

pub use entities::*;
pub use services::*;
pub use transactions::*;
pub use value_objects::*;
