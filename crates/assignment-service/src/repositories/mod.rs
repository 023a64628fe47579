//! Repository layer for the assignment service.
//!
//! Typed access to the document store following the
//! Handler -> Repository -> Store layering.

pub mod assignments;

pub use assignments::AssignmentRepository;
