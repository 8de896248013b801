//! Abstraction of a group of plants into the feasible regions of an aggregate.
//!
//! The general abstraction finds which power ranges a group of plants can supply jointly at one
//! instant. The temporal abstraction propagates these ranges over a planning horizon, taking each
//! plant's dynamic constraints into account.
pub mod general;
pub mod hole_detection;
pub mod temporal;

pub use general::GeneralAbstraction;
pub use temporal::TemporalAbstraction;
