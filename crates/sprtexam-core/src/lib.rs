//! sprtexam-core: SPRT decision engine, data model, and collaborator traits.
//!
//! An attempt accumulates a log-likelihood ratio statistic over its answers
//! and stops as soon as the statistic crosses one of two thresholds derived
//! from the configured error rates. Questions are drawn per difficulty level,
//! and attempts advance through the levels as they show mastery.

pub mod answer;
pub mod attempt;
pub mod boundary;
pub mod decision;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod progression;
pub mod report;
pub mod selector;
pub mod statistics;
pub mod traits;
