//! BDD step definitions for hostwatch service

pub mod notifier_steps;
pub mod sampler_steps;
