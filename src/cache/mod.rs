pub mod dependency;
pub mod envelope;
