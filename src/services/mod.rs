pub mod anxiety;
pub mod artifacts;
pub mod difficulty;
pub mod emotion;
pub mod fingerprint;
pub mod generators;
pub mod grading;
pub mod llm_provider;
pub mod remedial;
