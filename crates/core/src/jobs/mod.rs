pub mod domain;
pub mod infrastructure;
pub mod job_orchestrator;
pub mod submission_validator;
