pub mod archiver;
pub mod backup_config;
pub mod bundle;
pub mod collector;
pub mod job;
pub mod outcome;
pub mod result_error;
pub mod retention;
pub mod runner;
pub mod validate;
