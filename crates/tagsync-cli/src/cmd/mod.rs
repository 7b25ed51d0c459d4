pub mod batch;
pub mod classify;
pub mod config;
pub mod facts;
pub mod init;
pub mod reconcile;
pub mod rules;
