//! PostgreSQL repository modules

pub mod run;
