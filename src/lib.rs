//! yatube: posts, groups, comments and author follows over PostgreSQL.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
