pub mod jobs;
pub mod publishers;
pub mod qa;
pub mod questions;
pub mod search;
