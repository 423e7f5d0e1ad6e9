pub mod browser;
pub mod categorize;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod harness;
pub mod locate;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod store;
pub mod timestamp;
pub mod writer;
