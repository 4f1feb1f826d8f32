pub mod agent;
pub mod chunks;
pub mod config;
pub mod decode;
pub mod documents;
pub mod episodes;
pub mod errors;
pub mod filesystem;
pub mod graph;
pub mod headquarters;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod prompt_template;
pub mod providers;
pub mod telemetry;
pub mod vector;
