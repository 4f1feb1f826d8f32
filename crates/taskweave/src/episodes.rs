//! Self-contained exercises that compose the pipeline services into one reported answer.
//!
//! Every episode fetches its input, runs it through LLM and storage stages and finally
//! reports the result to headquarters under its own task name.
pub mod censorship;
pub mod connections;
pub mod database;
pub mod recalibration;
pub mod robot;
pub mod robotid;
pub mod softo;
pub mod testimonials;
pub mod vectors;
pub mod whereabouts;
