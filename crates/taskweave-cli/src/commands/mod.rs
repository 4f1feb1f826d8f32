pub mod ask;
pub mod episode;
pub mod version;
