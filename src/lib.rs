// chunkyard: stage multipart file parts and merge them into one file

pub mod config;
pub mod pipeline;
pub mod server;
pub mod utils;
