// shared helpers

pub mod paths;
