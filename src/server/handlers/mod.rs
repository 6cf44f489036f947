// http request handlers

pub mod upload;
