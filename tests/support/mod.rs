// shared test helpers
#![allow(dead_code)] // helpers are shared across multiple integration test crates

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chunkyard::{
    config::{AppConfig, ServerConfig, UploadConfig},
    server::create_app,
};
use std::path::{Path, PathBuf};

pub const BOUNDARY: &str = "----chunkyard-boundary";

/// one multipart field
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

pub fn file<'a>(filename: &'a str, content: &'a [u8]) -> Part<'a> {
    Part::File(filename, content)
}

pub fn sub_folder(value: &str) -> Part<'_> {
    Part::Text("subFolder", value)
}

pub fn base_config(upload_dir: &Path) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            upload_dir: upload_dir.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn upload_config(upload_dir: &Path, upload: UploadConfig) -> AppConfig {
    let mut config = base_config(upload_dir);
    config.upload = upload;
    config
}

pub fn app(config: AppConfig) -> axum::Router {
    create_app(config)
}

pub fn multipart_body(boundary: &str, parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();

    for (index, part) in parts.iter().enumerate() {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(filename, content) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file{index}\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                body.extend_from_slice(content);
            }
        }
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

pub fn multipart_request(boundary: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    multipart_request(BOUNDARY, multipart_body(BOUNDARY, parts))
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// every regular file under `dir`, relative to it, sorted
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }

    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}
