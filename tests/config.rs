// configuration integration tests

mod support;

use axum::http::StatusCode;
use clap::Parser;
use figment::Jail;
use support::{app, file, upload_request};
use tempfile::TempDir;
use tower::ServiceExt;

use chunkyard::config::{load_config_from_file, load_configuration, Cli, MergeStrategy};
use std::fs;
use std::path::PathBuf;

fn load(cli: &Cli) -> figment::Result<chunkyard::config::AppConfig> {
    load_configuration(cli).map_err(|err| figment::Error::from(format!("{err:#}")))
}

#[test]
fn config_file_precedence_without_cli_flags() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[server]
host = "127.0.0.1"
port = 9001
upload_dir = "uploads"

[upload]
max_file_size = 4096
merge_strategy = "in_place"
"#,
        )?;

        let cli = Cli {
            config_file: Some(PathBuf::from("config.toml")),
            ..Default::default()
        };

        let config = load(&cli)?;
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.upload.max_file_size, 4096);
        assert_eq!(config.upload.merge_strategy, MergeStrategy::InPlace);
        assert_eq!(config.staging_dir(), PathBuf::from("uploads/.staging"));
        Ok(())
    });
}

#[test]
fn environment_overrides_file_and_cli_overrides_environment() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "chunkyard.toml",
            r#"
[server]
port = 9001
upload_dir = "uploads"

[upload]
max_file_size = 4096
cleanup_rejected = true
"#,
        )?;
        jail.set_env("CHUNKYARD_SERVER__PORT", "9002");
        jail.set_env("CHUNKYARD_UPLOAD__MAX_FILE_SIZE", "2048");
        jail.set_env("CHUNKYARD_UPLOAD__CLEANUP_REJECTED", "false");

        let cli = Cli {
            config_file: Some(PathBuf::from("chunkyard.toml")),
            upload_dir: Some(PathBuf::from("from-cli")),
            ..Default::default()
        };
        let config = load(&cli)?;

        assert_eq!(config.server.port, 9002);
        assert_eq!(config.upload.max_file_size, 2048);
        assert!(!config.upload.cleanup_rejected);
        assert_eq!(config.server.upload_dir, PathBuf::from("from-cli"));
        Ok(())
    });
}

#[test]
fn cli_flags_read_their_environment_variables() {
    Jail::expect_with(|jail| {
        jail.set_env("CHUNKYARD_PORT", "9100");
        jail.set_env("CHUNKYARD_UPLOAD_DIR", "/srv/uploads");

        let cli = Cli::try_parse_from(["chunkyard", "--host", "127.0.0.1"])
            .map_err(|err| figment::Error::from(err.to_string()))?;

        assert_eq!(cli.port, Some(9100));
        assert_eq!(cli.upload_dir, Some(PathBuf::from("/srv/uploads")));
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        Ok(())
    });
}

#[test]
fn zero_port_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[server]\nport = 0\nupload_dir = \"{}\"\n",
            temp_dir.path().display()
        ),
    )
    .unwrap();

    assert!(load_config_from_file(&config_path).is_err());
}

#[tokio::test]
async fn custom_staging_dir_is_used_for_parts() {
    let temp_dir = TempDir::new().unwrap();
    let upload_dir = temp_dir.path().join("uploads");
    let staging_dir = temp_dir.path().join("parts");
    fs::create_dir(&upload_dir).unwrap();

    let mut config = support::base_config(&upload_dir);
    config.upload.staging_dir = Some(staging_dir.clone());

    let response = app(config)
        .oneshot(upload_request(&[file("a.txt", b"content")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(staging_dir.is_dir());
    assert_eq!(fs::read_dir(&staging_dir).unwrap().count(), 0);
    assert!(!upload_dir.join(".staging").exists());
    assert_eq!(fs::read_to_string(upload_dir.join("a.txt")).unwrap(), "content");
}
