use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

const COMPOSE: &str = r#"
version: "3"
services:
  web:
    image: nginx:1.25
    ports: ["80:80"]
  cache:
    image: redis:6
  app:
    build: .
"#;

fn manifest(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_parse_images_skips_services_without_image() {
    let images = parse_images(COMPOSE).unwrap();
    assert_eq!(images, ["nginx:1.25", "redis:6"]);
}

#[test]
fn test_parse_images_empty_document() {
    assert!(parse_images("").unwrap().is_empty());
    assert!(parse_images("version: '3'").unwrap().is_empty());
}

#[test]
fn test_parse_images_rejects_invalid_yaml() {
    assert!(parse_images("services: [unclosed").is_err());
}

#[test]
fn test_collect_images_concatenates_files_in_order() {
    let first = manifest("services:\n  a:\n    image: alpine:3\n");
    let second = manifest("services:\n  b:\n    image: busybox\n");

    let images =
        collect_images(&[second.path().to_path_buf(), first.path().to_path_buf()]).unwrap();

    assert_eq!(images, ["busybox", "alpine:3"]);
}

#[test]
fn test_collect_images_names_unreadable_file() {
    let err = collect_images(&[PathBuf::from("/nonexistent/compose.yml")]).unwrap_err();
    assert!(err.contains("/nonexistent/compose.yml"));
}
