//! Loading manifests from disk.

use capstan_server::load_manifest;

#[test]
fn bundled_manifest_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/capstan.toml");
    let manifest = load_manifest(&path).unwrap();

    assert_eq!(manifest.capabilities.len(), 5);
    assert_eq!(manifest.transmitters.len(), 1);
    assert_eq!(manifest.triggers.len(), 2);

    let http = &manifest.capabilities[0];
    assert_eq!(http.contract_id, "capstan:httpserver");
    assert_eq!(http.values.get("port"), Some("8080"));
    assert_eq!(http.values.get("metrics_enabled"), Some("true"));

    let panic_route = &manifest.triggers[1];
    assert_eq!(panic_route.authorizer.as_deref(), Some("capstan:header_authorizer"));
    assert_eq!(panic_route.authorizer_expression, "x-debug=1");
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = load_manifest(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.toml"));
}

#[test]
fn invalid_toml_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[[capabilities]\ncontract_id = ").unwrap();
    let err = load_manifest(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse manifest"));
}
