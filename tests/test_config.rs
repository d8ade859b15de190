mod common;
use common::setup_operator;
use sheetstore_core::config::StoreConfig;
use sheetstore_core::error::StoreError;
use sheetstore_core::storage::operator_from_uri;

#[test]
fn test_config_defaults_build_year_paths() {
    let config = StoreConfig::default();
    let paths = config.year_paths(2024);
    assert_eq!(
        paths.this_year,
        "Ault Farms Operations/ManureRecords/2024_ManureRecords"
    );
    assert_eq!(
        paths.last_year,
        "Ault Farms Operations/ManureRecords/2023_ManureRecords"
    );
    assert_eq!(config.uploads_path(), "Ault Farms Operations/ManureRecords/uploads");
}

#[test]
fn test_config_yaml_and_json_fill_defaults() -> anyhow::Result<()> {
    let yaml = StoreConfig::from_yaml_str("base_path: Farm/Records/\nsheet_suffix: _Loads\n")?;
    assert_eq!(yaml.year_path(2025), "Farm/Records/2025_Loads");
    assert_eq!(yaml.app_name, "manure");
    assert!(yaml.archive_uploads);

    let json = StoreConfig::from_json_slice(br#"{"app_name":"trucking","archive_uploads":false}"#)?;
    assert_eq!(json.app_name, "trucking");
    assert!(!json.archive_uploads);

    let err = StoreConfig::from_json_slice(br#"{"base_path":"/"}"#).expect_err("empty base");
    assert!(matches!(err, StoreError::Config(_)));
    Ok(())
}

#[tokio::test]
async fn test_config_load_picks_format_by_extension() -> anyhow::Result<()> {
    let op = setup_operator()?;
    op.write("store.yaml", b"app_name: yaml-app\n".to_vec()).await?;
    op.write("store.json", br#"{"app_name":"json-app"}"#.to_vec()).await?;

    assert_eq!(StoreConfig::load(&op, "store.yaml").await?.app_name, "yaml-app");
    assert_eq!(StoreConfig::load(&op, "store.json").await?.app_name, "json-app");
    Ok(())
}

#[tokio::test]
async fn test_config_memory_uris_share_an_operator() -> anyhow::Result<()> {
    let a = operator_from_uri("memory://test-config-shared")?;
    let b = operator_from_uri("memory://test-config-shared")?;
    a.write("probe", b"1".to_vec()).await?;
    assert!(b.exists("probe").await?);

    let err = operator_from_uri("s3://bucket").expect_err("unsupported scheme");
    assert!(matches!(err, StoreError::Config(_)));
    Ok(())
}
