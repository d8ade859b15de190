mod common;
use common::{cells, empty_points, seed_table, setup_remote, square};
use sheetstore_core::config::StoreConfig;
use sheetstore_core::path::{NodeCreator, PathResolver};
use sheetstore_core::provision::SpreadsheetProvisioner;
use sheetstore_core::records::{parse_records, Driver, Field, LoadsRecord, Record, Source};
use sheetstore_core::remote::{OpendalRemote, Tabular};
use sheetstore_core::schema::SchemaCatalog;
use sheetstore_core::table::TableStore;

async fn seed_last_year(remote: &OpendalRemote, path: &str) -> anyhow::Result<()> {
    let sheet = NodeCreator::new(remote).ensure_spreadsheet(path).await?.id;
    let points = empty_points();
    let north = square("North", 0.0).to_string();
    let south = square("South", 2.0).to_string();
    seed_table(
        remote,
        &sheet,
        "fields",
        Field::HEADER,
        &[
            cells(&["North", north.as_str()]),
            cells(&["South", south.as_str()]),
        ],
    )
    .await?;
    seed_table(
        remote,
        &sheet,
        "sources",
        Source::HEADER,
        &[cells(&["Pit 1", "liquid", "2.5"])],
    )
    .await?;
    seed_table(remote, &sheet, "drivers", Driver::HEADER, &[cells(&["Ann"])]).await?;
    seed_table(
        remote,
        &sheet,
        "loads",
        LoadsRecord::HEADER,
        &[cells(&["2023-05-01", "North", "Pit 1", "4", "Ann", points.as_str()])],
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn test_provision_copies_reference_tables_from_last_year() -> anyhow::Result<()> {
    let remote = setup_remote()?;
    let config = StoreConfig::default();
    let paths = config.year_paths(2024);
    seed_last_year(&remote, &paths.last_year).await?;

    let catalog = SchemaCatalog::manure();
    let provisioned = SpreadsheetProvisioner::new(&remote, &catalog)
        .ensure(&paths.this_year, &paths.last_year)
        .await?;
    assert!(provisioned.created);
    assert_eq!(
        PathResolver::new(&remote).find(&paths.this_year).await?,
        Some(provisioned.id.clone())
    );

    assert_eq!(
        remote.list_tables(&provisioned.id).await?,
        vec!["fields", "sources", "drivers", "loads"]
    );

    let loaded = TableStore::new(&remote, &catalog)
        .load(&provisioned.id)
        .await?;
    let fields: Vec<Field> = parse_records(loaded.table("fields"))?;
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "North");
    assert_eq!(fields[0].lineno, Some(2));
    assert_eq!(fields[1].lineno, Some(3));
    assert_eq!(fields[1].boundary, square("South", 2.0));

    let sources: Vec<Source> = parse_records(loaded.table("sources"))?;
    assert_eq!(sources[0].ac_per_load, 2.5);

    // Loads never carry over, only the header does.
    let loads = loaded.table("loads").expect("loads table");
    assert_eq!(loads.header, LoadsRecord::header());
    assert!(loads.rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_provision_existing_spreadsheet_is_left_alone() -> anyhow::Result<()> {
    let remote = setup_remote()?;
    let config = StoreConfig::default();
    let paths = config.year_paths(2024);
    seed_last_year(&remote, &paths.last_year).await?;

    let catalog = SchemaCatalog::manure();
    let provisioner = SpreadsheetProvisioner::new(&remote, &catalog);
    let first = provisioner
        .ensure(&paths.this_year, &paths.last_year)
        .await?;
    let second = provisioner
        .ensure(&paths.this_year, &paths.last_year)
        .await?;
    assert!(!second.created);
    assert_eq!(first.id, second.id);

    // No duplicated rows from a second seeding.
    let loaded = TableStore::new(&remote, &catalog).load(&second.id).await?;
    assert_eq!(loaded.table("fields").map(|t| t.rows.len()), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_provision_without_last_year_writes_bare_headers() -> anyhow::Result<()> {
    let remote = setup_remote()?;
    let config = StoreConfig::default();
    let paths = config.year_paths(2024);

    let catalog = SchemaCatalog::manure();
    let provisioned = SpreadsheetProvisioner::new(&remote, &catalog)
        .ensure(&paths.this_year, &paths.last_year)
        .await?;
    assert!(provisioned.created);

    for schema in catalog.iter() {
        let raw = remote.read_table(&provisioned.id, &schema.name).await?;
        assert_eq!(raw.header, schema.header, "{}", schema.name);
        assert!(raw.rows.is_empty(), "{}", schema.name);
    }
    assert_eq!(PathResolver::new(&remote).find(&paths.last_year).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_provision_completes_half_seeded_spreadsheet() -> anyhow::Result<()> {
    let remote = setup_remote()?;
    let config = StoreConfig::default();
    let paths = config.year_paths(2024);
    seed_last_year(&remote, &paths.last_year).await?;

    // An earlier attempt got as far as one worksheet without its header.
    let sheet = NodeCreator::new(&remote)
        .ensure_spreadsheet(&paths.this_year)
        .await?
        .id;
    remote.create_table(&sheet, "fields").await?;

    let catalog = SchemaCatalog::manure();
    let provisioned = SpreadsheetProvisioner::new(&remote, &catalog)
        .ensure(&paths.this_year, &paths.last_year)
        .await?;
    assert!(!provisioned.created);
    assert_eq!(provisioned.id, sheet);

    let mut tables = remote.list_tables(&sheet).await?;
    tables.sort();
    assert_eq!(tables, vec!["drivers", "fields", "loads", "sources"]);

    let loaded = TableStore::new(&remote, &catalog).load(&sheet).await?;
    let fields: Vec<Field> = parse_records(loaded.table("fields"))?;
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].lineno, Some(2));
    let loads = loaded.table("loads").expect("loads table");
    assert_eq!(loads.header, LoadsRecord::header());
    assert!(loads.rows.is_empty());
    Ok(())
}
