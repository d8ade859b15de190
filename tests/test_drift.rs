mod common;
use common::{setup_operator, setup_remote};
use sheetstore_core::cache::IdentityCache;
use sheetstore_core::drift::DriftGuard;
use sheetstore_core::error::StoreError;
use sheetstore_core::path::NodeCreator;

const PATH: &str = "Farm/Records/2024_Records";

#[tokio::test]
async fn test_drift_unchanged_id_is_valid() -> anyhow::Result<()> {
    let remote = setup_remote()?;
    let id = NodeCreator::new(&remote).ensure_spreadsheet(PATH).await?.id;
    let mut cache = IdentityCache::new("manure");
    cache.set(PATH, id.clone());

    let report = DriftGuard::new(&remote).verify(PATH, &id, &mut cache).await;
    assert!(report.valid);
    assert_eq!(report.resolved, Some(id.clone()));
    assert!(report.to_error().is_none());
    assert_eq!(cache.get(PATH), Some(&id));
    Ok(())
}

#[tokio::test]
async fn test_drift_renamed_spreadsheet_clears_cache_entry() -> anyhow::Result<()> {
    let remote = setup_remote()?;
    let id = NodeCreator::new(&remote).ensure_spreadsheet(PATH).await?.id;
    let mut cache = IdentityCache::new("manure");
    cache.set(PATH, id.clone());
    cache.set("Farm/Records/2023_Records", id.clone());

    remote.rename_node(&id, "2024_Records (old)").await?;

    let report = DriftGuard::new(&remote).verify(PATH, &id, &mut cache).await;
    assert!(!report.valid);
    assert_eq!(report.resolved, None);
    assert!(matches!(
        report.to_error(),
        Some(StoreError::DriftDetected { .. })
    ));
    assert_eq!(cache.get(PATH), None);
    // Other entries are untouched.
    assert!(cache.get("Farm/Records/2023_Records").is_some());
    Ok(())
}

#[tokio::test]
async fn test_drift_replaced_spreadsheet_reports_new_id() -> anyhow::Result<()> {
    let remote = setup_remote()?;
    let creator = NodeCreator::new(&remote);
    let old = creator.ensure_spreadsheet(PATH).await?.id;
    let mut cache = IdentityCache::new("manure");
    cache.set(PATH, old.clone());

    remote.trash_node(&old).await?;
    let replacement = creator.ensure_spreadsheet(PATH).await?;
    assert!(replacement.created);

    let report = DriftGuard::new(&remote).verify(PATH, &old, &mut cache).await;
    assert!(!report.valid);
    assert_eq!(report.resolved, Some(replacement.id));
    assert!(cache.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_drift_cache_persists_between_loads() -> anyhow::Result<()> {
    let op = setup_operator()?;
    let remote = setup_remote()?;
    let id = NodeCreator::new(&remote).ensure_spreadsheet(PATH).await?.id;

    let mut cache = IdentityCache::load(&op, "manure").await?;
    assert!(cache.is_empty());
    cache.set(PATH, id.clone());
    cache.save(&op).await?;

    let reloaded = IdentityCache::load(&op, "manure").await?;
    assert_eq!(reloaded.get(PATH), Some(&id));

    op.write("cache/manure.json", b"not json".to_vec()).await?;
    assert!(IdentityCache::load(&op, "manure").await?.is_empty());
    Ok(())
}
