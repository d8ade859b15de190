use crate::error::Result;
use crate::node::NodeId;
use crate::path::{NodeCreator, PathResolver};
use crate::remote::{RemoteService, WriteMode};
use crate::schema::{SchemaCatalog, TableSchema};
use crate::table::{Row, Spreadsheet, TableStore, FIRST_DATA_LINENO};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub id: NodeId,
    pub created: bool,
}

/// Creates yearly spreadsheets, seeding them from the previous year.
pub struct SpreadsheetProvisioner<'a, R: RemoteService + ?Sized> {
    remote: &'a R,
    catalog: &'a SchemaCatalog,
}

impl<'a, R: RemoteService + ?Sized> SpreadsheetProvisioner<'a, R> {
    pub fn new(remote: &'a R, catalog: &'a SchemaCatalog) -> Self {
        Self { remote, catalog }
    }

    /// Makes sure a spreadsheet exists at `this_year` with every catalog table.
    ///
    /// A freshly created one gets every catalog table: append-only tables and
    /// tables last year did not have start with just a header, the rest get
    /// last year's rows renumbered from line 2. A spreadsheet that was already
    /// there is checked the same way, and any table a failed earlier attempt
    /// left missing or without a header is seeded now. The returned id is
    /// only usable once this returns `Ok`.
    pub async fn ensure(&self, this_year: &str, last_year: &str) -> Result<Provisioned> {
        info!(path = %this_year, "ensuring spreadsheet for this year");
        let ensured = NodeCreator::new(self.remote)
            .ensure_spreadsheet(this_year)
            .await?;

        let pending = self.pending_tables(&ensured.id, ensured.created).await?;
        if pending.is_empty() {
            return Ok(Provisioned {
                id: ensured.id,
                created: ensured.created,
            });
        }
        if !ensured.created {
            let names: Vec<&str> = pending.iter().map(|(s, _)| s.name.as_str()).collect();
            warn!(id = %ensured.id, tables = ?names, "existing spreadsheet is incomplete, seeding missing worksheets");
        }

        let template = match PathResolver::new(self.remote).find(last_year).await? {
            Some(last_id) => {
                info!(path = %last_year, id = %last_id, "seeding from last year's spreadsheet");
                Some(
                    TableStore::new(self.remote, self.catalog)
                        .load_unchecked(&last_id)
                        .await?,
                )
            }
            None => {
                info!(path = %last_year, "no spreadsheet for last year, writing bare headers");
                None
            }
        };

        for (schema, exists) in pending {
            self.seed_table(&ensured.id, schema, exists, template.as_ref())
                .await?;
        }
        info!(id = %ensured.id, "all worksheets present in spreadsheet");

        Ok(Provisioned {
            id: ensured.id,
            created: ensured.created,
        })
    }

    /// Catalog tables still to seed, with whether the worksheet itself exists.
    async fn pending_tables(
        &self,
        id: &NodeId,
        created: bool,
    ) -> Result<Vec<(&'a TableSchema, bool)>> {
        if created {
            return Ok(self.catalog.iter().map(|s| (s, false)).collect());
        }
        let existing = self.remote.list_tables(id).await?;
        let mut pending = Vec::new();
        for schema in self.catalog.iter() {
            if !existing.contains(&schema.name) {
                pending.push((schema, false));
            } else if self.remote.read_table(id, &schema.name).await?.header.is_empty() {
                pending.push((schema, true));
            }
        }
        Ok(pending)
    }

    async fn seed_table(
        &self,
        id: &NodeId,
        schema: &TableSchema,
        exists: bool,
        template: Option<&Spreadsheet>,
    ) -> Result<()> {
        if !exists {
            self.remote.create_table(id, &schema.name).await?;
        }
        let store = TableStore::new(self.remote, self.catalog);

        let previous = template
            .and_then(|t| t.table(&schema.name))
            .filter(|t| !schema.append_only && !t.header.is_empty());

        match previous {
            Some(prev) => {
                let rows: Vec<Row> = prev
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(idx, row)| Row::new(FIRST_DATA_LINENO + idx as u32, row.fields.clone()))
                    .collect();
                info!(table = %schema.name, rows = rows.len(), "copying last year's rows");
                store
                    .batch_upsert(id, &schema.name, &rows, &prev.header, WriteMode::Insert)
                    .await
            }
            None => {
                info!(table = %schema.name, "writing header only");
                store
                    .batch_upsert(id, &schema.name, &[], &schema.header, WriteMode::Insert)
                    .await
            }
        }
    }
}
