use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    String,
}

#[derive(Debug, Deserialize)]
struct ColumnDef {
    name: String,
    #[serde(rename = "type")]
    ty: ColumnType,
}

/// A table's schema: an order-preserving map from column name to its
/// declared type. The insertion order doubles as the declared column
/// order used to expand `SELECT *` and to parse row-file records, so one
/// structure serves both the lookup and the ordering need.
pub type TableSchema = IndexMap<String, ColumnType>;

#[derive(Debug)]
pub struct Database {
    pub name: String,
    pub root: PathBuf,
    pub tables: HashMap<String, TableSchema>,
}

impl Database {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn row_file_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.csv"))
    }
}

/// The process-wide catalog: read-only after [`Catalog::load`], freely
/// shared behind an `Arc`.
#[derive(Debug)]
pub struct Catalog {
    pub databases: HashMap<String, Database>,
}

#[derive(Debug, Deserialize)]
struct MetadataDoc(HashMap<String, HashMap<String, Vec<ColumnDef>>>);

impl Catalog {
    /// Discover every child directory of `root` that contains a
    /// `metadata.json` and load it as a database.
    pub async fn load(root: impl AsRef<Path>) -> EngineResult<Catalog> {
        let root = root.as_ref();
        let mut entries = tokio::fs::read_dir(root).await.map_err(|e| {
            EngineError::operational(format!("cannot read storage root {root:?}: {e}"))
        })?;

        let mut databases = HashMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::operational(format!("reading storage root: {e}")))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let metadata_path = path.join("metadata.json");
            if !metadata_path.exists() {
                debug!("skipping {path:?}: no metadata.json");
                continue;
            }
            let db_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| EngineError::operational("invalid database directory name"))?
                .to_string();

            let db = Self::load_database(&db_name, &path, &metadata_path).await?;
            info!(
                "loaded database '{}' with {} table(s)",
                db_name,
                db.tables.len()
            );
            databases.insert(db_name, db);
        }

        if databases.is_empty() {
            warn!("no databases discovered under {root:?}");
        }

        Ok(Catalog { databases })
    }

    async fn load_database(
        db_name: &str,
        db_root: &Path,
        metadata_path: &Path,
    ) -> EngineResult<Database> {
        let raw = tokio::fs::read_to_string(metadata_path)
            .await
            .map_err(|e| EngineError::operational(format!("reading {metadata_path:?}: {e}")))?;
        let doc: MetadataDoc = serde_json::from_str(&raw).map_err(|e| {
            EngineError::operational(format!("parsing {metadata_path:?}: {e}"))
        })?;

        let table_map = doc
            .0
            .get(db_name)
            .or_else(|| doc.0.values().next())
            .ok_or_else(|| {
                EngineError::operational(format!(
                    "metadata.json for '{db_name}' declares no tables"
                ))
            })?;

        let mut tables = HashMap::new();
        for (table_name, columns) in table_map {
            let mut schema = TableSchema::new();
            for col in columns {
                schema.insert(col.name.clone(), col.ty);
            }
            tables.insert(table_name.clone(), schema);
        }

        Ok(Database {
            name: db_name.to_string(),
            root: db_root.to_path_buf(),
            tables,
        })
    }

    pub fn database(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    /// Returns the single loaded database name, if and only if exactly one
    /// is loaded. Used to infer an unqualified table reference's database.
    pub fn only_database(&self) -> Option<&str> {
        let mut iter = self.databases.keys();
        let first = iter.next()?;
        if iter.next().is_some() {
            None
        } else {
            Some(first.as_str())
        }
    }
}
