//! SQLite persistence for the API reference, keyed by `(name, language)`.

use crate::embed::cosine_similarity;
use crate::enrich::EnrichedRecord;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS api_reference (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    language TEXT NOT NULL,
    signature TEXT,
    description TEXT NOT NULL DEFAULT '',
    parameters TEXT NOT NULL DEFAULT '{}',
    returns TEXT NOT NULL DEFAULT '[]',
    usage_examples TEXT NOT NULL DEFAULT '[]',
    related_functions TEXT NOT NULL DEFAULT '[]',
    search_terms TEXT NOT NULL DEFAULT '[]',
    embedding BLOB,
    function_type TEXT NOT NULL,
    has_nargin_pattern INTEGER NOT NULL DEFAULT 0,
    class_name TEXT,
    is_class_method INTEGER NOT NULL DEFAULT 0,
    instance_variable TEXT,
    calling_pattern TEXT,
    source_id TEXT NOT NULL,
    library_version TEXT NOT NULL,
    last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (name, language)
);
CREATE INDEX IF NOT EXISTS idx_api_reference_type ON api_reference(function_type);
";

/// Words of the description added to the search terms.
const DESCRIPTION_TERMS: usize = 5;

/// Identifier generator owned by the store, seeded from `MAX(id) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSequence {
    next: i64,
}

impl IdSequence {
    pub fn starting_at(next: i64) -> Self {
        IdSequence { next }
    }

    pub fn seed(conn: &Connection) -> Result<Self> {
        let max: Option<i64> = conn
            .query_row("SELECT MAX(id) FROM api_reference", [], |row| row.get(0))
            .context("failed to read max id")?;
        Ok(IdSequence::starting_at(max.unwrap_or(0) + 1))
    }

    pub fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Provenance of stored rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub language: String,
    pub source_id: String,
    pub library_version: String,
}

/// One row ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEntry {
    pub name: String,
    pub language: String,
    pub signature: String,
    pub description: String,
    pub parameters: String,
    pub returns: String,
    pub usage_examples: String,
    pub related_functions: String,
    pub search_terms: Vec<String>,
    pub embedding: Vec<f32>,
    pub function_type: String,
    pub has_nargin_pattern: bool,
    pub class_name: Option<String>,
    pub is_class_method: bool,
    pub instance_variable: Option<String>,
    pub calling_pattern: Option<String>,
    pub source_id: String,
    pub library_version: String,
}

impl ApiEntry {
    pub fn from_record(record: &EnrichedRecord, embedding: Vec<f32>, origin: &Origin) -> Result<Self> {
        let mut search_terms = vec![record.name.clone()];
        search_terms.extend(record.class_name.clone());
        search_terms.extend(record.namespace.clone());
        search_terms.extend(
            record
                .description
                .split_whitespace()
                .take(DESCRIPTION_TERMS)
                .map(str::to_string),
        );

        Ok(ApiEntry {
            name: record.name.clone(),
            language: origin.language.clone(),
            signature: record.signature.clone(),
            description: record.description.clone(),
            parameters: serde_json::to_string(&record.parameters)?,
            returns: serde_json::to_string(&record.returns)?,
            usage_examples: serde_json::to_string(&record.usage_examples)?,
            related_functions: serde_json::to_string(&record.related_functions)?,
            search_terms,
            embedding,
            function_type: record.function_type.as_str().to_string(),
            has_nargin_pattern: record.uses_nargin_pattern || record.parameters.nargin_detection.is_some(),
            class_name: record.class_name.clone(),
            is_class_method: record.is_class_method,
            instance_variable: record.instance_variable.clone(),
            calling_pattern: record.calling_pattern.clone(),
            source_id: origin.source_id.clone(),
            library_version: origin.library_version.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted(i64),
    Updated(i64),
}

/// Stored row as returned by [`SqliteStore::get`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFunction {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub function_type: String,
    pub has_nargin_pattern: bool,
    pub calling_pattern: Option<String>,
}

impl StoredFunction {
    fn count(&self, list: &str) -> usize {
        self.parameters
            .get(list)
            .and_then(|v| v.as_array())
            .map_or(0, Vec::len)
    }

    pub fn required_count(&self) -> usize {
        self.count("required")
    }

    pub fn optional_count(&self) -> usize {
        self.count("optional")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub function_type: String,
    pub has_nargin_pattern: bool,
}

pub struct SqliteStore {
    conn: Connection,
    ids: IdSequence,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory for database: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to initialize api_reference schema")?;
        let ids = IdSequence::seed(&conn)?;
        Ok(SqliteStore { conn, ids })
    }

    /// Update the row with the same `(name, language)` in place, or insert a
    /// new row with the next identifier.
    pub fn upsert(&mut self, entry: &ApiEntry) -> Result<Upsert> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM api_reference WHERE name = ?1 AND language = ?2",
                params![entry.name, entry.language],
                |row| row.get(0),
            )
            .optional()?;

        let search_terms = serde_json::to_string(&entry.search_terms)?;
        let embedding = encode_embedding(&entry.embedding);

        match existing {
            Some(id) => {
                self.conn.execute(
                    "UPDATE api_reference SET
                        signature = ?2, description = ?3, parameters = ?4, returns = ?5,
                        usage_examples = ?6, related_functions = ?7, search_terms = ?8,
                        embedding = ?9, function_type = ?10, has_nargin_pattern = ?11,
                        class_name = ?12, is_class_method = ?13, instance_variable = ?14,
                        calling_pattern = ?15, source_id = ?16, library_version = ?17,
                        last_updated = CURRENT_TIMESTAMP
                     WHERE id = ?1",
                    params![
                        id,
                        entry.signature,
                        entry.description,
                        entry.parameters,
                        entry.returns,
                        entry.usage_examples,
                        entry.related_functions,
                        search_terms,
                        embedding,
                        entry.function_type,
                        entry.has_nargin_pattern,
                        entry.class_name,
                        entry.is_class_method,
                        entry.instance_variable,
                        entry.calling_pattern,
                        entry.source_id,
                        entry.library_version,
                    ],
                )?;
                tracing::debug!(name = %entry.name, id, "updated");
                Ok(Upsert::Updated(id))
            }
            None => {
                let id = self.ids.next_id();
                self.conn.execute(
                    "INSERT INTO api_reference (
                        id, name, language, signature, description, parameters, returns,
                        usage_examples, related_functions, search_terms, embedding,
                        function_type, has_nargin_pattern, class_name, is_class_method,
                        instance_variable, calling_pattern, source_id, library_version
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                    params![
                        id,
                        entry.name,
                        entry.language,
                        entry.signature,
                        entry.description,
                        entry.parameters,
                        entry.returns,
                        entry.usage_examples,
                        entry.related_functions,
                        search_terms,
                        embedding,
                        entry.function_type,
                        entry.has_nargin_pattern,
                        entry.class_name,
                        entry.is_class_method,
                        entry.instance_variable,
                        entry.calling_pattern,
                        entry.source_id,
                        entry.library_version,
                    ],
                )?;
                tracing::debug!(name = %entry.name, id, "inserted");
                Ok(Upsert::Inserted(id))
            }
        }
    }

    pub fn get(&self, name: &str, language: &str, version: &str) -> Result<Option<StoredFunction>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, parameters, function_type, has_nargin_pattern, calling_pattern
                 FROM api_reference WHERE name = ?1 AND language = ?2 AND library_version = ?3",
                params![name, language, version],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, name, description, parameters, function_type, has_nargin_pattern, calling_pattern)| {
            Ok(StoredFunction {
                id,
                name,
                description,
                parameters: serde_json::from_str(&parameters)
                    .with_context(|| format!("corrupt parameters column for id {}", id))?,
                function_type,
                has_nargin_pattern,
                calling_pattern,
            })
        })
        .transpose()
    }

    pub fn list(&self, language: &str, version: &str, function_type: Option<&str>) -> Result<Vec<FunctionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, function_type, has_nargin_pattern FROM api_reference
             WHERE language = ?1 AND library_version = ?2 AND (?3 IS NULL OR function_type = ?3)
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![language, version, function_type], |row| {
            Ok(FunctionSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                function_type: row.get(3)?,
                has_nargin_pattern: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rows of `language` ordered by id, optionally from `start_from` on.
    pub fn list_from(&self, language: &str, start_from: Option<i64>) -> Result<Vec<FunctionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, function_type, has_nargin_pattern FROM api_reference
             WHERE language = ?1 AND id >= ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![language, start_from.unwrap_or(i64::MIN)], |row| {
            Ok(FunctionSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                function_type: row.get(3)?,
                has_nargin_pattern: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_by_type(&self, language: &str, version: &str) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for row in self.list(language, version, None)? {
            *counts.entry(row.function_type).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn embedding(&self, id: i64) -> Result<Option<Vec<f32>>> {
        let blob: Option<Option<Vec<u8>>> = self
            .conn
            .query_row("SELECT embedding FROM api_reference WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(blob.flatten().map(|b| decode_embedding(&b)))
    }

    pub fn update_embedding(&self, id: i64, embedding: &[f32]) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE api_reference SET embedding = ?2, last_updated = CURRENT_TIMESTAMP WHERE id = ?1",
            params![id, encode_embedding(embedding)],
        )?;
        anyhow::ensure!(changed == 1, "no row with id {}", id);
        Ok(())
    }

    /// Names of `language` ranked by cosine similarity to `query`.
    pub fn similar(&self, query: &[f32], language: &str, top_k: usize) -> Result<Vec<(String, f32)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, embedding FROM api_reference WHERE language = ?1 AND embedding IS NOT NULL")?;
        let rows = stmt.query_map([language], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (name, blob) = row?;
            scored.push((name, cosine_similarity(query, &decode_embedding(&blob))));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Little-endian `f32` sequence.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Enricher;

    fn origin() -> Origin {
        Origin {
            language: "matlab".to_string(),
            source_id: "github.com/pulseq/pulseq".to_string(),
            library_version: "1.5.0".to_string(),
        }
    }

    fn entry(source: &str, path: &str, embedding: Vec<f32>) -> ApiEntry {
        let parsed = matlab_syntax::parse_source(path, source);
        let record = Enricher::new(None).enrich_file(&parsed).main_function.unwrap();
        ApiEntry::from_record(&record, embedding, &origin()).unwrap()
    }

    fn adc(embedding: Vec<f32>) -> ApiEntry {
        entry(
            "function adc = makeAdc(num, system, dwell)\n% makeAdc Create an ADC readout event.\nif nargin < 3\n dwell = 1e-5;\nend\n",
            "+mr/makeAdc.m",
            embedding,
        )
    }

    #[test]
    fn sequence_seeds_from_max_id() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO api_reference (id, name, language, function_type, source_id, library_version)
                 VALUES (41, 'old', 'matlab', 'main', 's', '1.5.0')",
                [],
            )
            .unwrap();
        store.ids = IdSequence::seed(&store.conn).unwrap();
        assert_eq!(store.upsert(&adc(vec![])).unwrap(), Upsert::Inserted(42));
    }

    #[test]
    fn upsert_updates_in_place() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.upsert(&adc(vec![1.0])).unwrap(), Upsert::Inserted(1));
        let mut changed = adc(vec![2.0]);
        changed.description = "changed".to_string();
        assert_eq!(store.upsert(&changed).unwrap(), Upsert::Updated(1));

        let stored = store.get("makeAdc", "matlab", "1.5.0").unwrap().unwrap();
        assert_eq!(stored.description, "changed");
        assert_eq!(stored.required_count(), 2);
        assert_eq!(stored.optional_count(), 1);
        assert!(stored.has_nargin_pattern);
        assert_eq!(stored.calling_pattern.as_deref(), Some("mr.makeAdc(...)"));
        assert_eq!(store.embedding(1).unwrap(), Some(vec![2.0]));
        assert_eq!(store.list("matlab", "1.5.0", None).unwrap().len(), 1);
    }

    #[test]
    fn same_name_other_language_is_a_new_row() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&adc(vec![])).unwrap();
        let mut python = adc(vec![]);
        python.language = "python".to_string();
        assert_eq!(store.upsert(&python).unwrap(), Upsert::Inserted(2));
    }

    #[test]
    fn missing_function() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("opts", "matlab", "1.5.0").unwrap().is_none());
    }

    #[test]
    fn search_terms_and_type_filter() {
        let e = adc(vec![]);
        assert_eq!(e.search_terms[0], "makeAdc");
        assert_eq!(e.search_terms[1], "mr");
        assert_eq!(e.search_terms.len(), 2 + DESCRIPTION_TERMS);

        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&e).unwrap();
        assert_eq!(store.list("matlab", "1.5.0", Some("main")).unwrap().len(), 1);
        assert!(store.list("matlab", "1.5.0", Some("helper")).unwrap().is_empty());
        assert_eq!(store.count_by_type("matlab", "1.5.0").unwrap().get("main"), Some(&1));
    }

    #[test]
    fn similar_ranks_by_cosine() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&adc(vec![1.0, 0.0])).unwrap();
        store
            .upsert(&entry("function d = makeDelay(t)\n", "+mr/makeDelay.m", vec![0.0, 1.0]))
            .unwrap();
        let ranked = store.similar(&[0.1, 0.9], "matlab", 1).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "makeDelay");
    }

    #[test]
    fn update_embedding_requires_row() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&adc(vec![0.0])).unwrap();
        store.update_embedding(1, &[0.5, 0.25]).unwrap();
        assert_eq!(store.embedding(1).unwrap(), Some(vec![0.5, 0.25]));
        assert!(store.update_embedding(99, &[1.0]).is_err());
    }

    #[test]
    fn blob_layout() {
        assert_eq!(encode_embedding(&[1.0]), 1.0f32.to_le_bytes().to_vec());
        assert_eq!(decode_embedding(&encode_embedding(&[0.5, -2.0])), [0.5, -2.0]);
    }
}
