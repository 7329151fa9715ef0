//! Batch processing of a source directory.
//!
//! Every file is handled on its own: a failure is recorded in the summary and
//! the batch moves on.

use crate::embed::{embed_or_zero, summary_text, Embedder};
use crate::enrich::{EnrichedFile, EnrichedRecord, Enricher};
use crate::store::{ApiEntry, Origin, SqliteStore, Upsert};
use anyhow::{Context, Result};
use matlab_syntax::{FunctionType, Visibility};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File stems that never hold a documented function.
const NON_FUNCTION_FILES: &[&str] = &["Contents", "parsemr", "compile_mex", "md5"];
const TEST_PREFIX: &str = "test";
const DEMO_PREFIXES: &[&str] = &["demo", "Example"];

pub const SUMMARY_FILE: &str = "processing_summary.json";

/// File-name based skip rules.
#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    pub include_tests: bool,
    /// Extra stem prefixes to skip
    pub patterns: Vec<String>,
}

impl SkipRules {
    /// Why the file with this stem is skipped, if it is.
    pub fn skip_reason(&self, stem: &str) -> Option<String> {
        if let Some(pattern) = self.patterns.iter().find(|p| stem.starts_with(p.as_str())) {
            return Some(format!("matches pattern: {}", pattern));
        }
        if !self.include_tests && stem.starts_with(TEST_PREFIX) {
            return Some("test file".to_string());
        }
        if NON_FUNCTION_FILES.contains(&stem) {
            return Some("non-function file".to_string());
        }
        if DEMO_PREFIXES.iter().any(|p| stem.starts_with(p)) {
            return Some("demo/example file".to_string());
        }
        None
    }
}

/// `.m` files under `dir`, sorted.
pub fn source_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("path not found: {}", dir.display());
    }
    let pattern = if recursive {
        dir.join("**").join("*.m")
    } else {
        dir.join("*.m")
    };
    let pattern = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("invalid glob pattern: {}", pattern))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Output name for a source file: its path below `root`, dot-joined, without
/// the extension. `+mr/@Sequence/write.m` → `+mr.@Sequence.write`
pub fn output_name(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join(".")
}

/// Outcome of persisting one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Persisted {
    Inserted { name: String, id: i64 },
    Updated { name: String, id: i64 },
    Failed { name: String, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub file: String,
    pub outcomes: Vec<Persisted>,
    pub errors: Vec<String>,
}

/// Store main, helper and public internal functions of a file.
pub fn persist_file(
    store: &mut SqliteStore,
    embedder: &dyn Embedder,
    origin: &Origin,
    file: &EnrichedFile,
) -> PersistReport {
    let mut report = PersistReport {
        file: file.file_info.name.clone(),
        ..Default::default()
    };

    // A class row already carries its constructor's parameters and shares its key.
    let is_class = file
        .main_function
        .as_ref()
        .is_some_and(|m| m.function_type == FunctionType::Class);
    let records = file
        .main_function
        .iter()
        .map(|r| ("Main function", r))
        .chain(
            file.helper_functions
                .iter()
                .filter(|r| !(is_class && r.function_type == FunctionType::Constructor))
                .map(|r| ("Helper", r)),
        )
        .chain(
            file.internal_functions
                .iter()
                .filter(|r| r.visibility == Visibility::Public)
                .map(|r| ("Internal", r)),
        );

    for (role, record) in records {
        match persist_record(store, embedder, origin, record) {
            Ok(Upsert::Inserted(id)) => {
                tracing::info!(name = %record.name, id, "inserted");
                report.outcomes.push(Persisted::Inserted {
                    name: record.name.clone(),
                    id,
                });
            }
            Ok(Upsert::Updated(id)) => {
                tracing::info!(name = %record.name, id, "updated");
                report.outcomes.push(Persisted::Updated {
                    name: record.name.clone(),
                    id,
                });
            }
            Err(e) => {
                let error = format!("{:#}", e);
                tracing::error!(name = %record.name, "failed to store: {}", error);
                report.errors.push(format!("{} {} error: {}", role, record.name, error));
                report.outcomes.push(Persisted::Failed {
                    name: record.name.clone(),
                    error,
                });
            }
        }
    }
    report
}

fn persist_record(
    store: &mut SqliteStore,
    embedder: &dyn Embedder,
    origin: &Origin,
    record: &EnrichedRecord,
) -> Result<Upsert> {
    let embedding = embed_or_zero(embedder, &summary_text(record), Some(&record.name));
    let entry = ApiEntry::from_record(record, embedding, origin)?;
    store.upsert(&entry)
}

/// Counts and details written to `processing_summary.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    pub total_files: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failed_details: Vec<(String, Vec<String>)>,
    pub skipped_list: Vec<String>,
    pub skipped_details: Vec<(String, String)>,
}

impl ProcessingSummary {
    fn skip(&mut self, name: &str, reason: &str) {
        self.skipped += 1;
        self.skipped_list.push(name.to_string());
        self.skipped_details.push((name.to_string(), reason.to_string()));
    }

    fn fail(&mut self, name: &str, errors: Vec<String>) {
        self.failed += 1;
        self.failed_details.push((name.to_string(), errors));
    }
}

/// Everything a batch run needs.
pub struct Pipeline<'a> {
    pub root: PathBuf,
    pub recursive: bool,
    pub skip: SkipRules,
    pub output_dir: PathBuf,
    pub enricher: Enricher<'a>,
    pub embedder: &'a dyn Embedder,
    pub origin: Origin,
    /// `None` for dry runs
    pub store: Option<&'a mut SqliteStore>,
}

impl Pipeline<'_> {
    pub fn run(&mut self) -> Result<ProcessingSummary> {
        let files = source_files(&self.root, self.recursive)?;
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create output directory: {}", self.output_dir.display()))?;
        tracing::info!(count = files.len(), dir = %self.root.display(), "found MATLAB files");

        let mut summary = ProcessingSummary {
            total_files: files.len(),
            ..Default::default()
        };

        for file in &files {
            let name = output_name(&self.root, file);
            let stem = file.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            if let Some(reason) = self.skip.skip_reason(&stem) {
                tracing::info!(file = %name, "skipped ({})", reason);
                summary.skip(&name, &reason);
                continue;
            }

            match self.process_file(file, &name) {
                Ok(FileOutcome::Processed) => {
                    tracing::info!(file = %name, "processed");
                    summary.processed += 1;
                }
                Ok(FileOutcome::NoMain) => {
                    tracing::warn!(file = %name, "no main function");
                    summary.skip(&name, "no main function");
                }
                Ok(FileOutcome::StoreErrors(errors)) => summary.fail(&name, errors),
                Err(e) => {
                    tracing::error!(file = %name, "{:#}", e);
                    summary.fail(&name, vec![format!("{:#}", e)]);
                }
            }
        }

        let summary_path = self.output_dir.join(SUMMARY_FILE);
        fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("failed to write {}", summary_path.display()))?;
        Ok(summary)
    }

    fn process_file(&mut self, file: &Path, name: &str) -> Result<FileOutcome> {
        let parsed = matlab_syntax::parse_path(file)?;
        if parsed.main_function.is_none() {
            return Ok(FileOutcome::NoMain);
        }

        let enriched = self.enricher.enrich_file(&parsed);
        let out_path = self.output_dir.join(format!("{}.json", name));
        fs::write(&out_path, serde_json::to_string_pretty(&enriched)?)
            .with_context(|| format!("failed to write {}", out_path.display()))?;

        let Some(store) = self.store.as_deref_mut() else {
            return Ok(FileOutcome::Processed);
        };
        let report = persist_file(store, self.embedder, &self.origin, &enriched);
        if report.errors.is_empty() {
            Ok(FileOutcome::Processed)
        } else {
            Ok(FileOutcome::StoreErrors(report.errors))
        }
    }
}

enum FileOutcome {
    Processed,
    NoMain,
    StoreErrors(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::ZeroEmbedder;
    use tempfile::TempDir;

    fn origin() -> Origin {
        Origin {
            language: "matlab".to_string(),
            source_id: "github.com/pulseq/pulseq".to_string(),
            library_version: "1.5.0".to_string(),
        }
    }

    fn write(dir: &Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn skip_rules() {
        let rules = SkipRules::default();
        assert_eq!(rules.skip_reason("testSequence").as_deref(), Some("test file"));
        assert_eq!(rules.skip_reason("Contents").as_deref(), Some("non-function file"));
        assert_eq!(rules.skip_reason("demoEpi").as_deref(), Some("demo/example file"));
        assert_eq!(rules.skip_reason("Example1").as_deref(), Some("demo/example file"));
        assert_eq!(rules.skip_reason("makeTrapezoid"), None);

        let rules = SkipRules {
            include_tests: true,
            patterns: vec!["write".to_string()],
        };
        assert_eq!(rules.skip_reason("testSequence"), None);
        assert_eq!(rules.skip_reason("writeSeq").as_deref(), Some("matches pattern: write"));
    }

    #[test]
    fn output_names() {
        let root = Path::new("/src/matlab");
        assert_eq!(output_name(root, Path::new("/src/matlab/makeAdc.m")), "makeAdc");
        assert_eq!(
            output_name(root, Path::new("/src/matlab/+mr/@Sequence/write.m")),
            "+mr.@Sequence.write"
        );
    }

    #[test]
    fn discovers_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.m", "function b()\n");
        write(dir.path(), "a.m", "function a()\n");
        write(dir.path(), "+pkg/c.m", "function c()\n");
        write(dir.path(), "notes.txt", "");

        let flat = source_files(dir.path(), false).unwrap();
        let names: Vec<String> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.m", "b.m"]);
        assert_eq!(source_files(dir.path(), true).unwrap().len(), 3);
        assert!(source_files(&dir.path().join("missing"), false).is_err());
    }

    #[test]
    fn dry_run_writes_json_and_summary() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "makeDelay.m", "function del = makeDelay(delay)\ndel.delay = delay;\n");
        write(src.path(), "testAll.m", "function testAll()\n");
        write(src.path(), "script.m", "x = 1;\n");

        let embedder = ZeroEmbedder::new(8);
        let mut pipeline = Pipeline {
            root: src.path().to_path_buf(),
            recursive: false,
            skip: SkipRules::default(),
            output_dir: out.path().to_path_buf(),
            enricher: Enricher::new(None),
            embedder: &embedder,
            origin: origin(),
            store: None,
        };
        let summary = pipeline.run().unwrap();
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(
            summary.skipped_details,
            [
                ("script".to_string(), "no main function".to_string()),
                ("testAll".to_string(), "test file".to_string())
            ]
        );
        assert!(out.path().join("makeDelay.json").is_file());
        assert!(out.path().join(SUMMARY_FILE).is_file());
    }

    #[test]
    fn persists_main_helpers_and_public_internal() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(
            src.path(),
            "Shape.m",
            "classdef Shape\n  methods\n    function obj = Shape(w)\n    end\n    function a = area(obj)\n    end\n  end\nend\n\n\
             function v = clampPositive(x)\n  v = max(x, 0);\nend\n\n\
             function v = hiddenStep(x)\n  % internal step\n  v = x;\nend\n",
        );

        let embedder = ZeroEmbedder::new(4);
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut pipeline = Pipeline {
            root: src.path().to_path_buf(),
            recursive: false,
            skip: SkipRules::default(),
            output_dir: out.path().to_path_buf(),
            enricher: Enricher::new(None),
            embedder: &embedder,
            origin: origin(),
            store: Some(&mut store),
        };
        let summary = pipeline.run().unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 0);

        let names: Vec<String> = store
            .list("matlab", "1.5.0", None)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["Shape", "area", "clampPositive"]);
        let class = store.get("Shape", "matlab", "1.5.0").unwrap().unwrap();
        assert_eq!(class.function_type, "class");
        assert_eq!(class.required_count(), 1);
    }
}
