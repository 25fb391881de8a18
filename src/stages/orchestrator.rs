//! Compiler: runs every entry point of a folder through the stages
//!
//! For each entry-point file the stages run strictly in sequence:
//!
//! 1. Load the entry document.
//! 2. Resolve its includes ([`include`](super::include)).
//! 3. Take the trigger and nested-pipelines keys out of the merged document.
//! 4. Resolve `extends` ([`extends`](super::extends)).
//! 5. Resolve reference markers ([`reference`](super::reference)).
//! 6. Assemble the [`Pipeline`] and compile its nested pipelines folder.
//!
//! Entry points are independent of each other and are compiled on a bounded
//! rayon pool. A failure aborts only the entry point it happened in; the
//! [`CompileReport`] carries both the pipelines that compiled and the ones
//! that did not.

use std::path::Path;

use glob::Pattern;
use log::{debug, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::cache::SourceCache;
use crate::config::CompilerConfig;
use crate::document::load_bytes;
use crate::error::{Error, Result};
use crate::pipeline::{ChangesTrigger, Pipeline, PipelinesConfig};
use crate::reader::{normalize_path, IncludeSources};
use crate::stages::extends::resolve_extends_with;
use crate::stages::include::{IncludeDirective, IncludeResolver};
use crate::stages::reference::resolve_references;

/// One entry point that failed to compile.
#[derive(Debug)]
pub struct PipelineFailure {
    /// Identifier of the failed pipeline; `outer/inner` for nested ones.
    pub identifier: String,
    /// Always an `Error::Pipeline` naming the entry file.
    pub error: Error,
}

/// Outcome of compiling a folder.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub config: PipelinesConfig,
    pub failures: Vec<PipelineFailure>,
}

impl CompileReport {
    /// True when every entry point (nested ones included) compiled.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure(&self, identifier: &str) -> Option<&PipelineFailure> {
        self.failures
            .iter()
            .find(|failure| failure.identifier == identifier)
    }
}

/// Compiles pipeline folders read through a set of include sources.
#[derive(Debug, Clone)]
pub struct Compiler {
    config: CompilerConfig,
    sources: IncludeSources,
}

impl Compiler {
    pub fn new(config: CompilerConfig, sources: IncludeSources) -> Self {
        Self { config, sources }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn sources(&self) -> &IncludeSources {
        &self.sources
    }

    /// Compile every entry point found directly in `folder`.
    ///
    /// Only failures that prevent looking at the folder at all (it cannot be
    /// listed, the worker pool cannot start) are returned as errors.
    pub fn compile(&self, folder: &str) -> Result<CompileReport> {
        let run = Run::new(self)?;
        let folder = normalize_path(folder);
        run.compile_folder(&folder, &[])
    }

    /// Compile the configured `pipelines-folder`.
    pub fn compile_configured(&self) -> Result<CompileReport> {
        self.compile(&self.config.pipelines_folder)
    }

    /// Compile a single entry point.
    ///
    /// The report holds the pipeline on success, or its failure; failures of
    /// its nested pipelines are reported alongside.
    pub fn compile_entry(&self, path: &str) -> Result<CompileReport> {
        let run = Run::new(self)?;
        let path = normalize_path(path);
        let folder = parent_folder(&path);
        let identifier = identifier_for(&path);

        let mut report = CompileReport {
            config: PipelinesConfig::new(&folder),
            failures: Vec::new(),
        };
        let outcome = run.compile_pipeline(&identifier, &path, &[folder.clone()]);
        run.collect(&mut report, identifier, &path, outcome);
        Ok(report)
    }
}

type PipelineOutcome = Result<(Pipeline, Vec<PipelineFailure>)>;

/// State of one compilation run: the worker pool and the include cache
/// shared by all of its entry points.
struct Run<'c> {
    compiler: &'c Compiler,
    cache: SourceCache,
    pool: ThreadPool,
}

impl<'c> Run<'c> {
    fn new(compiler: &'c Compiler) -> Result<Self> {
        let workers = compiler.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("ci-compose-{}", index))
            .build()
            .map_err(|err| Error::WorkerPool {
                message: err.to_string(),
            })?;
        debug!("Compiling with {} worker threads", workers);

        Ok(Self {
            compiler,
            cache: SourceCache::new(),
            pool,
        })
    }

    /// `stack` holds the folders already being compiled above this one.
    fn compile_folder(&self, folder: &str, stack: &[String]) -> Result<CompileReport> {
        let mut report = CompileReport {
            config: PipelinesConfig::new(folder),
            failures: Vec::new(),
        };

        let entries = self.discover(folder, &mut report)?;
        debug!("Found {} entry points in '{}'", entries.len(), folder);

        let mut stack = stack.to_vec();
        stack.push(folder.to_string());

        let outcomes: Vec<PipelineOutcome> = self.pool.install(|| {
            entries
                .par_iter()
                .map(|(identifier, path)| self.compile_pipeline(identifier, path, &stack))
                .collect()
        });

        for ((identifier, path), outcome) in entries.into_iter().zip(outcomes) {
            self.collect(&mut report, identifier, &path, outcome);
        }
        report
            .failures
            .sort_by(|a, b| a.identifier.cmp(&b.identifier));

        Ok(report)
    }

    fn collect(
        &self,
        report: &mut CompileReport,
        identifier: String,
        path: &str,
        outcome: PipelineOutcome,
    ) {
        match outcome {
            Ok((pipeline, nested_failures)) => {
                debug!("Compiled pipeline '{}' from {}", identifier, path);
                report.failures.extend(nested_failures.into_iter().map(|failure| {
                    PipelineFailure {
                        identifier: format!("{}/{}", identifier, failure.identifier),
                        error: failure.error,
                    }
                }));
                report.config.insert(pipeline);
            }
            Err(error) => {
                let error = error.in_pipeline(path);
                warn!("{}", error);
                report.failures.push(PipelineFailure { identifier, error });
            }
        }
    }

    /// Entry points directly inside `folder`, as `(identifier, path)` pairs
    /// sorted by identifier. Duplicate identifiers are recorded as failures.
    fn discover(&self, folder: &str, report: &mut CompileReport) -> Result<Vec<(String, String)>> {
        let patterns = self
            .compiler
            .config
            .entry_patterns
            .iter()
            .map(|pattern| Pattern::new(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder)
        };

        let mut entries: Vec<(String, String)> = Vec::new();
        for path in self.compiler.sources.local().list(folder)? {
            let Some(name) = path.strip_prefix(&prefix) else {
                continue;
            };
            if name.contains('/') || !patterns.iter().any(|pattern| pattern.matches(name)) {
                continue;
            }

            let identifier = identifier_for(name);
            if entries.iter().any(|(existing, _)| *existing == identifier) {
                let error = Error::DuplicatePipeline {
                    identifier: identifier.clone(),
                    path: path.clone(),
                }
                .in_pipeline(&path);
                warn!("{}", error);
                report.failures.push(PipelineFailure { identifier, error });
                continue;
            }
            entries.push((identifier, path));
        }

        entries.sort();
        Ok(entries)
    }

    fn compile_pipeline(&self, identifier: &str, path: &str, stack: &[String]) -> PipelineOutcome {
        let config = &self.compiler.config;
        let sources = &self.compiler.sources;

        let bytes = sources.local().read(path, None)?;
        let document = load_bytes(&bytes, path)?;

        let resolver =
            IncludeResolver::new(sources, &self.cache).with_array_merge(config.array_merge);
        let mut merged = resolver.resolve_entry(&document, &IncludeDirective::local(path))?;

        let triggers = match merged.remove(config.trigger_key.as_str()) {
            Some(value) => ChangesTrigger::from_value(&value)?,
            None => ChangesTrigger::default(),
        };
        let nested_folder = merged.remove(config.nested_key.as_str());

        let definitions = resolve_extends_with(&merged, config.array_merge)?;
        let resolved = resolve_references(&definitions)?;
        let mut pipeline = Pipeline::from_resolved(identifier, path, triggers, resolved);

        let mut nested_failures = Vec::new();
        if let Some(value) = nested_folder {
            let folder = value
                .as_str()
                .map(normalize_path)
                .ok_or_else(|| Error::InvalidDefinition {
                    name: config.nested_key.clone(),
                    message: "must be the path of a pipelines folder".to_string(),
                })?;

            if let Some(start) = stack.iter().position(|visiting| *visiting == folder) {
                let mut chain = stack[start..].to_vec();
                chain.push(folder);
                return Err(Error::CyclicPipelineNesting { chain });
            }

            debug!("Pipeline '{}' nests '{}'", identifier, folder);
            let report = self.compile_folder(&folder, stack)?;
            nested_failures = report.failures;
            pipeline.nested = Some(report.config);
        }

        Ok((pipeline, nested_failures))
    }
}

/// Pipeline identifier of an entry file: its file name without extension.
fn identifier_for(path: &str) -> String {
    let path = Path::new(path);
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_folder(path: &str) -> String {
    match path.rfind('/') {
        Some(index) => path[..index].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFS;
    use serde_yaml::Value;

    fn compiler(fs: MemoryFS) -> Compiler {
        let config = CompilerConfig {
            pipelines_folder: "pipelines".to_string(),
            jobs: Some(2),
            ..Default::default()
        };
        Compiler::new(config, IncludeSources::new(fs))
    }

    #[test]
    fn test_identifier_for() {
        assert_eq!(identifier_for("pipelines/backend.yml"), "backend");
        assert_eq!(identifier_for("web.gitlab-ci.yaml"), "web.gitlab-ci");
        assert_eq!(parent_folder("pipelines/backend.yml"), "pipelines");
        assert_eq!(parent_folder("main.yml"), "");
    }

    #[test]
    fn test_compile_folder_selects_direct_yaml_children() {
        let fs = MemoryFS::new()
            .with_file("pipelines/a.yml", "job:\n  script: [a]\n")
            .unwrap()
            .with_file("pipelines/b.yaml", "job:\n  script: [b]\n")
            .unwrap()
            .with_file("pipelines/readme.md", "# not a pipeline\n")
            .unwrap()
            .with_file("pipelines/sub/c.yml", "job:\n  script: [c]\n")
            .unwrap();

        let report = compiler(fs).compile_configured().unwrap();
        assert!(report.is_success());
        assert_eq!(
            report.config.identifiers().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(report.config.folder, "pipelines");
    }

    #[test]
    fn test_trigger_and_nested_keys_are_not_definitions() {
        let fs = MemoryFS::new()
            .with_file(
                "pipelines/a.yml",
                "changes:\n  paths: [src/**]\njob:\n  script: [a]\n",
            )
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        let pipeline = report.config.get("a").unwrap();
        assert!(pipeline.definition("changes").is_none());
        assert_eq!(pipeline.triggers.patterns(), vec!["src/**"]);
        assert!(pipeline.to_document().get("changes").is_none());
    }

    #[test]
    fn test_triggers_can_come_from_includes() {
        let fs = MemoryFS::new()
            .with_file("ci/triggers.yml", "changes: [lib/**]\n")
            .unwrap()
            .with_file("pipelines/a.yml", "include: ci/triggers.yml\njob: {script: [a]}\n")
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        assert!(report.config.get("a").unwrap().triggers.matches("lib/x.rs"));
    }

    #[test]
    fn test_duplicate_stems_are_reported() {
        let fs = MemoryFS::new()
            .with_file("pipelines/a.yaml", "job: {script: [one]}\n")
            .unwrap()
            .with_file("pipelines/a.yml", "job: {script: [two]}\n")
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        assert_eq!(report.config.len(), 1);
        let failure = report.failure("a").unwrap();
        assert!(matches!(
            failure.error.root_cause(),
            Error::DuplicatePipeline { .. }
        ));
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let err = compiler(MemoryFS::new()).compile("nowhere").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_failure_is_wrapped_with_entry_path() {
        let fs = MemoryFS::new()
            .with_file("pipelines/bad.yml", "job:\n  extends: .missing\n")
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        let failure = report.failure("bad").unwrap();
        match &failure.error {
            Error::Pipeline { path, source } => {
                assert_eq!(path, "pipelines/bad.yml");
                assert!(matches!(**source, Error::UnknownParent { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_trigger_fails_pipeline() {
        let fs = MemoryFS::new()
            .with_file("pipelines/a.yml", "changes: ['src/[oops']\n")
            .unwrap();
        let report = compiler(fs).compile("pipelines").unwrap();
        assert!(matches!(
            report.failure("a").unwrap().error.root_cause(),
            Error::InvalidTrigger { .. }
        ));
    }

    #[test]
    fn test_nested_pipelines_are_compiled() {
        let fs = MemoryFS::new()
            .with_file(
                "pipelines/web.yml",
                "changes: [web/**]\npipelines: pipelines/web\nbuild: {script: [make]}\n",
            )
            .unwrap()
            .with_file("pipelines/web/ui.yml", "changes: [web/ui/**]\nlint: {script: [eslint]}\n")
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        assert!(report.is_success());

        let web = report.config.get("web").unwrap();
        let nested = web.nested.as_ref().unwrap();
        assert_eq!(nested.folder, "pipelines/web");
        assert!(nested.get("ui").is_some());
        // The nested folder is not picked up as an entry of the outer one
        assert_eq!(report.config.len(), 1);
    }

    #[test]
    fn test_nested_failures_are_qualified() {
        let fs = MemoryFS::new()
            .with_file("pipelines/web.yml", "pipelines: pipelines/web\n")
            .unwrap()
            .with_file("pipelines/web/ok.yml", "job: {script: [ok]}\n")
            .unwrap()
            .with_file("pipelines/web/broken.yml", "job: {script: !reference [.nope, script]}\n")
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        assert!(report.config.get("web").is_some());
        assert!(report.failure("web/broken").is_some());
        assert!(report.config.get("web").unwrap().nested.as_ref().unwrap().get("ok").is_some());
    }

    #[test]
    fn test_cyclic_pipeline_nesting() {
        let fs = MemoryFS::new()
            .with_file("pipelines/a.yml", "pipelines: pipelines/inner\n")
            .unwrap()
            .with_file("pipelines/inner/b.yml", "pipelines: pipelines\n")
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        let failure = report.failure("a/b").unwrap();
        match failure.error.root_cause() {
            Error::CyclicPipelineNesting { chain } => {
                assert_eq!(chain, &vec!["pipelines", "pipelines/inner", "pipelines"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pipeline_nesting_its_own_folder() {
        let fs = MemoryFS::new()
            .with_file("pipelines/a.yml", "pipelines: ./pipelines/\n")
            .unwrap();
        let report = compiler(fs).compile("pipelines").unwrap();
        assert!(matches!(
            report.failure("a").unwrap().error.root_cause(),
            Error::CyclicPipelineNesting { .. }
        ));
    }

    #[test]
    fn test_compile_entry() {
        let fs = MemoryFS::new()
            .with_file("ci/main.yml", "job: {script: [x]}\n")
            .unwrap();
        let report = compiler(fs).compile_entry("ci/main.yml").unwrap();
        assert!(report.is_success());
        assert_eq!(report.config.folder, "ci");
        let job = report.config.get("main").unwrap().definition("job").unwrap();
        assert_eq!(
            job.body.get("script"),
            Some(&Value::Sequence(vec![Value::from("x")]))
        );

        let report = compiler(MemoryFS::new()).compile_entry("ci/missing.yml").unwrap();
        assert!(matches!(
            report.failure("missing").unwrap().error.root_cause(),
            Error::NotFound { .. }
        ));
    }

    #[test]
    fn test_shared_include_is_cached_across_entries() {
        let fs = MemoryFS::new()
            .with_file("ci/common.yml", ".base: {image: alpine}\n")
            .unwrap()
            .with_file("pipelines/a.yml", "include: ci/common.yml\na: {extends: .base}\n")
            .unwrap()
            .with_file("pipelines/b.yml", "include: ci/common.yml\nb: {extends: .base}\n")
            .unwrap();

        let report = compiler(fs).compile("pipelines").unwrap();
        assert!(report.is_success());
        for (identifier, job) in [("a", "a"), ("b", "b")] {
            let body = &report.config.get(identifier).unwrap().definition(job).unwrap().body;
            assert_eq!(body.get("image"), Some(&Value::from("alpine")));
        }
    }
}
