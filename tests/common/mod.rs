//! Shared test utilities for the CLI end-to-end tests.
//!
//! Add `mod common;` to a test file, then:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_sample_pipelines();
//!     fixture.command().arg("ls").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::pipelines;
    pub use super::TestFixture;
}

/// Pipeline documents used across the CLI tests.
#[allow(dead_code)]
pub mod pipelines {
    /// Shared templates included by the sample pipelines.
    pub const TEMPLATES: &str = r#"
.build:
  image: golang:1.22
  script: [go build ./...]
"#;

    /// A backend pipeline triggered by Go sources.
    pub const BACKEND: &str = r#"
include: ci/templates.yml
changes: [src/**, go.mod]
stages: [build]
build:
  extends: .build
  stage: build
"#;

    /// A docs pipeline triggered by Markdown files at the root.
    pub const DOCS: &str = r#"
changes: ['*.md', docs/]
lint:
  script: [markdownlint .]
"#;

    /// A web pipeline with nested pipelines of its own.
    pub const WEB: &str = r#"
changes: [web/]
pipelines: .gitlab/pipelines/web
setup:
  script: [npm ci]
"#;

    /// A nested pipeline under `web`.
    pub const WEB_UI: &str = r#"
changes: [web/ui/**]
ui-test:
  script: [npm test]
"#;

    /// A pipeline whose reference points nowhere.
    pub const DANGLING: &str = r#"
job:
  script: !reference [.nowhere, script]
"#;
}

/// A temporary repository the CLI can be pointed at.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add an entry point to the default pipelines folder.
    pub fn with_pipeline(self, name: &str, content: &str) -> Self {
        self.with_file(&format!(".gitlab/pipelines/{}.yml", name), content)
    }

    /// Add a `.ci-compose.yaml` settings file.
    #[allow(dead_code)]
    pub fn with_settings(self, content: &str) -> Self {
        self.with_file(".ci-compose.yaml", content)
    }

    /// The backend, docs and web pipelines, with web nesting `ui`.
    #[allow(dead_code)]
    pub fn with_sample_pipelines(self) -> Self {
        self.with_file("ci/templates.yml", pipelines::TEMPLATES)
            .with_pipeline("backend", pipelines::BACKEND)
            .with_pipeline("docs", pipelines::DOCS)
            .with_pipeline("web", pipelines::WEB)
            .with_file(".gitlab/pipelines/web/ui.yml", pipelines::WEB_UI)
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command running in this fixture's directory, with colors off.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ci-compose");
        cmd.current_dir(self.path())
            .env_remove("CI_COMPOSE_ROOT")
            .env_remove("CI_COMPOSE_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
