//! Benchmarks for compiling pipeline folders.
//!
//! The fixtures model a monorepo: a set of shared template files, and many
//! entry points that include them and extend their hidden templates.

use ci_compose::config::CompilerConfig;
use ci_compose::document::load;
use ci_compose::filesystem::MemoryFS;
use ci_compose::merge::merge;
use ci_compose::reader::IncludeSources;
use ci_compose::stages::{resolve_extends, resolve_references, Compiler};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Shared templates plus `pipelines` entry points using them.
fn create_monorepo_fs(pipelines: usize) -> MemoryFS {
    let mut fs = MemoryFS::new();

    fs.add_file_string(
        "ci/templates/base.yml",
        ".base:\n  image: alpine:3.19\n  tags: [linux]\n  before_script: [apk add make]\n",
    )
    .unwrap();
    fs.add_file_string(
        "ci/templates/build.yml",
        "include: ci/templates/base.yml\n.build:\n  extends: .base\n  stage: build\n  script: [make build]\n",
    )
    .unwrap();
    fs.add_file_string(
        "ci/templates/test.yml",
        "include: ci/templates/base.yml\n.test:\n  extends: .base\n  stage: test\n  script: [make test]\n",
    )
    .unwrap();

    for i in 0..pipelines {
        fs.add_file_string(
            format!("pipelines/service{}.yml", i),
            &format!(
                "include: [ci/templates/build.yml, ci/templates/test.yml]\n\
                 changes: [services/service{i}/, libs/common/**]\n\
                 stages: [build, test]\n\
                 build-{i}:\n  extends: .build\n  variables: {{SERVICE: service{i}}}\n\
                 test-{i}:\n  extends: .test\n  before_script: !reference [.base, before_script]\n",
                i = i
            ),
        )
        .unwrap();
    }

    fs
}

fn compiler(fs: MemoryFS, jobs: usize) -> Compiler {
    let config = CompilerConfig {
        pipelines_folder: "pipelines".to_string(),
        jobs: Some(jobs),
        ..Default::default()
    };
    Compiler::new(config, IncludeSources::new(fs))
}

/// Whole-folder compilation at different sizes and worker counts.
fn bench_compile_folder(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_folder");

    for pipelines in [10, 100] {
        for jobs in [1, 4] {
            let compiler = compiler(create_monorepo_fs(pipelines), jobs);
            group.bench_with_input(
                BenchmarkId::new(format!("jobs_{}", jobs), pipelines),
                &compiler,
                |b, compiler| b.iter(|| black_box(compiler.compile_configured().unwrap())),
            );
        }
    }

    group.finish();
}

/// The in-document stages on an already merged document.
fn bench_resolve_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_stages");

    let mut text = String::from(".base:\n  image: alpine\n  script: [echo base]\n");
    for i in 0..200 {
        text.push_str(&format!(
            ".layer{i}:\n  extends: {parent}\n  variables: {{LAYER: '{i}'}}\n",
            i = i,
            parent = if i == 0 { ".base".to_string() } else { format!(".layer{}", i - 1) }
        ));
        text.push_str(&format!(
            "job{i}:\n  extends: .layer{i}\n  after_script: !reference [.base, script]\n",
            i = i
        ));
    }
    let document = load(&text).unwrap();

    group.bench_function("extends_chain", |b| {
        b.iter(|| black_box(resolve_extends(&document).unwrap()))
    });

    let definitions = resolve_extends(&document).unwrap();
    group.bench_function("references", |b| {
        b.iter(|| black_box(resolve_references(&definitions).unwrap()))
    });

    group.finish();
}

/// Deep merge of two wide, nested mappings.
fn bench_merge(c: &mut Criterion) {
    let mut base = String::new();
    let mut overlay = String::new();
    for i in 0..100 {
        base.push_str(&format!("key{i}:\n  a: {i}\n  nested: {{x: 1, y: [1, 2]}}\n", i = i));
        if i % 2 == 0 {
            overlay.push_str(&format!("key{i}:\n  b: {i}\n  nested: {{y: [3]}}\n", i = i));
        }
    }
    let base = load(&base).unwrap();
    let overlay = load(&overlay).unwrap();

    c.bench_function("merge_wide", |b| {
        b.iter(|| black_box(merge(&base, &overlay)))
    });
}

criterion_group!(benches, bench_compile_folder, bench_resolve_stages, bench_merge);
criterion_main!(benches);
