//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which shows the compiled
//! pipeline hierarchy: the pipelines folder at the root, one node per
//! pipeline, and nested pipelines beneath the pipeline that declares them.
//!
//! With `--jobs-shown`, the runnable jobs of each pipeline are listed as
//! leaves. `--depth` limits how many levels of nesting are displayed.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};

use ci_compose::pipeline::{Pipeline, PipelinesConfig};

use super::{load_compiler, report_failures, SourceArgs};

/// Display the pipeline hierarchy
#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum depth to display in the tree.
    ///
    /// Use 0 to show only the pipelines folder, 1 to show top-level
    /// pipelines, 2 to show their nested pipelines, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,

    /// List the runnable jobs of each pipeline as leaves.
    #[arg(long)]
    pub jobs_shown: bool,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs) -> Result<()> {
    let session = load_compiler(&args.source)?;
    let report = session.compile()?;
    report_failures(&report);

    let root = build_tree(
        &report.config,
        args.depth.unwrap_or(usize::MAX),
        args.jobs_shown,
    );
    print_tree(&root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;

    Ok(())
}

fn build_tree(config: &PipelinesConfig, max_depth: usize, jobs_shown: bool) -> TreeNode {
    TreeNode {
        label: format!("{}/", config.folder),
        children: folder_children(config, max_depth, 1, jobs_shown),
    }
}

fn folder_children(
    config: &PipelinesConfig,
    max_depth: usize,
    depth: usize,
    jobs_shown: bool,
) -> Vec<TreeNode> {
    if depth > max_depth {
        return Vec::new();
    }
    config
        .pipelines
        .values()
        .map(|pipeline| pipeline_node(pipeline, max_depth, depth, jobs_shown))
        .collect()
}

fn pipeline_node(pipeline: &Pipeline, max_depth: usize, depth: usize, jobs_shown: bool) -> TreeNode {
    let patterns = pipeline.triggers.patterns();
    let label = if patterns.is_empty() {
        pipeline.identifier.clone()
    } else {
        format!("{} [{}]", pipeline.identifier, patterns.join(", "))
    };

    let mut children = Vec::new();
    if jobs_shown {
        children.extend(pipeline.jobs().map(|job| TreeNode {
            label: format!("job: {}", job.name),
            children: Vec::new(),
        }));
    }
    if let Some(nested) = &pipeline.nested {
        children.extend(folder_children(nested, max_depth, depth + 1, jobs_shown));
    }

    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
