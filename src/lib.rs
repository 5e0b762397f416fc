pub mod archive;
pub mod codegen;
pub mod error;
pub mod graph;
pub mod ir;
pub mod manifest;
pub mod parser;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use anyhow::{Context, Result};
use error::CompileResult;
use ir::Forest;
use parser::ParseOptions;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use error::CompileError;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub parse: ParseOptions,
}

/// Everything one compile produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub forest: Forest,
    pub python: String,
    pub graph: String,
}

/// Manifest filter, parser, generator and renderer over an in-memory `project.json`.
pub fn compile_manifest(project: &Value, options: CompileOptions) -> CompileResult<Compiled> {
    let forest = lower_manifest(project, options)?;
    let python = codegen::generate(&forest)?;
    let graph = graph::render(&forest);
    Ok(Compiled {
        forest,
        python,
        graph,
    })
}

pub fn lower_manifest(project: &Value, options: CompileOptions) -> CompileResult<Forest> {
    let manifest = manifest::filter_manifest(project)?;
    parser::parse(&manifest, options.parse)
}

pub fn compile_project_json(source: &str, options: CompileOptions) -> Result<Compiled> {
    let project: Value = serde_json::from_str(source).context("Invalid project.json.")?;
    Ok(compile_manifest(&project, options)?)
}

pub fn compile_lms_file(input: &Path, options: CompileOptions) -> Result<Compiled> {
    let input = canonicalize_file(input)?;
    let project = archive::read_lms(&input)?;
    compile_manifest(&project, options)
        .with_context(|| format!("Failed to compile '{}'.", input.display()))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    let options = CompileOptions {
        parse: ParseOptions {
            best_effort: args.best_effort,
        },
    };

    let total_stages = 4 + usize::from(args.output.is_some());
    let progress = CliProgress::new("Compile", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Resolving input path");
    let input = canonicalize_file(&args.input)?;

    stage += 1;
    progress.emit(stage, "Reading .lms archive");
    let project = archive::read_lms(&input)?;

    stage += 1;
    progress.emit(stage, "Filtering manifest and lowering blocks");
    let forest = lower_manifest(&project, options)
        .with_context(|| format!("Failed to lower '{}'.", input.display()))?;

    stage += 1;
    progress.emit(stage, "Generating Python");
    let python = codegen::generate(&forest)
        .with_context(|| format!("Failed to generate Python for '{}'.", input.display()))?;

    if let Some(output) = &args.output {
        stage += 1;
        progress.emit(stage, "Writing Python program");
        std::fs::write(output, python.as_bytes())
            .with_context(|| format!("Failed to write '{}'.", output.display()))?;
    }

    if args.python {
        print!("{}", python);
    } else {
        println!("{}", graph::render(&forest));
    }
    Ok(())
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
