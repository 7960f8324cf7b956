//! Driver CLI: samples → generation 0 → string resolution → schema view.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;

use crate::graph::{StringTypeMapping, TransformedStringKind, TypeGraph};
use crate::inference::{Inference, InferenceOptions};
use crate::run::{EnumInference, RunContext};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer a type graph from JSON/NDJSON samples and resolve its string types
#[derive(Parser, Debug)]
#[command(name = "json-typegraph")]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// infer, resolve strings and print the JSON-schema-ish view
    Infer(SchemaOut),
    /// infer, resolve strings and print the node tables of both generations
    Graph(GraphOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// name of the top-level type
    #[arg(long, default_value = "Root")]
    top_level: String,

    /// keep every string literal instead of recognising dates, uuids, uris, …
    #[arg(long, default_value_t = false)]
    no_formats: bool,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct RunSettings {
    /// JSON run config (string-type-mapping, enum-inference, debug-print-reconstitution)
    #[arg(long)]
    config: Option<PathBuf>,

    /// how string cases become enums
    #[arg(long, value_enum)]
    enum_inference: Option<EnumInference>,

    /// fold a sub-format into plain string (repeatable)
    #[arg(long, value_enum)]
    fold: Vec<TransformedStringKind>,

    /// log every old → new binding made by each rewrite
    #[arg(long, default_value_t = false)]
    trace_rewrites: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    run_settings: RunSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct GraphOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    run_settings: RunSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Read and parse every input file (in parallel), then feed the selected
    /// documents to `apply` in input order.
    fn load_process(&self, mut apply: impl FnMut(serde_json::Value)) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let parsed: Vec<Vec<serde_json::Value>> = source_paths
            .par_iter()
            .map(|path| self.load_file(path))
            .collect::<Result<_>>()?;

        for documents in parsed {
            for document in documents {
                match self.json_pointer.as_deref() {
                    None => apply(document),
                    Some(pointer) => match document.pointer(pointer) {
                        Some(selected) => apply(selected.clone()),
                        None => tracing::warn!(pointer, "JSON pointer matched nothing; skipping document"),
                    },
                }
            }
        }
        Ok(())
    }

    fn load_file(&self, source_path: &Path) -> Result<Vec<serde_json::Value>> {
        let source_path_str = source_path.display();
        let source = std::fs::read_to_string(source_path)
            .with_context(|| format!("failed to read source file ({source_path_str})"))?;
        if !self.ndjson {
            let value = serde_json::from_str(&source)
                .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
            return Ok(vec![value]);
        }
        source
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(ix, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("failed to parse NDJSON line {} ({source_path_str})", ix + 1)
                })
            })
            .collect()
    }

    fn infer(&self) -> Result<TypeGraph> {
        let options = InferenceOptions { detect_formats: !self.no_formats };
        let mut inf = Inference::new(options);
        self.load_process(|value| inf.observe_value(&value))?;
        tracing::debug!(samples = inf.samples(), "observed samples");
        let evidence = inf.solve();
        crate::lower::lower_to_graph([(self.top_level.as_str(), &evidence)])
            .context("failed to build the first generation")
    }
}

impl RunSettings {
    fn load(&self) -> Result<RunContext> {
        let mut ctx = match self.config.as_ref() {
            None => RunContext::default(),
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read run config ({})", path.display()))?;
                serde_json::from_str(&source)
                    .with_context(|| format!("invalid run config ({})", path.display()))?
            }
        };
        if let Some(mode) = self.enum_inference {
            ctx.enum_inference = mode;
        }
        ctx.string_type_mapping = self
            .fold
            .iter()
            .fold(ctx.string_type_mapping, |mapping: StringTypeMapping, kind| mapping.fold(*kind));
        ctx.debug_print_reconstitution |= self.trace_rewrites;
        Ok(ctx)
    }
}

/// generation 0 plus the generation after string resolution
fn run_passes(input: &InputSettings, run: &RunSettings) -> Result<(TypeGraph, TypeGraph)> {
    let ctx = run.load()?;
    let initial = input.infer()?;
    let resolved =
        crate::passes::expand_strings(&ctx, &initial).context("string resolution failed")?;
    Ok((initial, resolved))
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        init_logging(self.verbose, self.trace_requested());
        match &self.cmd {
            Command::Infer(target) => {
                let (_, resolved) = run_passes(&target.input_settings, &target.run_settings)?;
                let schema = crate::emit::emit_schema(&resolved)?;
                let schema_src = serde_json::to_string_pretty(&schema)?;
                write_output(target.out.as_deref(), &schema_src)
            }
            Command::Graph(target) => {
                let (initial, resolved) = run_passes(&target.input_settings, &target.run_settings)?;
                println!("{}", crate::emit::render_node_table(&initial));
                print!("{}", crate::emit::render_node_table(&resolved));
                Ok(())
            }
        }
    }

    fn trace_requested(&self) -> bool {
        match &self.cmd {
            Command::Infer(target) => target.run_settings.trace_rewrites,
            Command::Graph(target) => target.run_settings.trace_rewrites,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn init_logging(verbose: u8, trace_rewrites: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match verbose {
        0 if trace_rewrites => "info",
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory ({})", parent.display()))?;
    }
    std::fs::write(out, contents)
        .with_context(|| format!("failed to write output ({})", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_infer_command() {
        let cli = CommandLineInterface::try_parse_from([
            "json-typegraph",
            "infer",
            "-i",
            "a.json",
            "b.json",
            "--enum-inference",
            "all",
            "--fold",
            "date-time",
            "--fold",
            "uuid",
        ])
        .unwrap();
        let Command::Infer(target) = &cli.cmd else { panic!("expected infer") };
        assert_eq!(target.input_settings.input, vec!["a.json", "b.json"]);
        let ctx = target.run_settings.load().unwrap();
        assert_eq!(ctx.enum_inference, EnumInference::All);
        assert_eq!(
            ctx.string_type_mapping,
            StringTypeMapping::default()
                .fold(TransformedStringKind::DateTime)
                .fold(TransformedStringKind::Uuid)
        );
        assert!(!ctx.debug_print_reconstitution);
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["x.json", "dir/y.ndjson"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("x.json"), PathBuf::from("dir/y.ndjson")]);
    }
}
