use std::fs;
use std::path::{Path, PathBuf};

use argspec_catalog::Catalog;
use argspec_core::{
    ArgsSpool, CompiledGrammar, Diagnostic, GrammarNode, PresenceFacts, Recognition,
    RecognitionOptions, compile_cached, parse, recognize_with, tokenize,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;

/// Output format for every subcommand that prints structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Plain,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "argspec")]
#[command(about = "Usage-grammar checking and command-line recognition")]
struct Cli {
    /// Log debug events to stderr (RUST_LOG still applies).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the tokens of a usage grammar.
    Tokenize(SpecArgs),
    /// Print the canonical form and tree of a usage grammar.
    Parse(SpecArgs),
    /// Print the compiled conditions of every declared symbol.
    Conditions(SpecArgs),
    /// Recognize arguments against a usage grammar.
    Check(CheckArgs),
    /// Recognize arguments against a command from a catalog.
    Run(RunArgs),
    /// Recognize one invocation per input line, in parallel.
    Batch(BatchArgs),
    /// Load and validate one or more catalog files.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct SpecArgs {
    /// Usage grammar, e.g. "[-d|--rm] <IMAGE>".
    spec: String,
    /// Output format.
    #[arg(long, default_value = "plain")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Usage grammar to recognize against.
    spec: String,
    /// Arguments to recognize, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
    /// Do not report options the grammar does not declare.
    #[arg(long)]
    allow_unknown: bool,
    /// Do not report surplus positional words.
    #[arg(long)]
    allow_surplus: bool,
    /// Output format.
    #[arg(long, default_value = "plain")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Catalog file (YAML, or JSON with a .json extension).
    #[arg(long)]
    catalog: PathBuf,
    /// Command name or alias.
    command: String,
    /// Arguments to recognize, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
    /// Output format.
    #[arg(long, default_value = "plain")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// Catalog file (YAML, or JSON with a .json extension).
    #[arg(long)]
    catalog: PathBuf,
    /// File with one `command arg...` invocation per line.
    #[arg(long)]
    input: PathBuf,
    /// Number of parallel recognition jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
    /// Output format.
    #[arg(long, default_value = "plain")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Catalog files to validate.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

/// Whether the recognized invocations were all accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    fn of(diagnostics: &[Diagnostic]) -> Self {
        if diagnostics.is_empty() {
            Self::Accepted
        } else {
            Self::Rejected
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Tokenize(args) => run_tokenize(args),
        Command::Parse(args) => run_parse(args),
        Command::Conditions(args) => run_conditions(args),
        Command::Check(args) => run_check(args),
        Command::Run(args) => run_catalog_command(args),
        Command::Batch(args) => run_batch(args),
        Command::Validate(args) => run_validate(args),
    };

    match result {
        Ok(Verdict::Accepted) => {}
        Ok(Verdict::Rejected) => std::process::exit(2),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run_tokenize(args: SpecArgs) -> Result<Verdict, String> {
    let tokens = tokenize(&args.spec).map_err(|err| err.render(&args.spec))?;
    let out = format_output(&tokens, args.format, || {
        tokens.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    })?;
    print_output(&out);
    Ok(Verdict::Accepted)
}

#[derive(Serialize)]
struct ParseOutput<'a> {
    canonical: String,
    tree: &'a GrammarNode,
}

fn run_parse(args: SpecArgs) -> Result<Verdict, String> {
    let tokens = tokenize(&args.spec).map_err(|err| err.render(&args.spec))?;
    let tree = parse(&tokens).map_err(|err| err.render(&args.spec))?;
    let output = ParseOutput {
        canonical: tree.to_string(),
        tree: &tree,
    };
    let out = format_output(&output, args.format, || {
        format!("{}\n{tree:#?}", output.canonical)
    })?;
    print_output(&out);
    Ok(Verdict::Accepted)
}

fn run_conditions(args: SpecArgs) -> Result<Verdict, String> {
    let compiled = CompiledGrammar::from_spec(&args.spec).map_err(|err| err.render(&args.spec))?;
    let out = format_output(compiled.entries(), args.format, || {
        let mut lines = Vec::new();
        for entry in compiled.entries() {
            if entry.conditions.is_empty() {
                lines.push(format!("{}: (none)", entry.symbol));
                continue;
            }
            lines.push(format!("{}:", entry.symbol));
            lines.extend(entry.conditions.iter().map(|c| format!("  {c}")));
        }
        lines.join("\n")
    })?;
    print_output(&out);
    Ok(Verdict::Accepted)
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    accepted: bool,
    diagnostics: &'a [Diagnostic],
}

fn run_check(args: CheckArgs) -> Result<Verdict, String> {
    let compiled = compile_cached(&args.spec).map_err(|err| err.render(&args.spec))?;
    let spool = ArgsSpool::parse(&args.args);
    let facts = PresenceFacts::from_spool(&spool, &compiled);
    let options = RecognitionOptions {
        reject_unknown_options: !args.allow_unknown,
        reject_surplus_positionals: !args.allow_surplus,
    };
    let diagnostics = recognize_with(&compiled, &facts, &options);

    let output = CheckOutput {
        accepted: diagnostics.is_empty(),
        diagnostics: &diagnostics,
    };
    let out = format_output(&output, args.format, || plain_diagnostics(&diagnostics))?;
    print_output(&out);
    Ok(Verdict::of(&diagnostics))
}

fn run_catalog_command(args: RunArgs) -> Result<Verdict, String> {
    let catalog = load_catalog(&args.catalog)?;
    let recognition = catalog
        .recognize(&args.command, &args.args)
        .map_err(|err| err.to_string())?;

    let out = format_output(&recognition, args.format, || {
        plain_diagnostics(&recognition.diagnostics)
    })?;
    print_output(&out);
    Ok(Verdict::of(&recognition.diagnostics))
}

#[derive(Serialize)]
struct BatchLine {
    line: usize,
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recognition: Option<Recognition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl BatchLine {
    fn accepted(&self) -> bool {
        self.recognition
            .as_ref()
            .is_some_and(Recognition::is_accepted)
    }
}

fn run_batch(args: BatchArgs) -> Result<Verdict, String> {
    use rayon::prelude::*;

    let catalog = load_catalog(&args.catalog)?;
    let raw = fs::read_to_string(&args.input)
        .map_err(|err| format!("Failed to read '{}': {err}", args.input.display()))?;

    let invocations: Vec<(usize, Vec<&str>)> = raw
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| (number, line.split_whitespace().collect()))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0))
        .build()
        .map_err(|e| format!("Failed to create thread pool: {e}"))?;
    debug!(
        invocations = invocations.len(),
        threads = pool.current_num_threads(),
        "Recognizing batch"
    );

    let results: Vec<BatchLine> = pool.install(|| {
        invocations
            .par_iter()
            .map(|(line, words)| {
                let (command, rest) = match words.split_first() {
                    Some((command, rest)) => (*command, rest),
                    None => ("", &[][..]),
                };
                match catalog.recognize(command, rest) {
                    Ok(recognition) => BatchLine {
                        line: *line,
                        command: command.to_string(),
                        recognition: Some(recognition),
                        error: None,
                    },
                    Err(err) => BatchLine {
                        line: *line,
                        command: command.to_string(),
                        recognition: None,
                        error: Some(err.to_string()),
                    },
                }
            })
            .collect()
    });

    let out = format_output(&results, args.format, || {
        let mut lines = Vec::new();
        for result in &results {
            match (&result.recognition, &result.error) {
                (_, Some(err)) => lines.push(format!("{}: error: {err}", result.line)),
                (Some(recognition), None) if recognition.is_accepted() => {
                    lines.push(format!("{}: {}: ok", result.line, result.command));
                }
                (Some(recognition), None) => lines.extend(
                    recognition
                        .diagnostics
                        .iter()
                        .map(|d| format!("{}: {}: {}", result.line, result.command, d.message)),
                ),
                (None, None) => {}
            }
        }
        lines.join("\n")
    })?;
    print_output(&out);

    let rejected = results.iter().filter(|r| !r.accepted()).count();
    if rejected > 0 {
        eprintln!("{rejected} of {} invocation(s) rejected.", results.len());
        return Ok(Verdict::Rejected);
    }
    Ok(Verdict::Accepted)
}

fn run_validate(args: ValidateArgs) -> Result<Verdict, String> {
    let mut commands = 0usize;
    for path in &args.inputs {
        commands += load_catalog(path)?.commands.len();
    }
    println!(
        "Validated {} catalog file(s) for {commands} command(s).",
        args.inputs.len()
    );
    Ok(Verdict::Accepted)
}

fn load_catalog(path: &Path) -> Result<Catalog, String> {
    Catalog::load(path).map_err(|err| format!("Failed to load '{}': {err}", path.display()))
}

fn plain_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_output<T: Serialize + ?Sized>(
    value: &T,
    format: CliOutputFormat,
    plain: impl FnOnce() -> String,
) -> Result<String, String> {
    match format {
        CliOutputFormat::Plain => Ok(plain()),
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|err| format!("Failed to serialize JSON output: {err}")),
        CliOutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|err| format!("Failed to serialize YAML output: {err}")),
    }
}

/// Prints `out` unless it is empty, so accepted plain checks stay silent.
fn print_output(out: &str) {
    let out = out.trim_end();
    if !out.is_empty() {
        println!("{out}");
    }
}
