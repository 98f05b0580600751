// Command-line front end for ipspatch.
//
// Subcommands apply a patch to a copy of a file, list the records of a
// patch, re-encode a patch for round-trip checking, and print build details.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::io::{self as file_io, ApplyFileStats, ApplyOptions};
use crate::ips::{ApplyStats, MAX_LOCATION, MAX_RECORD_LEN, PatchReader, STREAM_CAPACITY};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// IPS patch applier and codec.
#[derive(Parser, Debug)]
#[command(
    name = "ipspatch",
    version,
    about = "IPS patch applier and codec",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Copy SOURCE to OUTPUT and apply PATCH to the copy.
    Apply(ApplyArgs),
    /// Print every record in an IPS file.
    List(ListArgs),
    /// Decode and re-encode an IPS file.
    Recode(RecodeArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// IPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// File to patch (left unmodified).
    #[arg(value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Patched output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Patches the decoder may read ahead of the applier.
    #[arg(long = "read-ahead", value_parser = clap::value_parser!(u32).range(1..), default_value_t = STREAM_CAPACITY as u32)]
    read_ahead: u32,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// IPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct RecodeArgs {
    /// Input IPS file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output IPS file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Fail if the re-encoded file differs from the input.
    #[arg(long)]
    check: bool,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Apply,
    List,
    Recode,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    check: bool,
    read_ahead: usize,
    patch_file: Option<PathBuf>,
    source_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        check: false,
        read_ahead: STREAM_CAPACITY,
        patch_file: None,
        source_file: None,
        input_file: None,
        output_file: None,
    };

    match cli.command {
        Cmd::Apply(args) => {
            opts.command = Command::Apply;
            opts.patch_file = Some(args.patch);
            opts.source_file = Some(args.source);
            opts.output_file = Some(args.output);
            opts.read_ahead = args.read_ahead as usize;
        }
        Cmd::List(args) => {
            opts.command = Command::List;
            opts.input_file = Some(args.input);
        }
        Cmd::Recode(args) => {
            opts.command = Command::Recode;
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
            opts.check = args.check;
        }
        Cmd::Config => {}
    }

    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("ipspatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn print_json(value: serde_json::Value) {
    match serde_json::to_string_pretty(&value) {
        Ok(text) => eprintln!("{text}"),
        Err(e) => eprintln!("ipspatch: json error: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("ipspatch version {version}");

    let file_io = cfg!(feature = "file-io") as u8;
    eprintln!("FILE_IO={file_io}");
    eprintln!("STREAM_CAPACITY={STREAM_CAPACITY}");
    eprintln!("MAX_LOCATION={MAX_LOCATION:#08X}");
    eprintln!("MAX_RECORD_LEN={MAX_RECORD_LEN}");

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> i32 {
    let (Some(patch), Some(source), Some(output)) =
        (&opts.patch_file, &opts.source_file, &opts.output_file)
    else {
        eprintln!("ipspatch: apply requires a patch, source and output file");
        return 1;
    };

    let apply_opts = ApplyOptions {
        force: opts.force,
        stream_capacity: opts.read_ahead,
    };
    let quiet = opts.quiet;

    let stats = match file_io::apply_file(patch, source, output, &apply_opts, |index, p| {
        if !quiet {
            println!("{index}: {p}");
        }
    }) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("ipspatch: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        let ApplyFileStats {
            source_size,
            output_size,
            applied,
            ..
        } = &stats;
        eprintln!(
            "ipspatch: source size: {source_size}, output size: {output_size}, patches: {}",
            applied.patches
        );
    }

    if opts.json_output {
        print_json(serde_json::json!({
            "command": "apply",
            "source_size": stats.source_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "patches": stats.applied.patches,
            "literal_patches": stats.applied.literal_patches,
            "rle_patches": stats.applied.rle_patches,
            "bytes_written": stats.applied.bytes_written,
            "output_sha256": stats.output_sha256.map(|d| hex(&d)),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// List command
// ---------------------------------------------------------------------------

fn cmd_list(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("ipspatch: list requires an input file");
        return 1;
    };

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("ipspatch: input file: {}: {e}", path.display());
            return 1;
        }
    };

    let mut stats = ApplyStats::default();
    for item in PatchReader::new(BufReader::new(file)) {
        match item {
            Ok(patch) => {
                stats.record(&patch);
                if !opts.quiet {
                    println!("{}: {patch}", stats.patches);
                }
            }
            Err(e) => {
                eprintln!("ipspatch: decode error: {e}");
                return 1;
            }
        }
    }

    if !opts.quiet {
        println!(
            "{} patches ({} literal, {} RLE), {} bytes, minimum target size {}",
            stats.patches,
            stats.literal_patches,
            stats.rle_patches,
            stats.bytes_written,
            stats.max_end
        );
    }

    if opts.json_output {
        print_json(serde_json::json!({
            "command": "list",
            "patches": stats.patches,
            "literal_patches": stats.literal_patches,
            "rle_patches": stats.rle_patches,
            "bytes_written": stats.bytes_written,
            "min_target_size": stats.max_end,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Recode command
// ---------------------------------------------------------------------------

fn cmd_recode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        eprintln!("ipspatch: recode requires an input and output file");
        return 1;
    };

    let stats = match file_io::recode_file(input, output, opts.force) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("ipspatch: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "ipspatch: recode: input size: {}, output size: {}, patches: {}",
            stats.input_size, stats.output_size, stats.patches
        );
    }

    if opts.json_output {
        print_json(serde_json::json!({
            "command": "recode",
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "patches": stats.patches,
            "identical": stats.identical,
        }));
    }

    if opts.check && !stats.identical {
        eprintln!(
            "ipspatch: re-encoded output differs from input: {}",
            input.display()
        );
        return 1;
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_level = match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Apply => cmd_apply(&opts),
        Command::List => cmd_list(&opts),
        Command::Recode => cmd_recode(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
