//! Command line tool to inspect GMV files
//!
//! Reads a GMV file of any encoding and prints a summary of what it
//! contains: the encoding, the number of records per keyword, the named
//! fields, and the assembled mesh.
//!
//! # Usage
//!
//! ```text
//! Usage: gmvinfo <file> [options]
//! ```
//!
//! Help is printed with the `-h` flag, and `--help` will show examples, default
//! values, and any important behaviour.
//!
//! ## Options
//!
//! ### > How to list every record
//!
//! Use `--records` to print one line per record in file order.
//!
//! ```bash
//! gmvinfo /path/to/file.gmv --records
//! ```
//!
//! ### > How to dump everything to JSON
//!
//! The `--json` flag writes every record and the assembled mesh to a JSON
//! file, `gmv.json` unless changed with `--output`.
//!
//! ```bash
//! gmvinfo /path/to/file.gmv --json --output myfile
//! ```
//!
//! ### > How to read damaged files
//!
//! Files without `endgmv` at the end are rejected by default. Use
//! `--allow-missing-endgmv` to read them anyway.
//!
//! ```bash
//! gmvinfo /path/to/truncated.gmv --allow-missing-endgmv
//! ```

// standard libraries
use std::fs::File;
use std::io::BufWriter;

// crate modules
use gmvread::readers::Keyword;
use gmvread::utils::f;
use gmvread::{Gmv, GmvReader, ReaderOptions, Record};

// external crates
use anyhow::{Context, Result};
use clap::{arg, Parser};
use itertools::Itertools;
use log::*;

#[doc(hidden)]
fn main() -> Result<()> {
    // set up the command line interface and match arguments
    let cli: Cli = Cli::parse();

    // set up logging (+2 to make 'Info' the default)
    let verbosity = cli.verbose as usize + 2;
    logging_init(verbosity, cli.quiet);

    info!("Reading \"{}\"", cli.file);
    let options = ReaderOptions::new()
        .require_endgmv(!cli.allow_missing_endgmv)
        .swap_probe_threshold(cli.swap_threshold)
        .show_progress(cli.progress);

    let mut reader = GmvReader::with_options(options);
    reader
        .open(&cli.file)
        .with_context(|| f!("Could not open {}", cli.file))?;
    let gmv = reader
        .read_all()
        .with_context(|| f!("Failed to read {}", cli.file))?;

    if cli.records {
        print_records(&gmv);
    }
    print_summary(&gmv);

    if cli.json {
        write_json(&gmv, &cli)?;
    }
    Ok(())
}

/// Summarise the contents of a GMV file
///
/// Every record of the file is read, the topology is assembled where
/// possible, and a short summary is printed.
///
/// Supports ASCII and all IEEE binary variants, including files written on
/// a machine of the opposite endianness.
///
/// Examples
/// --------
///
///  Typical use
///     $ gmvinfo run0.gmv
///
///  Print every record in file order
///     $ gmvinfo run0.gmv --records
///
///  Dump everything to "run0.json"
///     $ gmvinfo run0.gmv --json --output run0
///
///  Read a file with a missing trailer
///     $ gmvinfo run0.gmv --allow-missing-endgmv
///
#[doc(hidden)]
#[derive(Parser)]
#[command(
    verbatim_doc_comment,
    arg_required_else_help(true),
    before_help(banner()),
    after_help("Typical use: gmvinfo run0.gmv\n\nNOTE: --help shows more detail and examples"),
    term_width(70),
    hide_possible_values(true),
    override_usage("gmvinfo <file> [options]")
)]
struct Cli {
    // * Positional
    /// Path to input GMV file
    #[arg(name = "file")]
    file: String,

    // * Optional
    /// List every record in file order
    #[arg(help_heading("Output options"))]
    #[arg(short, long)]
    records: bool,

    /// Write all records and the mesh to JSON
    #[arg(help_heading("Output options"))]
    #[arg(short, long)]
    json: bool,

    /// Name of the JSON file ('gmv' default)
    ///
    /// The `.json` extension is added automatically.
    #[arg(help_heading("Output options"))]
    #[arg(short, long)]
    #[arg(value_name = "path")]
    #[arg(default_value = "gmv")]
    output: String,

    /// Read files without a trailing 'endgmv'
    ///
    /// By default a file must end with 'endgmv' to be opened at all. With
    /// this flag the missing trailer is only logged as a warning.
    #[arg(help_heading("Reader options"))]
    #[arg(long)]
    allow_missing_endgmv: bool,

    /// Node count above which byte order is checked
    ///
    /// Binary files have no byte-order mark. Any node count at or above this
    /// value is checked against the position of the following keyword, and
    /// the file is byte swapped if that check fails.
    #[arg(help_heading("Reader options"))]
    #[arg(long)]
    #[arg(value_name = "count")]
    #[arg(default_value = "16777216")]
    swap_threshold: i64,

    /// Show a progress bar
    #[arg(help_heading("Reader options"))]
    #[arg(short, long)]
    progress: bool,

    // * Flags
    /// Verbose logging (-v, -vv)
    ///
    /// If specified, the default log level of INFO is increased to DEBUG (-v)
    /// or TRACE (-vv). Errors and Warnings are always logged unless in quiet
    /// (-q) mode.
    #[arg(short, long)]
    #[arg(action = clap::ArgAction::Count)]
    verbose: u8,

    /// Supress all log output (overrules --verbose)
    #[arg(short, long)]
    quiet: bool,
}

/// Sets up logging at runtime to allow for multiple verbosity levels
#[doc(hidden)]
fn logging_init(verbosity: usize, quiet: bool) {
    stderrlog::new()
        .modules(vec![module_path!(), "gmvread"])
        .quiet(quiet)
        .verbosity(verbosity)
        .show_level(false)
        .color(stderrlog::ColorChoice::Never)
        .timestamp(stderrlog::Timestamp::Off)
        .init()
        .unwrap();
}

/// Creates a banner for the command line
#[doc(hidden)]
fn banner() -> String {
    let mut s = f!("{:-<1$}\n", "", 70);
    s += &f!("{:^70}\n", "GMV :: Info");
    s += &f!("{:-<1$}", "", 70);
    s
}

#[doc(hidden)]
/// One line per record, skipping the end-of-block markers
fn print_records(gmv: &Gmv) {
    for (i, record) in gmv.records.iter().enumerate() {
        if let Record::EndOfBlock(_) = record {
            continue;
        }
        match record.name() {
            Some(name) => println!("{i:>8}  {:<10} {name}", record.keyword().as_str()),
            None => println!("{i:>8}  {}", record.keyword().as_str()),
        }
    }
}

#[doc(hidden)]
/// Write summary to the terminal
fn print_summary(gmv: &Gmv) {
    let mut s = "Summary of GMV file\n".to_string();
    s += &f!(
        "encoding : {}{}\n",
        gmv.encoding.type_name(),
        if gmv.swapped { " (byte swapped)" } else { "" }
    );
    s += &f!("records  : {}\n", gmv.records.len());

    // records per keyword, in keyword order
    let histogram = gmv
        .records
        .iter()
        .filter(|r| !matches!(r, Record::EndOfBlock(_) | Record::End))
        .map(Record::keyword)
        .counts();
    for (keyword, n) in histogram.into_iter().sorted() {
        s += &f!("  {:<10} {n}\n", keyword.as_str());
    }

    let names = named_fields(gmv);
    if !names.is_empty() {
        s += "fields   :\n";
        s += &textwrap::indent(&textwrap::fill(&names.join(" "), 66), "    ");
        s += "\n";
    }

    match &gmv.mesh {
        Some(mesh) => s += &f!("{mesh}"),
        None => s += "No mesh could be assembled",
    }
    println!("{s}")
}

#[doc(hidden)]
/// Names of every variable, flag, vector and subset variable, in file order
fn named_fields(gmv: &Gmv) -> Vec<&str> {
    gmv.records
        .iter()
        .filter(|r| {
            matches!(
                r.keyword(),
                Keyword::Variable | Keyword::Flags | Keyword::Vectors | Keyword::SubVars
            )
        })
        .filter_map(Record::name)
        .unique()
        .collect()
}

#[doc(hidden)]
/// Helper function for cleaning up file IO boilerplate
fn get_writer(path: &str) -> Result<BufWriter<File>> {
    let file: File = File::create(path).with_context(|| f!("Could not create {path}"))?;
    debug!("New bufwriter for {path}");
    Ok(BufWriter::new(file))
}

#[doc(hidden)]
/// Write all records and the mesh to json
fn write_json(gmv: &Gmv, cli: &Cli) -> Result<()> {
    let output = f!("{}.json", cli.output);
    info!("Writing JSON to {output}");
    let writer = get_writer(&output)?;
    Ok(serde_json::to_writer_pretty(writer, gmv)?)
}
