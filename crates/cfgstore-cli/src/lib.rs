//! Configuration Store CLI
//!
//! `cfgstore` inspects, converts, compares and searches configuration files,
//! and sets the configuration password.
//!
//! Every subcommand needs the setting catalog (`--catalog <json>`). Output
//! options come from `--options <toml>`, overridden per command.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;

use anyhow::Context;
use cfgstore_codec::ConfigFormat;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::Session;
use std::io::Write;
use std::path::PathBuf;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const ENCODING_MODES: [&str; 3] = ["encoded", "stripped", "plain"];

fn file_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

/// Command-line definition
#[must_use]
pub fn command() -> Command {
    Command::new("cfgstore")
        .version(VERSION)
        .about("Inspect and convert configuration store files")
        .subcommand_required(true)
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Setting catalog (JSON)"),
        )
        .arg(
            Arg::new("options")
                .long("options")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Store options (TOML)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Write logs as JSON lines"),
        )
        .subcommand(
            Command::new("inspect")
                .about("List every stored record; confidential values are masked")
                .arg(file_arg("file", "Configuration file")),
        )
        .subcommand(
            Command::new("convert")
                .about("Rewrite a configuration file in another format")
                .arg(file_arg("input", "Source file"))
                .arg(file_arg("output", "Destination file"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(value_parser!(ConfigFormat))
                        .help("Output format: xml, zip-json or zip-xml"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_parser(ENCODING_MODES)
                        .help("Confidential value handling"),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("List keys whose values differ between two files")
                .arg(file_arg("before", "Earlier file"))
                .arg(file_arg("after", "Later file")),
        )
        .subcommand(
            Command::new("search")
                .about("Free-text search over settings")
                .arg(file_arg("file", "Configuration file"))
                .arg(
                    Arg::new("query")
                        .required(true)
                        .num_args(1..)
                        .help("Search terms; every term must match"),
                )
                .arg(Arg::new("domain").long("domain").help("Restrict to one domain")),
        )
        .subcommand(
            Command::new("set-password")
                .about("Set the configuration password")
                .arg(file_arg("file", "Configuration file"))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("New password; read from stdin when omitted"),
                ),
        )
}

/// Install the global tracing subscriber
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Logs go to stderr so
/// command output stays clean.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn path<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing <{name}>"))
}

/// Run a parsed command line, writing command output to `out`
///
/// # Errors
/// Returns error if the catalog or options cannot be loaded, or the
/// subcommand fails
pub fn run(matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    let catalog = matches
        .get_one::<PathBuf>("catalog")
        .context("--catalog <json> is required")?;
    let session = Session::open(catalog, matches.get_one::<PathBuf>("options").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("inspect", args)) => session.inspect(path(args, "file")?, out),
        Some(("convert", args)) => {
            let format = args.get_one::<ConfigFormat>("format").copied();
            let mode = args
                .get_one::<String>("mode")
                .map(String::as_str)
                .map(commands::parse_mode)
                .transpose()?;
            session.convert(path(args, "input")?, path(args, "output")?, format, mode, out)
        }
        Some(("diff", args)) => session.diff(path(args, "before")?, path(args, "after")?, out),
        Some(("search", args)) => {
            let query: Vec<&str> = args
                .get_many::<String>("query")
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect();
            let domain = args.get_one::<String>("domain").map(String::as_str);
            session.search(path(args, "file")?, &query.join(" "), domain, out)
        }
        Some(("set-password", args)) => {
            let password = match args.get_one::<String>("password") {
                Some(password) => password.clone(),
                None => commands::read_password_line()?,
            };
            session.set_password(path(args, "file")?, &password, out)
        }
        Some((other, _)) => anyhow::bail!("unknown command '{other}'"),
        None => anyhow::bail!("no command given"),
    }
}
