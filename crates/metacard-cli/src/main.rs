use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use metacard_cli::commands::{
    build_engine, check, load_config, load_vocabulary, render_load_report, render_replay, replay,
};
use metacard_cli::{logging, ReplayScript};
use std::path::PathBuf;

fn vocabulary_arg() -> Arg {
    Arg::new("vocabulary")
        .long("vocabulary")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Vocabulary document (YAML or JSON)")
}

fn rules_arg() -> Arg {
    Arg::new("rules")
        .long("rules")
        .short('r')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Rule document (YAML or JSON)")
}

fn cli() -> Command {
    Command::new("metacard")
        .version(metacard_cli::VERSION)
        .about("Metadata card property derivation rules")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging for the engine (RUST_LOG takes precedence)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("check")
                .about("Compile a rule document and print load diagnostics")
                .arg(vocabulary_arg())
                .arg(rules_arg())
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail on any invalid rule instead of skipping it"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Open a card, replay an edit script and print the settled card")
                .arg(vocabulary_arg())
                .arg(rules_arg())
                .arg(
                    Arg::new("script")
                        .long("script")
                        .short('s')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Replay script (YAML)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("Engine configuration (TOML)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn path<'a>(args: &'a ArgMatches, id: &str) -> Option<&'a PathBuf> {
    args.get_one::<PathBuf>(id)
}

fn required<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a PathBuf> {
    path(args, id).with_context(|| format!("missing --{id}"))
}

/// Returns false when the command ran but found problems
fn run(matches: &ArgMatches) -> Result<bool> {
    match matches.subcommand() {
        Some(("check", args)) => {
            let vocabulary = load_vocabulary(required(args, "vocabulary")?)?;
            let report = check(&vocabulary, required(args, "rules")?, args.get_flag("strict"))?;
            print!("{}", render_load_report(&report));
            Ok(report.skipped == 0)
        }
        Some(("replay", args)) => {
            let vocabulary = load_vocabulary(required(args, "vocabulary")?)?;
            let config = load_config(path(args, "config").map(PathBuf::as_path))?;
            let script = ReplayScript::load(required(args, "script")?)?;

            let (engine, report) = build_engine(vocabulary, required(args, "rules")?, config)?;
            if !report.is_clean() {
                eprint!("{}", render_load_report(&report));
            }
            let outcome = replay(&engine, &script)?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", render_replay(&outcome, engine.vocabulary()));
            }
            Ok(true)
        }
        _ => Ok(true),
    }
}

fn main() {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("verbose"), matches.get_flag("log-json"));

    match run(&matches) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    }
}
