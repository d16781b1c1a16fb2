use crate::actions::Phase;
use crate::editor::{EditorRegistry, EditorTarget, DEFAULT_EDITOR};
use crate::errors::Error;
use crate::settings::Settings;
use clap::{arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use ustr::Ustr;

pub enum Action {
    Expand {
        setup: PathBuf,
        output: Option<PathBuf>,
    },
    List {
        setup: PathBuf,
    },
    Run {
        setup: PathBuf,
        target: EditorTarget,
        phases: Vec<Phase>,
    },
}

fn to_abs(relpath: &PathBuf) -> Result<PathBuf, Error> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    let path = cwd.join(relpath);
    path.canonicalize().map_err(|e| Error::IoWithPath(e, path))
}

fn get_path(matches: &ArgMatches, id: &'static str) -> Result<PathBuf, Error> {
    to_abs(
        matches
            .get_one::<PathBuf>(id)
            .ok_or(Error::MissingArgument(id))?,
    )
}

fn get_ustr(matches: &ArgMatches, id: &str) -> Option<Ustr> {
    matches
        .get_one::<String>(id)
        .map(|s| Ustr::from(s.as_str()))
}

pub fn parse_cli() -> Result<(Settings, Action), Error> {
    let setup_arg = || {
        arg!(<SETUP> "The scenario setup document")
            .value_parser(clap::value_parser!(PathBuf))
    };
    let matches = Command::new("scenset")
        .version("0.1")
        .about("Expanding and running scenario setups")
        .subcommand_required(true)
        .subcommand_precedence_over_arg(true)
        .flatten_help(true)
        .arg_required_else_help(true)
        .args([
            arg!(--"output-root" <DIR> "Directory for the scenario directories")
                .global(true)
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf)),
            arg!(--editor <KEY>)
                .help(format!(
                    "The configuration editor to use ({})",
                    EditorRegistry::default().keys().join(", ")
                ))
                .global(true)
                .default_value(DEFAULT_EDITOR),
            arg!(--mcs "Prepare scenarios for a Monte-Carlo simulation")
                .global(true)
                .action(ArgAction::SetTrue),
            arg!(--"setup-output" <FILE> "Save the expanded setup when running")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
            arg!(-v --verbose "Show debug traces")
                .global(true)
                .action(ArgAction::SetTrue),
        ])
        .subcommand(
            Command::new("expand")
                .about("Show the setup after expansion of all iterators")
                .args([
                    setup_arg(),
                    arg!(-o --output <FILE> "Write to a file instead")
                        .value_parser(clap::value_parser!(PathBuf)),
                ]),
        )
        .subcommand(
            Command::new("list")
                .about("List the groups and scenarios of a setup")
                .arg(setup_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Configure one scenario, and show the result")
                .args([
                    setup_arg(),
                    arg!(-b --baseline <NAME> "The baseline scenario")
                        .required(true),
                    arg!(-s --scenario <NAME> "The scenario, if not a baseline"),
                    arg!(-g --group <NAME> "The group, instead of the default one"),
                    arg!(--phase <PHASE> "Which pass to run")
                        .value_parser(["static", "dynamic", "both"])
                        .default_value("both"),
                ]),
        )
        .get_matches();

    let settings = Settings {
        output_root: matches
            .get_one::<PathBuf>("output-root")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
        editor: matches
            .get_one::<String>("editor")
            .cloned()
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
        mcs_mode: matches.get_flag("mcs"),
        setup_output: matches.get_one::<PathBuf>("setup-output").cloned(),
        verbose: matches.get_flag("verbose"),
    };

    match matches.subcommand() {
        Some(("expand", sub)) => Ok((
            settings,
            Action::Expand {
                setup: get_path(sub, "SETUP")?,
                output: sub.get_one::<PathBuf>("output").cloned(),
            },
        )),
        Some(("list", sub)) => Ok((
            settings,
            Action::List {
                setup: get_path(sub, "SETUP")?,
            },
        )),
        Some(("run", sub)) => {
            let phases = match sub.get_one::<String>("phase").map(String::as_str) {
                Some("static") => vec![Phase::Static],
                Some("dynamic") => vec![Phase::Dynamic],
                _ => vec![Phase::Static, Phase::Dynamic],
            };
            Ok((
                settings,
                Action::Run {
                    setup: get_path(sub, "SETUP")?,
                    target: EditorTarget {
                        baseline: get_ustr(sub, "baseline")
                            .ok_or(Error::MissingArgument("baseline"))?,
                        scenario: get_ustr(sub, "scenario"),
                        group: get_ustr(sub, "group"),
                    },
                    phases,
                },
            ))
        }
        _ => unreachable!(),
    }
}
