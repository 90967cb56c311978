use clap::{Arg, ArgAction, Command, value_parser};

pub(super) const ARG_WORKERS: &str = "workers";
pub(super) const ARG_COUNT: &str = "count";
pub(super) const ARG_FILES: &str = "files";

pub(super) const CMD_SQUARES: &str = "squares";
pub(super) const CMD_WORD_COUNT: &str = "word-count";

pub(super) fn root_cli() -> Command {
    Command::new("mapreduce")
        .about("Runs map-reduce jobs on a bounded pool of concurrent mappers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_WORKERS)
                .long("workers")
                .short('w')
                .global(true)
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i64))
                .help("Maximum concurrent mapper invocations, overrides MAPREDUCE_WORKERS"),
        )
        .subcommand(add_squares_subcommand())
        .subcommand(add_word_count_subcommand())
}

fn add_squares_subcommand() -> Command {
    Command::new(CMD_SQUARES)
        .about("Sums the squares of 1..=COUNT")
        .arg(
            Arg::new(ARG_COUNT)
                .long("count")
                .short('n')
                .default_value("4")
                .value_parser(value_parser!(u64)),
        )
}

fn add_word_count_subcommand() -> Command {
    Command::new(CMD_WORD_COUNT)
        .about("Counts the whitespace separated words of all the given files")
        .arg(
            Arg::new(ARG_FILES)
                .required(true)
                .action(ArgAction::Append)
                .value_parser(value_parser!(std::path::PathBuf)),
        )
}
