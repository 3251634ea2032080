use clap::Parser;
use std::process;
use wsn_preprocess::cli::{self, Args};

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help
    if args.command.is_none() {
        cli::print_help();
        process::exit(0);
    }

    if let Err(error) = cli::run(args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
