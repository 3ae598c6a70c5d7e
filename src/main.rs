//! A utility for running tournaments between game engines.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
#![warn(missing_docs, missing_debug_implementations, unused_extern_crates)]
#![warn(clippy::unimplemented, clippy::todo)]

use std::fs::File;
use clap::{App, Arg, crate_version};
use simplelog::{Config, LevelFilter, WriteLogger};
use matchman::run;
use matchman::settings::MatchSettings;

fn main() -> Result<(), Error> {
    let matches =
        App::new("Matchman")
            .version(crate_version!())
            .author("Mike Leany")
            .about("Plays tournaments between engines which speak UGI, UAI or UCI.")
            .arg(Arg::with_name("settings")
                .long("settings")
                .value_name("FILE")
                .takes_value(true)
                .required(true)
                .help("The match settings document"))
            .arg(Arg::with_name("threads")
                .long("threads")
                .value_name("N")
                .takes_value(true)
                .help("Overrides the number of games played in parallel"))
            .arg(Arg::with_name("games")
                .long("games")
                .value_name("N")
                .takes_value(true)
                .help("Overrides the number of games per matchup"))
            .arg(Arg::with_name("store")
                .long("store")
                .value_name("N")
                .takes_value(true)
                .help("Overrides the size of the engine store"))
            .arg(Arg::with_name("debug")
                .long("debug")
                .help("Echoes all engine communication"))
            .arg(Arg::with_name("verbose")
                .long("verbose")
                .help("Reports every game as it finishes"))
            .arg(Arg::with_name("log")
                .long("log")
                .short("l")
                .help("Turns on logging"))
            .arg(Arg::with_name("log-file")
                .long("log-file")
                .value_name("LOG_FILE")
                .takes_value(true)
                .default_value("matchman.log")
                .help("Sets the log file if logging is turned on"))
            .arg(Arg::with_name("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .takes_value(true)
                .default_value("info")
                .help("Sets the log level if logging is turned on"))
            .get_matches();

    if matches.is_present("log") {
        let log_file = matches.value_of("log-file").expect("INFALLIBLE");
        let log_level = match matches.value_of("log-level") {
            Some("off") => LevelFilter::Off,
            Some("error") => LevelFilter::Error,
            Some("warn") => LevelFilter::Warn,
            Some("info") => LevelFilter::Info,
            Some("debug") => LevelFilter::Debug,
            Some("trace") => LevelFilter::Trace,
            Some(level) => return Err(Error(format!("{}: invalid log level", level))),
            None => unreachable!(),
        };
        let _ = WriteLogger::init(
            log_level,
            Config::default(),
            File::create(log_file).map_err(|err| {
                Error(format!("{}: {}", log_file, err))
            })?);
    }

    println!("Matchman v{}", crate_version!());
    println!();

    let mut settings = MatchSettings::load(matches.value_of("settings").expect("INFALLIBLE"))?;

    if let Some(threads) = matches.value_of("threads") {
        settings.num_threads = parse_count("threads", threads)?;
    }
    if let Some(games) = matches.value_of("games") {
        settings.num_games = parse_count("games", games)?;
    }
    if let Some(store) = matches.value_of("store") {
        settings.store_size = store.parse()
            .map_err(|_| Error(format!("{}: invalid store size", store)))?;
    }
    if matches.is_present("debug") {
        settings.debug = true;
    }
    if matches.is_present("verbose") {
        settings.verbose = true;
    }

    run::run_match(settings)?;
    Ok(())
}

fn parse_count(what: &str, value: &str) -> Result<usize, Error> {
    match value.parse() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error(format!("{}: {} must be a positive number", value, what))),
    }
}

#[derive(Debug)]
struct Error(String);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.0.fmt(f)
    }
}

impl std::error::Error for Error { }

impl From<matchman::settings::Error> for Error {
    fn from(err: matchman::settings::Error) -> Self {
        Error(err.to_string())
    }
}

impl From<run::Error> for Error {
    fn from(err: run::Error) -> Self {
        Error(err.to_string())
    }
}
