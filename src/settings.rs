//! Reads and validates the match settings document.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::collections::HashMap;
use std::fmt;
use std::fs::read_to_string;
use std::io;
use std::path::Path;
use serde::Deserialize;
use crate::engine::{Dialect, EngineSpec, SearchSettings};
use crate::games::GameKind;
use crate::play::{AdjudicationSettings, ProtocolSettings, QueryGameover};
use crate::tournament::TournamentKind;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Where the opening book lives and how it is used.
#[derive(Debug, Clone)]
pub struct OpeningsSettings {
    /// Path to the opening file, one position per line.
    pub path: String,
    /// Play each opening twice with colours reversed.
    pub repeat: bool,
    /// Shuffle the book before the match.
    pub shuffle: bool,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The sequential probability ratio test, if any.
#[derive(Debug, Clone, Copy)]
pub struct SprtSettings {
    /// Whether the test runs at all.
    pub enabled: bool,
    /// Type I error rate.
    pub alpha: f64,
    /// Type II error rate.
    pub beta: f64,
    /// The null hypothesis Elo difference.
    pub elo0: f64,
    /// The alternative hypothesis Elo difference.
    pub elo1: f64,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Record-file output.
#[derive(Debug, Clone)]
pub struct PgnSettings {
    /// Whether games are written at all.
    pub enabled: bool,
    /// The record file path.
    pub path: String,
    /// The `Event` tag.
    pub event: String,
    /// The tag name for player 1 (`White` in chess).
    pub colour1: String,
    /// The tag name for player 2.
    pub colour2: String,
    /// Truncate the record file at match start instead of appending.
    pub overwrite: bool,
    /// Write per-move thinking times as comments.
    pub verbose: bool,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Everything the match needs to know, loaded from the settings document and possibly
/// overridden from the command line.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Which game is being played.
    pub game: GameKind,
    /// Games per matchup.
    pub num_games: usize,
    /// Worker thread count.
    pub num_threads: usize,
    /// Engine store capacity.
    pub store_size: usize,
    /// How often the score report is printed, in finished games.
    pub update_frequency: u64,
    /// Echo all engine traffic.
    pub debug: bool,
    /// Chatty progress output.
    pub verbose: bool,
    /// Keep playing after an engine crash.
    pub recover: bool,
    /// The tournament shape.
    pub tournament: TournamentKind,
    /// Protocol workarounds.
    pub protocol: ProtocolSettings,
    /// Runner-imposed limits.
    pub adjudication: AdjudicationSettings,
    /// The per-game search budget.
    pub timecontrol: SearchSettings,
    /// The opening book.
    pub openings: OpeningsSettings,
    /// Early stopping.
    pub sprt: SprtSettings,
    /// Record-file output.
    pub pgn: PgnSettings,
    /// The engine roster, in configuration order.
    pub engines: Vec<EngineSpec>,
}

impl MatchSettings {
    /// Loads and validates a settings document.
    pub fn load(path: &str) -> Result<MatchSettings, Error> {
        MatchSettings::parse(&read_to_string(path)?)
    }

    /// Parses and validates a settings document from a string.
    pub fn parse(text: &str) -> Result<MatchSettings, Error> {
        let raw: RawSettings = serde_json::from_str(text)?;
        raw.build()
    }

    /// Echoes the loaded settings, the way the match will use them.
    pub fn print(&self) {
        println!("Match settings loaded:");
        println!("- threads {}", self.num_threads);
        println!("- games {}", self.num_games);
        println!("- store size {}", self.store_size);
        match self.timecontrol {
            SearchSettings::Time { p1time, p1inc, .. } => {
                println!("- tc {}+{}ms", p1time, p1inc);
            },
            SearchSettings::MoveTime(ms) => println!("- tc {}ms", ms),
            SearchSettings::Depth(plies) => println!("- tc {}ply", plies),
            SearchSettings::Nodes(nodes) => println!("- tc {}nodes", nodes),
        }
        println!("- openings_path {}", self.openings.path);
        println!("- timeoutbuffer {}ms", self.adjudication.timeout_buffer_ms);
        println!("- maxfullmoves {}", self.adjudication.max_full_moves);
        println!("- update_frequency {}", self.update_frequency);
        println!("- debug {}", self.debug);
        println!("- repeat {}", self.openings.repeat);
        println!("- recover {}", self.recover);
        println!("- verbose {}", self.verbose);
        println!();
        match self.game {
            GameKind::Generic => println!("Using the generic UGI protocol"),
            GameKind::Ataxx => println!("Using first class support for Ataxx"),
            GameKind::Chess => println!("Using first class support for Chess"),
        }
    }

    /// Echoes the engine roster.
    pub fn print_engines(&self) {
        println!("Engine Data:");
        for spec in &self.engines {
            print!("- {} {} {}", spec.id, spec.name, spec.path);
            for arg in &spec.args {
                print!(" {}", arg);
            }
            let mut options: Vec<_> = spec.options.iter().collect();
            options.sort();
            for (key, value) in options {
                print!(" {{{}:{}}}", key, value);
            }
            println!();
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// The raw document, before validation.

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawSettings {
    games: usize,
    game: String,
    concurrency: usize,
    ratinginterval: u64,
    debug: bool,
    verbose: bool,
    recover: bool,
    tournament: String,
    protocol: RawProtocol,
    adjudication: RawAdjudication,
    timecontrol: RawTimeControl,
    openings: RawOpenings,
    sprt: RawSprt,
    pgn: RawPgn,
    options: HashMap<String, String>,
    engines: Vec<RawEngine>,
}

impl Default for RawSettings {
    fn default() -> RawSettings {
        RawSettings {
            games: 1,
            game: "generic".to_owned(),
            concurrency: 1,
            ratinginterval: 10,
            debug: false,
            verbose: false,
            recover: true,
            tournament: "roundrobin".to_owned(),
            protocol: RawProtocol::default(),
            adjudication: RawAdjudication::default(),
            timecontrol: RawTimeControl::default(),
            openings: RawOpenings::default(),
            sprt: RawSprt::default(),
            pgn: RawPgn::default(),
            options: HashMap::new(),
            engines: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawProtocol {
    askturn: bool,
    gameover: String,
}

impl Default for RawProtocol {
    fn default() -> RawProtocol {
        RawProtocol { askturn: false, gameover: "tomove".to_owned() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawAdjudication {
    timeoutbuffer: i64,
    maxfullmoves: usize,
}

impl Default for RawAdjudication {
    fn default() -> RawAdjudication {
        RawAdjudication { timeoutbuffer: 10, maxfullmoves: 0 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawTimeControl {
    #[serde(rename = "type")]
    kind: String,
    time: i64,
    #[serde(alias = "inc")]
    increment: i64,
    nodes: u64,
    ply: u32,
}

impl Default for RawTimeControl {
    fn default() -> RawTimeControl {
        RawTimeControl {
            kind: "depth".to_owned(),
            time: 0,
            increment: 0,
            nodes: 0,
            ply: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawOpenings {
    path: String,
    repeat: bool,
    shuffle: bool,
}

impl Default for RawOpenings {
    fn default() -> RawOpenings {
        RawOpenings { path: String::new(), repeat: true, shuffle: false }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSprt {
    enabled: bool,
    confidence: Option<f64>,
    alpha: Option<f64>,
    beta: Option<f64>,
    elo0: Option<f64>,
    elo1: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPgn {
    enabled: bool,
    path: String,
    event: String,
    colour1: String,
    colour2: String,
    #[serde(rename = "override")]
    overwrite: bool,
    verbose: bool,
}

impl Default for RawPgn {
    fn default() -> RawPgn {
        RawPgn {
            enabled: true,
            path: "games.pgn".to_owned(),
            event: "*".to_owned(),
            colour1: "white".to_owned(),
            colour2: "black".to_owned(),
            overwrite: false,
            verbose: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEngine {
    name: String,
    path: String,
    protocol: String,
    parameters: String,
    options: HashMap<String, String>,
}

impl RawSettings {
    fn build(self) -> Result<MatchSettings, Error> {
        let game = match self.game.as_str() {
            "generic" => GameKind::Generic,
            "ataxx" => GameKind::Ataxx,
            "chess" => GameKind::Chess,
            other => return Err(Error::Invalid(format!("unrecognised game type '{}'", other))),
        };

        let tournament = match self.tournament.as_str() {
            "roundrobin" => TournamentKind::RoundRobin,
            "gauntlet" => TournamentKind::Gauntlet,
            other => {
                return Err(Error::Invalid(format!("unrecognised tournament type '{}'", other)))
            },
        };

        let gameover = match self.protocol.gameover.as_str() {
            "tomove" => QueryGameover::ToMove,
            "both" => QueryGameover::Both,
            other => {
                return Err(Error::Invalid(format!("unrecognised gameover query '{}'", other)))
            },
        };

        let timecontrol = match self.timecontrol.kind.as_str() {
            "clock" => SearchSettings::Time {
                p1time: self.timecontrol.time,
                p2time: self.timecontrol.time,
                p1inc: self.timecontrol.increment,
                p2inc: self.timecontrol.increment,
            },
            "movetime" => SearchSettings::MoveTime(self.timecontrol.time),
            "depth" => SearchSettings::Depth(self.timecontrol.ply),
            "nodes" => SearchSettings::Nodes(self.timecontrol.nodes),
            other => {
                return Err(Error::Invalid(format!("unrecognised time control type '{}'", other)))
            },
        };

        if self.openings.path.is_empty() {
            return Err(Error::Invalid("the settings must name an openings path".to_owned()));
        }

        // "confidence" is shorthand for symmetric error rates; explicit rates win.
        let confidence_rate = self.sprt.confidence.map(|c| 1.0 - c);
        let sprt = SprtSettings {
            enabled: self.sprt.enabled,
            alpha: self.sprt.alpha.or(confidence_rate).unwrap_or(0.05),
            beta: self.sprt.beta.or(confidence_rate).unwrap_or(0.05),
            elo0: self.sprt.elo0.unwrap_or(0.0),
            elo1: self.sprt.elo1.unwrap_or(5.0),
        };

        let mut engines = Vec::new();
        for (id, raw) in self.engines.into_iter().enumerate() {
            if raw.path.is_empty() {
                return Err(Error::Invalid(format!("engine {} has no path", id)));
            }

            let dialect = if raw.protocol.is_empty() {
                Dialect::Ugi
            } else {
                raw.protocol.parse::<Dialect>()
                    .map_err(|err| Error::Invalid(err.to_string()))?
            };
            if game == GameKind::Generic && dialect != Dialect::Ugi {
                return Err(Error::Invalid(
                    "generic game mode must use the UGI protocol".to_owned(),
                ));
            }

            let name = if raw.name.is_empty() {
                Path::new(&raw.path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| raw.path.clone())
            } else {
                raw.name
            };

            // global options first, then the engine's own on top
            let mut options = self.options.clone();
            options.extend(raw.options);

            engines.push(EngineSpec {
                id,
                name,
                path: raw.path,
                args: raw.parameters.split_whitespace().map(str::to_owned).collect(),
                options,
                dialect,
            });
        }

        if engines.len() < 2 {
            return Err(Error::Invalid("the settings must include at least two engines".to_owned()));
        }

        Ok(MatchSettings {
            game,
            num_games: self.games.max(1),
            num_threads: self.concurrency.max(1),
            store_size: 2,
            update_frequency: self.ratinginterval.max(1),
            debug: self.debug,
            verbose: self.verbose,
            recover: self.recover,
            tournament,
            protocol: ProtocolSettings { ask_turn: self.protocol.askturn, gameover },
            adjudication: AdjudicationSettings {
                timeout_buffer_ms: self.adjudication.timeoutbuffer,
                max_full_moves: self.adjudication.maxfullmoves,
            },
            timecontrol,
            openings: OpeningsSettings {
                path: self.openings.path,
                repeat: self.openings.repeat,
                shuffle: self.openings.shuffle,
            },
            sprt,
            pgn: PgnSettings {
                enabled: self.pgn.enabled,
                path: self.pgn.path,
                event: self.pgn.event,
                colour1: self.pgn.colour1,
                colour2: self.pgn.colour2,
                overwrite: self.pgn.overwrite,
                verbose: self.pgn.verbose,
            },
            engines,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A configuration failure. Fatal at startup.
#[derive(Debug)]
pub enum Error {
    /// The settings file could not be read.
    Io(io::Error),
    /// The settings file is not valid JSON.
    Parse(serde_json::Error),
    /// The document is well-formed but doesn't describe a playable match.
    Invalid(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "could not read settings: {}", err),
            Error::Parse(err) => write!(f, "could not parse settings: {}", err),
            Error::Invalid(msg) => write!(f, "invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Parse(err) => Some(err),
            Error::Invalid(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Parse(err)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(extra: &str) -> String {
        format!(
            r#"{{
                "openings": {{ "path": "book.txt" }},
                "engines": [
                    {{ "name": "alpha", "path": "/bin/alpha" }},
                    {{ "name": "beta", "path": "/bin/beta" }}
                ]{}{}
            }}"#,
            if extra.is_empty() { "" } else { "," },
            extra,
        )
    }

    #[test]
    fn minimal_document_gets_the_defaults() {
        let settings = MatchSettings::parse(&minimal("")).unwrap();

        assert_eq!(settings.game, GameKind::Generic);
        assert_eq!(settings.num_games, 1);
        assert_eq!(settings.num_threads, 1);
        assert_eq!(settings.store_size, 2);
        assert_eq!(settings.update_frequency, 10);
        assert!(settings.recover);
        assert!(settings.openings.repeat);
        assert!(!settings.openings.shuffle);
        assert_eq!(settings.tournament, TournamentKind::RoundRobin);
        assert_eq!(settings.timecontrol, SearchSettings::Depth(1));
        assert!(!settings.sprt.enabled);
        assert!(settings.pgn.enabled);
        assert_eq!(settings.pgn.path, "games.pgn");
        assert_eq!(settings.pgn.colour1, "white");
        assert_eq!(settings.engines.len(), 2);
        assert_eq!(settings.engines[0].name, "alpha");
        assert_eq!(settings.engines[1].id, 1);
    }

    #[test]
    fn full_document_round_trips() {
        let text = r#"{
            "games": 64,
            "game": "ataxx",
            "concurrency": 8,
            "ratinginterval": 5,
            "debug": true,
            "verbose": true,
            "recover": false,
            "tournament": "gauntlet",
            "protocol": { "askturn": true, "gameover": "both" },
            "adjudication": { "timeoutbuffer": 25, "maxfullmoves": 200 },
            "timecontrol": { "type": "clock", "time": 5000, "increment": 50 },
            "openings": { "path": "openings.txt", "repeat": false, "shuffle": true },
            "sprt": { "enabled": true, "alpha": 0.01, "beta": 0.02, "elo0": -1, "elo1": 4 },
            "pgn": {
                "enabled": true, "path": "out.pgn", "event": "test",
                "colour1": "black", "colour2": "white", "override": true, "verbose": true
            },
            "options": { "hash": "64" },
            "engines": [
                { "name": "alpha", "path": "/bin/alpha", "protocol": "UAI",
                  "parameters": "--threads 2", "options": { "hash": "128" } },
                { "path": "/bin/engines/beta", "protocol": "UAI" }
            ]
        }"#;
        let settings = MatchSettings::parse(text).unwrap();

        assert_eq!(settings.game, GameKind::Ataxx);
        assert_eq!(settings.num_games, 64);
        assert_eq!(settings.num_threads, 8);
        assert_eq!(settings.update_frequency, 5);
        assert!(!settings.recover);
        assert_eq!(settings.tournament, TournamentKind::Gauntlet);
        assert!(settings.protocol.ask_turn);
        assert_eq!(settings.protocol.gameover, QueryGameover::Both);
        assert_eq!(settings.adjudication.timeout_buffer_ms, 25);
        assert_eq!(settings.adjudication.max_full_moves, 200);
        assert_eq!(
            settings.timecontrol,
            SearchSettings::Time { p1time: 5000, p2time: 5000, p1inc: 50, p2inc: 50 },
        );
        assert!(!settings.openings.repeat);
        assert!(settings.openings.shuffle);
        assert!(settings.sprt.enabled);
        assert!((settings.sprt.alpha - 0.01).abs() < 1e-12);
        assert!((settings.sprt.beta - 0.02).abs() < 1e-12);
        assert!((settings.sprt.elo0 + 1.0).abs() < 1e-12);
        assert!(settings.pgn.overwrite);
        assert_eq!(settings.pgn.colour1, "black");

        let alpha = &settings.engines[0];
        assert_eq!(alpha.dialect, Dialect::Uai);
        assert_eq!(alpha.args, ["--threads".to_owned(), "2".to_owned()]);
        assert_eq!(alpha.options.get("hash"), Some(&"128".to_owned()));

        // the unnamed engine takes its executable's name and the global options
        let beta = &settings.engines[1];
        assert_eq!(beta.name, "beta");
        assert_eq!(beta.options.get("hash"), Some(&"64".to_owned()));
    }

    #[test]
    fn confidence_sets_symmetric_error_rates() {
        let settings = MatchSettings::parse(&minimal(
            r#""sprt": { "enabled": true, "confidence": 0.95 }"#,
        )).unwrap();

        assert!((settings.sprt.alpha - 0.05).abs() < 1e-12);
        assert!((settings.sprt.beta - 0.05).abs() < 1e-12);
    }

    #[test]
    fn openings_path_is_required() {
        let text = r#"{
            "engines": [
                { "name": "a", "path": "/bin/a" },
                { "name": "b", "path": "/bin/b" }
            ]
        }"#;
        assert!(matches!(MatchSettings::parse(text), Err(Error::Invalid(_))));
    }

    #[test]
    fn two_engines_are_required() {
        let text = r#"{
            "openings": { "path": "book.txt" },
            "engines": [ { "name": "a", "path": "/bin/a" } ]
        }"#;
        assert!(matches!(MatchSettings::parse(text), Err(Error::Invalid(_))));
    }

    #[test]
    fn generic_games_must_speak_ugi() {
        let text = r#"{
            "openings": { "path": "book.txt" },
            "engines": [
                { "name": "a", "path": "/bin/a", "protocol": "UAI" },
                { "name": "b", "path": "/bin/b" }
            ]
        }"#;
        assert!(matches!(MatchSettings::parse(text), Err(Error::Invalid(_))));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(MatchSettings::parse(&minimal(r#""game": "checkers""#)).is_err());
        assert!(MatchSettings::parse(&minimal(r#""tournament": "swiss""#)).is_err());
        assert!(MatchSettings::parse(&minimal(r#""timecontrol": { "type": "sand" }"#)).is_err());
        assert!(MatchSettings::parse(&minimal(r#""protocol": { "gameover": "nobody" }"#)).is_err());
        assert!(MatchSettings::parse("{ not json").is_err());
    }
}
