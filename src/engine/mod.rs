//! Engine descriptions and the protocol-level interface to a running engine.
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
use std::io;
use std::str::FromStr;
use crate::games::GameResult;

pub mod process;
pub mod session;
pub mod store;

pub use process::EngineProcess;
pub use session::EngineSession;
pub use store::Store;

/// The move token an engine session falls back to when a `bestmove` line carries no move.
pub const NULL_MOVE: &str = "0000";

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The protocol dialect an engine speaks. The dialects differ only in their reserved
/// keywords: the handshake (`ugi`/`uaiok`/…), the `newgame` command, and the names the
/// clock fields take in the `go` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The Universal Game Interface. Clocks are named for the players (`p1time`, …).
    Ugi,
    /// The ataxx dialect. Player 1 is black (`btime`).
    Uai,
    /// The chess dialect. Player 1 is white (`wtime`).
    Uci,
}

impl Dialect {
    /// The handshake keyword, which also prefixes `ok` and `newgame`.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Ugi => "ugi",
            Dialect::Uai => "uai",
            Dialect::Uci => "uci",
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UGI" | "ugi" => Ok(Dialect::Ugi),
            "UAI" | "uai" => Ok(Dialect::Uai),
            "UCI" | "uci" => Ok(Dialect::Uci),
            _ => Err(Error::UnknownDialect(s.to_owned())),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An immutable description of an engine taking part in the match. Built from the
/// settings document at startup and never modified afterwards.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    /// Dense index of this engine in the roster, `0..num_engines`.
    pub id: usize,
    /// Display name used in reports and the record file.
    pub name: String,
    /// Path to the executable.
    pub path: String,
    /// Extra command-line arguments passed to the executable.
    pub args: Vec<String>,
    /// Options sent with `setoption` after the handshake.
    pub options: HashMap<String, String>,
    /// The protocol dialect this engine speaks.
    pub dialect: Dialect,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The search budget for a single `go` command. A per-game mutable copy tracks the
/// remaining clocks while the game is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSettings {
    /// A game clock per player, with increments, all in milliseconds.
    Time {
        /// Player 1's remaining time.
        p1time: i64,
        /// Player 2's remaining time.
        p2time: i64,
        /// Player 1's increment per move.
        p1inc: i64,
        /// Player 2's increment per move.
        p2inc: i64,
    },
    /// A fixed time per move, in milliseconds.
    MoveTime(i64),
    /// A fixed search depth in plies.
    Depth(u32),
    /// A fixed node count.
    Nodes(u64),
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The protocol operations a game needs from an engine. `EngineSession` implements this
/// over a child process; tests drive the game player with scripted implementations.
pub trait Engine {
    /// The engine's index in the roster.
    fn id(&self) -> usize;

    /// Performs the protocol handshake and waits for `{dialect}ok`.
    fn init(&mut self) -> Result<()>;

    /// Sends `isready` and waits for `readyok`.
    fn is_ready(&mut self) -> Result<()>;

    /// Sends `{dialect}newgame`. No response is awaited.
    fn new_game(&mut self) -> Result<()>;

    /// Sends `setoption name <name> value <value>`. No response is awaited.
    fn set_option(&mut self, name: &str, value: &str) -> Result<()>;

    /// Sends the current game state as a `position` command. No response is awaited.
    fn position(&mut self, start_fen: &str, moves: &[String]) -> Result<()>;

    /// Sends `go` with the given search settings and waits for a `bestmove` line,
    /// returning the move token.
    fn go(&mut self, settings: &SearchSettings) -> Result<String>;

    /// Asks the engine whether it is player 1's turn (`query p1turn`).
    fn query_p1_turn(&mut self) -> Result<bool>;

    /// Asks the engine whether the game is over (`query gameover`).
    fn query_gameover(&mut self) -> Result<bool>;

    /// Asks the engine for the game result (`query result`).
    fn query_result(&mut self) -> Result<GameResult>;

    /// Sends `quit`, best-effort.
    fn quit(&mut self) -> Result<()>;

    /// Returns `true` if the engine process is still running.
    fn is_alive(&mut self) -> bool;
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An error talking to an engine.
#[derive(Debug)]
pub enum Error {
    /// The engine executable could not be started.
    Launch(io::Error),
    /// Writing to or reading from the engine's pipes failed.
    Io(io::Error),
    /// The engine exited, or closed its output, before sending an awaited response.
    Crash,
    /// The settings document named a protocol this program doesn't speak.
    UnknownDialect(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Launch(err) => write!(f, "failed to launch engine: {}", err),
            Error::Io(err) => write!(f, "lost communication with engine: {}", err),
            Error::Crash => write!(f, "engine exited unexpectedly"),
            Error::UnknownDialect(s) => write!(f, "unknown protocol dialect '{}'", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Launch(err) | Error::Io(err) => Some(err),
            _ => None,
        }
    }
}
