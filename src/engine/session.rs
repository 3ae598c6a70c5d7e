//! The protocol-level wrapper around a running engine process.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt::Write as _;
use std::sync::Arc;
use std::thread;
use crate::games::GameResult;
use crate::PRINT_MUTEX;
use super::process::{EngineProcess, LineHook};
use super::{Dialect, Engine, EngineSpec, Result, SearchSettings, NULL_MOVE};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One live engine subprocess plus its identity. Sessions are exclusively owned: a
/// worker checks one out of the store (or spawns one), drives it for a game, and
/// either returns it or drops it.
#[derive(Debug)]
pub struct EngineSession {
    id: usize,
    name: String,
    dialect: Dialect,
    process: EngineProcess,
}

impl EngineSession {
    /// Spawns the engine described by `spec`. In debug mode all protocol traffic is
    /// echoed to stdout, tagged with the worker thread that produced it.
    ///
    /// The caller still has to perform the handshake with [`init`](Engine::init) and
    /// send the spec's options.
    pub fn spawn(spec: &EngineSpec, debug: bool) -> Result<EngineSession> {
        let mut process = EngineProcess::spawn(&spec.path, &spec.args)?;
        if debug {
            process.set_hooks(Some(echo_hook("send")), Some(echo_hook("recv")));
        }

        Ok(EngineSession {
            id: spec.id,
            name: spec.name.clone(),
            dialect: spec.dialect,
            process,
        })
    }

    /// The engine's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends `query <kind>` and returns the payload of the `response` line.
    fn query(&mut self, kind: &str) -> Result<String> {
        self.process.send(&format!("query {}", kind))?;
        let line = self.process.recv_until(|line| {
            let mut parts = line.split_whitespace();
            parts.next() == Some("response") && parts.next().is_some()
        })?;

        Ok(line.split_whitespace().nth(1).expect("INFALLIBLE").to_owned())
    }
}

impl Engine for EngineSession {
    fn id(&self) -> usize {
        self.id
    }

    fn init(&mut self) -> Result<()> {
        let ok = format!("{}ok", self.dialect.name());
        self.process.send(self.dialect.name())?;
        self.process.recv_until(|line| line == ok)?;
        Ok(())
    }

    fn is_ready(&mut self) -> Result<()> {
        self.process.send("isready")?;
        self.process.recv_until(|line| line == "readyok")?;
        Ok(())
    }

    fn new_game(&mut self) -> Result<()> {
        self.process.send(&format!("{}newgame", self.dialect.name()))
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        self.process.send(&format!("setoption name {} value {}", name, value))
    }

    fn position(&mut self, start_fen: &str, moves: &[String]) -> Result<()> {
        self.process.send(&position_command(start_fen, moves))
    }

    fn go(&mut self, settings: &SearchSettings) -> Result<String> {
        self.process.send(&go_command(self.dialect, settings))?;
        let line = self.process.recv_until(|line| {
            let mut parts = line.split_whitespace();
            parts.next() == Some("bestmove") && parts.next().is_some()
        })?;

        Ok(line.split_whitespace().nth(1).unwrap_or(NULL_MOVE).to_owned())
    }

    fn query_p1_turn(&mut self) -> Result<bool> {
        Ok(self.query("p1turn")? == "true")
    }

    fn query_gameover(&mut self) -> Result<bool> {
        Ok(self.query("gameover")? == "true")
    }

    fn query_result(&mut self) -> Result<GameResult> {
        Ok(match self.query("result")?.as_str() {
            "p1win" => GameResult::Player1Win,
            "p2win" => GameResult::Player2Win,
            "draw" => GameResult::Draw,
            _ => GameResult::None,
        })
    }

    fn quit(&mut self) -> Result<()> {
        self.process.send("quit")
    }

    fn is_alive(&mut self) -> bool {
        self.process.is_alive()
    }
}

impl Drop for EngineSession {
    /// Asks the engine to quit; dropping the process then closes its stdin and reaps it.
    fn drop(&mut self) {
        let _ = self.process.send("quit");
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Builds the `position` command for a game state.
pub fn position_command(start_fen: &str, moves: &[String]) -> String {
    let mut msg = if start_fen.is_empty() || start_fen == "startpos" {
        "position startpos".to_owned()
    } else {
        format!("position fen {}", start_fen)
    };

    if !moves.is_empty() {
        msg += " moves";
        for mv in moves {
            msg += " ";
            msg += mv;
        }
    }

    msg
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Builds the `go` command for the given dialect and search settings.
///
/// The clock keywords are dialect-specific: UGI names them for the players, while UAI
/// and UCI name them for the colours, with player 1 being black in UAI and white in UCI.
pub fn go_command(dialect: Dialect, settings: &SearchSettings) -> String {
    match *settings {
        SearchSettings::Time { p1time, p2time, p1inc, p2inc } => {
            let (t1, t2, i1, i2) = match dialect {
                Dialect::Ugi => ("p1time", "p2time", "p1inc", "p2inc"),
                Dialect::Uai => ("btime", "wtime", "binc", "winc"),
                Dialect::Uci => ("wtime", "btime", "winc", "binc"),
            };
            let mut msg = String::from("go");
            write!(msg, " {} {}", t1, p1time).expect("INFALLIBLE");
            write!(msg, " {} {}", t2, p2time).expect("INFALLIBLE");
            write!(msg, " {} {}", i1, p1inc).expect("INFALLIBLE");
            write!(msg, " {} {}", i2, p2inc).expect("INFALLIBLE");
            msg
        },
        SearchSettings::MoveTime(ms) => format!("go movetime {}", ms),
        SearchSettings::Depth(plies) => format!("go depth {}", plies),
        SearchSettings::Nodes(nodes) => format!("go nodes {}", nodes),
    }
}

/// An echo hook for debug mode: prints a protocol line under the global print mutex.
fn echo_hook(direction: &'static str) -> LineHook {
    Arc::new(move |line: &str| {
        let _guard = PRINT_MUTEX.lock().expect("INFALLIBLE");
        println!("<{}:{:?}> {}", direction, thread::current().id(), line);
    })
}
