//! Game state tracking and the oracles which answer turn, termination and result
//! questions for the supported games.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use std::ops::Not;
use crate::engine::{self, Engine};

pub mod ataxx;
pub mod chess;

pub use ataxx::AtaxxGame;
pub use chess::ChessGame;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One of the two players of a game. Which colour a player holds is up to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The first player (black in ataxx, white in chess).
    Player1,
    /// The second player.
    Player2,
}

impl Not for Side {
    type Output = Side;

    fn not(self) -> Side {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The outcome of a game, from player 1's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    /// Player 1 won.
    Player1Win,
    /// Player 2 won.
    Player2Win,
    /// The game was drawn.
    Draw,
    /// No result could be established.
    None,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Why a game was decided by the tournament runner rather than by play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjudicationReason {
    /// The side to move exceeded its search budget.
    Timeout,
    /// An engine died mid-game.
    Crash,
    /// The game hit the configured move limit.
    Gamelength,
    /// The engines disagreed on whether the game was over.
    GameoverMismatch,
    /// The engines agreed the game was over but disagreed on the result.
    ResultMismatch,
}

impl fmt::Display for AdjudicationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjudicationReason::Timeout => "Out of time",
            AdjudicationReason::Crash => "Crashed",
            AdjudicationReason::Gamelength => "Maximum game length",
            AdjudicationReason::GameoverMismatch => "Gameover mismatch",
            AdjudicationReason::ResultMismatch => "Result mismatch",
        }.fmt(f)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Which game the engines are playing, and so which oracle adjudicates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    /// Any game. Ground truth comes from the engines themselves via `query`.
    Generic,
    /// Ataxx, adjudicated by the built-in board.
    Ataxx,
    /// Chess, adjudicated by the built-in board.
    Chess,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The state of one game in progress, plus the oracle that answers questions about it.
///
/// The `engine` parameter of the query methods is only consulted by the generic
/// implementation, which has no rules of its own; the ataxx and chess games answer
/// locally. Callers never need to know which is the case, but they must keep the
/// engine informed of the position (`isready` + `position`) before querying, since a
/// generic game forwards the question as-is.
pub trait Game: fmt::Debug {
    /// The position token the game started from (`startpos` or a FEN).
    fn start_fen(&self) -> &str;

    /// The moves played so far, in order.
    fn moves(&self) -> &[String];

    /// The side to move.
    fn turn(&self) -> Side;

    /// Overrides the side to move (used when the engine is the authority on turn order).
    fn set_turn(&mut self, side: Side);

    /// The side which moved first, for the record file.
    fn first_mover(&self) -> Side;

    /// Records which side moved first.
    fn set_first_mover(&mut self, side: Side);

    /// Whether it is player 1's turn.
    fn is_p1_turn(&self, engine: &mut dyn Engine) -> engine::Result<bool>;

    /// Whether the game has reached a terminal position.
    fn is_gameover(&self, engine: &mut dyn Engine) -> engine::Result<bool>;

    /// The result of the game, or [`GameResult::None`] if it isn't over.
    fn result(&self, engine: &mut dyn Engine) -> engine::Result<GameResult>;

    /// Plays a move and passes the turn to the other side.
    fn make_move(&mut self, mv: &str) -> Result<()>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Everything the reporting side needs to know about a finished game: the opening it
/// was played from, the moves, who moved first, and how long each move took.
#[derive(Debug, Clone)]
pub struct GameRecord {
    /// The position token the game started from.
    pub start_fen: String,
    /// The moves played, in order.
    pub moves: Vec<String>,
    /// The side which moved first.
    pub first_mover: Side,
    /// Thinking time per move, parallel to `moves`.
    pub move_times: Vec<std::time::Duration>,
}

/// Creates the game state for one game of `kind` starting from `fen`.
pub fn new_game(kind: GameKind, fen: &str) -> Result<Box<dyn Game>> {
    Ok(match kind {
        GameKind::Generic => Box::new(GenericGame::new(fen)),
        GameKind::Ataxx => Box::new(AtaxxGame::new(fen)?),
        GameKind::Chess => Box::new(ChessGame::new(fen)?),
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The bookkeeping common to every game: the opening token, the move list and the
/// turn tracking needed for the record file.
#[derive(Debug, Clone)]
pub struct GameState {
    start_fen: String,
    moves: Vec<String>,
    turn: Side,
    first_mover: Side,
}

impl GameState {
    fn new(start_fen: &str) -> GameState {
        GameState {
            start_fen: start_fen.to_owned(),
            moves: Vec::new(),
            turn: Side::Player1,
            first_mover: Side::Player1,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A game this program knows nothing about. Every question goes to the engines, and
/// the side to move is assumed to alternate (the `askturn` protocol option covers
/// games where it doesn't).
#[derive(Debug, Clone)]
pub struct GenericGame {
    state: GameState,
}

impl GenericGame {
    /// Creates a generic game. The position token is passed through to the engines
    /// without validation.
    pub fn new(fen: &str) -> GenericGame {
        GenericGame { state: GameState::new(fen) }
    }
}

impl Game for GenericGame {
    fn start_fen(&self) -> &str {
        &self.state.start_fen
    }

    fn moves(&self) -> &[String] {
        &self.state.moves
    }

    fn turn(&self) -> Side {
        self.state.turn
    }

    fn set_turn(&mut self, side: Side) {
        self.state.turn = side;
    }

    fn first_mover(&self) -> Side {
        self.state.first_mover
    }

    fn set_first_mover(&mut self, side: Side) {
        self.state.first_mover = side;
    }

    fn is_p1_turn(&self, engine: &mut dyn Engine) -> engine::Result<bool> {
        engine.query_p1_turn()
    }

    fn is_gameover(&self, engine: &mut dyn Engine) -> engine::Result<bool> {
        engine.query_gameover()
    }

    fn result(&self, engine: &mut dyn Engine) -> engine::Result<GameResult> {
        engine.query_result()
    }

    fn make_move(&mut self, mv: &str) -> Result<()> {
        self.state.moves.push(mv.to_owned());
        self.state.turn = !self.state.turn;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The result type for game state operations.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An error from a game oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The position string could not be parsed.
    BadFen(String),
    /// A move token could not be parsed or is not legal in the current position.
    BadMove(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadFen(fen) => write!(f, "invalid position '{}'", fen),
            Error::BadMove(mv) => write!(f, "invalid move '{}'", mv),
        }
    }
}

impl std::error::Error for Error { }
