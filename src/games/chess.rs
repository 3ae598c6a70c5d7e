//! The chess oracle, backed by `shakmaty`.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, Position};
use crate::engine::{self, Engine};
use super::{Error, Game, GameResult, GameState, Result, Side};

/// Fifty moves per side without progress draws the game.
const HALFMOVE_LIMIT: u32 = 100;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A chess game. Turn, termination and result questions are answered by the built-in
/// position; the engines are never consulted. Player 1 is white; moves arrive in UCI
/// notation.
///
/// Checkmate, stalemate, insufficient material and the fifty-move rule are
/// adjudicated here. Repetition is not tracked; in generic mode the engines' own
/// `gameover` claims cover it.
#[derive(Debug, Clone)]
pub struct ChessGame {
    state: GameState,
    pos: Chess,
}

impl ChessGame {
    /// Creates a chess game starting from the given FEN or `startpos`.
    pub fn new(fen: &str) -> Result<ChessGame> {
        let pos = if fen.is_empty() || fen == "startpos" {
            Chess::default()
        } else {
            fen.parse::<Fen>()
                .map_err(|_| Error::BadFen(fen.to_owned()))?
                .into_position(CastlingMode::Standard)
                .map_err(|_| Error::BadFen(fen.to_owned()))?
        };

        let mut state = GameState::new(fen);
        state.turn = side_of(pos.turn());
        state.first_mover = state.turn;

        Ok(ChessGame { state, pos })
    }

    fn gameover(&self) -> bool {
        self.pos.halfmoves() >= HALFMOVE_LIMIT
            || self.pos.legal_moves().is_empty()
            || self.pos.is_insufficient_material()
    }
}

fn side_of(color: Color) -> Side {
    match color {
        Color::White => Side::Player1,
        Color::Black => Side::Player2,
    }
}

impl Game for ChessGame {
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

    fn is_p1_turn(&self, _: &mut dyn Engine) -> engine::Result<bool> {
        Ok(self.pos.turn() == Color::White)
    }

    fn is_gameover(&self, _: &mut dyn Engine) -> engine::Result<bool> {
        Ok(self.gameover())
    }

    fn result(&self, _: &mut dyn Engine) -> engine::Result<GameResult> {
        Ok(if self.pos.is_checkmate() {
            match self.pos.turn() {
                Color::White => GameResult::Player2Win,
                Color::Black => GameResult::Player1Win,
            }
        } else if self.gameover() {
            GameResult::Draw
        } else {
            GameResult::None
        })
    }

    fn make_move(&mut self, mv: &str) -> Result<()> {
        let parsed = UciMove::from_ascii(mv.as_bytes())
            .map_err(|_| Error::BadMove(mv.to_owned()))?
            .to_move(&self.pos)
            .map_err(|_| Error::BadMove(mv.to_owned()))?;

        self.pos.play_unchecked(&parsed);
        self.state.moves.push(mv.to_owned());
        self.state.turn = side_of(self.pos.turn());
        Ok(())
    }
}
