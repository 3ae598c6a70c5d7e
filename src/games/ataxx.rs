//! A compact ataxx board, used to adjudicate ataxx games locally.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use crate::engine::{self, Engine, NULL_MOVE};
use super::{Error, Game, GameResult, GameState, Result, Side};

/// The position the `startpos` token stands for.
const STARTPOS: &str = "x5o/7/7/7/7/7/o5x x 0 1";

/// All 49 squares of the 7x7 board.
const ALL: u64 = (1 << 49) - 1;

/// Fifty moves per side without progress draws the game.
const HALFMOVE_LIMIT: u32 = 100;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A 7x7 ataxx position. Square `a1` is bit 0; bit order runs along each rank.
///
/// Player 1 is `x` (black), player 2 is `o` (white). A move either spawns a new stone
/// onto an adjacent empty square (written as its destination, `f2`) or jumps a stone
/// exactly two squares (`a1b3`); either way every enemy stone next to the destination
/// changes sides. A player with no move must pass (`0000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtaxxBoard {
    black: u64,
    white: u64,
    gaps: u64,
    turn: Side,
    halfmoves: u32,
    fullmoves: u32,
}

impl AtaxxBoard {
    /// Parses a position from an ataxx FEN, or the `startpos` token.
    pub fn from_fen(fen: &str) -> Result<AtaxxBoard> {
        let fen = if fen.is_empty() || fen == "startpos" { STARTPOS } else { fen };
        let bad = || Error::BadFen(fen.to_owned());

        let mut fields = fen.split_whitespace();
        let rows = fields.next().ok_or_else(bad)?;
        let turn = match fields.next() {
            Some("x") | Some("X") => Side::Player1,
            Some("o") | Some("O") => Side::Player2,
            _ => return Err(bad()),
        };
        let halfmoves = match fields.next() {
            Some(s) => s.parse().map_err(|_| bad())?,
            None => 0,
        };
        let fullmoves = match fields.next() {
            Some(s) => s.parse().map_err(|_| bad())?,
            None => 1,
        };

        let mut board = AtaxxBoard {
            black: 0,
            white: 0,
            gaps: 0,
            turn,
            halfmoves,
            fullmoves,
        };

        // Rows run from rank 7 down to rank 1.
        let mut rank: i32 = 6;
        for row in rows.split('/') {
            if rank < 0 {
                return Err(bad());
            }
            let mut file: u32 = 0;
            for c in row.chars() {
                match c {
                    'x' | 'X' => board.black |= bit(file, rank as u32),
                    'o' | 'O' => board.white |= bit(file, rank as u32),
                    '-' => board.gaps |= bit(file, rank as u32),
                    '1'..='7' => {
                        file += c.to_digit(10).expect("INFALLIBLE") - 1;
                    },
                    _ => return Err(bad()),
                }
                file += 1;
                if file > 7 {
                    return Err(bad());
                }
            }
            if file != 7 {
                return Err(bad());
            }
            rank -= 1;
        }
        if rank != -1 {
            return Err(bad());
        }

        Ok(board)
    }

    /// The side to move.
    pub fn turn(&self) -> Side {
        self.turn
    }

    /// The halfmove clock.
    pub fn halfmoves(&self) -> u32 {
        self.halfmoves
    }

    /// The number of stones the given side has on the board.
    pub fn count(&self, side: Side) -> u32 {
        self.stones(side).count_ones()
    }

    fn stones(&self, side: Side) -> u64 {
        match side {
            Side::Player1 => self.black,
            Side::Player2 => self.white,
        }
    }

    fn empty(&self) -> u64 {
        ALL & !(self.black | self.white | self.gaps)
    }

    /// Whether `side` has a spawn or jump available (passing doesn't count).
    pub fn can_move(&self, side: Side) -> bool {
        let own = self.stones(side);
        let empty = self.empty();

        expand(own, 1) & empty != 0 || expand(own, 2) & empty != 0
    }

    /// Whether the game has reached a terminal position.
    pub fn is_gameover(&self) -> bool {
        self.black == 0
            || self.white == 0
            || self.halfmoves >= HALFMOVE_LIMIT
            || (!self.can_move(Side::Player1) && !self.can_move(Side::Player2))
    }

    /// The result of the game, or [`GameResult::None`] if it isn't over.
    pub fn result(&self) -> GameResult {
        if !self.is_gameover() {
            return GameResult::None;
        }

        if self.black == 0 {
            return GameResult::Player2Win;
        }
        if self.white == 0 {
            return GameResult::Player1Win;
        }
        if self.halfmoves >= HALFMOVE_LIMIT {
            return GameResult::Draw;
        }

        let black = self.black.count_ones();
        let white = self.white.count_ones();
        if black > white {
            GameResult::Player1Win
        } else if white > black {
            GameResult::Player2Win
        } else {
            GameResult::Draw
        }
    }

    /// Plays a move given in UAI notation: a destination square for a spawn, a
    /// from-to pair for a jump, or `0000` for a forced pass.
    pub fn make_move(&mut self, mv: &str) -> Result<()> {
        let bad = || Error::BadMove(mv.to_owned());

        if mv == NULL_MOVE {
            // Passing is only legal when there is nothing else to play.
            if self.can_move(self.turn) {
                return Err(bad());
            }
            self.halfmoves += 1;
            self.finish_move();
            return Ok(());
        }

        let own = self.stones(self.turn);
        let squares: Vec<u32> = parse_squares(mv).ok_or_else(bad)?;
        let (from, to) = match squares.len() {
            1 => (None, squares[0]),
            2 => (Some(squares[0]), squares[1]),
            _ => return Err(bad()),
        };

        if self.empty() & (1 << to) == 0 {
            return Err(bad());
        }
        match from {
            // A spawn needs a friendly stone next to the destination.
            None => {
                if ring(to, 1) & own == 0 {
                    return Err(bad());
                }
            },
            // A jump moves a friendly stone exactly two squares.
            Some(from) => {
                if own & (1 << from) == 0 || ring(from, 2) & (1 << to) == 0 {
                    return Err(bad());
                }
            },
        }

        let flips = ring(to, 1) & self.stones(!self.turn);
        let progress = from.is_none() || flips != 0;

        match self.turn {
            Side::Player1 => {
                if let Some(from) = from {
                    self.black &= !(1 << from);
                }
                self.black |= (1 << to) | flips;
                self.white &= !flips;
            },
            Side::Player2 => {
                if let Some(from) = from {
                    self.white &= !(1 << from);
                }
                self.white |= (1 << to) | flips;
                self.black &= !flips;
            },
        }

        self.halfmoves = if progress { 0 } else { self.halfmoves + 1 };
        self.finish_move();
        Ok(())
    }

    fn finish_move(&mut self) {
        if self.turn == Side::Player2 {
            self.fullmoves += 1;
        }
        self.turn = !self.turn;
    }

    /// Every legal move for the side to move, in UAI notation. When the side to move
    /// is blocked but the game isn't over, the only legal move is the pass.
    pub fn legal_moves(&self) -> Vec<String> {
        let own = self.stones(self.turn);
        let empty = self.empty();
        let mut moves = Vec::new();

        let mut spawns = expand(own, 1) & empty;
        while spawns != 0 {
            let to = spawns.trailing_zeros();
            spawns &= spawns - 1;
            moves.push(square_name(to));
        }

        let mut sources = own;
        while sources != 0 {
            let from = sources.trailing_zeros();
            sources &= sources - 1;
            let mut targets = ring(from, 2) & empty;
            while targets != 0 {
                let to = targets.trailing_zeros();
                targets &= targets - 1;
                moves.push(format!("{}{}", square_name(from), square_name(to)));
            }
        }

        if moves.is_empty() && !self.is_gameover() {
            moves.push(NULL_MOVE.to_owned());
        }

        moves
    }
}

fn bit(file: u32, rank: u32) -> u64 {
    1 << (rank * 7 + file)
}

/// The squares at exactly Chebyshev distance `dist` from `sq`.
fn ring(sq: u32, dist: i32) -> u64 {
    let file = (sq % 7) as i32;
    let rank = (sq / 7) as i32;
    let mut mask = 0;

    for dr in -dist..=dist {
        for df in -dist..=dist {
            if dr.abs().max(df.abs()) != dist {
                continue;
            }
            let (f, r) = (file + df, rank + dr);
            if (0..7).contains(&f) && (0..7).contains(&r) {
                mask |= bit(f as u32, r as u32);
            }
        }
    }

    mask
}

/// The union of the distance-`dist` rings around every set square.
fn expand(mut stones: u64, dist: i32) -> u64 {
    let mut mask = 0;
    while stones != 0 {
        mask |= ring(stones.trailing_zeros(), dist);
        stones &= stones - 1;
    }
    mask
}

fn parse_squares(mv: &str) -> Option<Vec<u32>> {
    let chars: Vec<char> = mv.chars().collect();
    if chars.len() != 2 && chars.len() != 4 {
        return None;
    }

    chars.chunks(2).map(|pair| {
        let file = (pair[0] as i32) - ('a' as i32);
        let rank = (pair[1] as i32) - ('1' as i32);
        if (0..7).contains(&file) && (0..7).contains(&rank) {
            Some((rank * 7 + file) as u32)
        } else {
            None
        }
    }).collect()
}

fn square_name(sq: u32) -> String {
    let file = (b'a' + (sq % 7) as u8) as char;
    let rank = (b'1' + (sq / 7) as u8) as char;
    format!("{}{}", file, rank)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An ataxx game. Turn, termination and result questions are answered by the built-in
/// board; the engines are never consulted.
#[derive(Debug, Clone)]
pub struct AtaxxGame {
    state: GameState,
    board: AtaxxBoard,
}

impl AtaxxGame {
    /// Creates an ataxx game starting from the given FEN or `startpos`.
    pub fn new(fen: &str) -> Result<AtaxxGame> {
        let board = AtaxxBoard::from_fen(fen)?;
        let mut state = GameState::new(fen);
        state.turn = board.turn();
        state.first_mover = state.turn;

        Ok(AtaxxGame { state, board })
    }
}

impl Game for AtaxxGame {
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
        Ok(self.board.turn() == Side::Player1)
    }

    fn is_gameover(&self, _: &mut dyn Engine) -> engine::Result<bool> {
        Ok(self.board.is_gameover())
    }

    fn result(&self, _: &mut dyn Engine) -> engine::Result<GameResult> {
        Ok(self.board.result())
    }

    fn make_move(&mut self, mv: &str) -> Result<()> {
        self.board.make_move(mv)?;
        self.state.moves.push(mv.to_owned());
        self.state.turn = self.board.turn();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_layout() {
        let board = AtaxxBoard::from_fen("startpos").unwrap();

        assert_eq!(board.count(Side::Player1), 2);
        assert_eq!(board.count(Side::Player2), 2);
        assert_eq!(board.turn(), Side::Player1);
        assert!(!board.is_gameover());
        assert_eq!(board.result(), GameResult::None);
    }

    #[test]
    fn rejects_malformed_fens() {
        assert!(AtaxxBoard::from_fen("x5o/7/7/7/7/7/o5x").is_err());
        assert!(AtaxxBoard::from_fen("x5o/7/7/7/7/o5x x 0 1").is_err());
        assert!(AtaxxBoard::from_fen("x5o/8/7/7/7/7/o5x x 0 1").is_err());
        assert!(AtaxxBoard::from_fen("x5o/7/7/7/7/7/o5x z 0 1").is_err());
        assert!(AtaxxBoard::from_fen("q5o/7/7/7/7/7/o5x x 0 1").is_err());
    }

    #[test]
    fn spawns_flip_adjacent_stones() {
        let mut board = AtaxxBoard::from_fen("7/7/7/2x1o2/7/7/7 x 0 1").unwrap();

        // d4 sits between the two stones and flips the white one on e4
        board.make_move("d4").unwrap();
        assert_eq!(board.count(Side::Player1), 3);
        assert_eq!(board.count(Side::Player2), 0);
        assert_eq!(board.turn(), Side::Player2);
        assert!(board.is_gameover());
        assert_eq!(board.result(), GameResult::Player1Win);
    }

    #[test]
    fn jumps_move_the_stone() {
        let mut board = AtaxxBoard::from_fen("x5o/7/7/7/7/7/o5x x 0 1").unwrap();

        board.make_move("a7c5").unwrap();
        assert_eq!(board.count(Side::Player1), 2);
        assert_eq!(board.halfmoves(), 1);

        // the vacated corner is open again
        board.make_move("g7e5").unwrap();
        assert_eq!(board.halfmoves(), 2);
    }

    #[test]
    fn halfmove_clock_resets_on_progress() {
        let mut board = AtaxxBoard::from_fen("x5o/7/7/7/7/7/o5x x 40 1").unwrap();

        board.make_move("b7").unwrap();
        assert_eq!(board.halfmoves(), 0);
    }

    #[test]
    fn illegal_moves_are_rejected() {
        let mut board = AtaxxBoard::from_fen("startpos").unwrap();

        assert!(board.make_move("d4").is_err()); // no stone nearby
        assert!(board.make_move("a7").is_err()); // occupied
        assert!(board.make_move("a7d7").is_err()); // too far
        assert!(board.make_move("0000").is_err()); // moves exist, may not pass
        assert!(board.make_move("z9").is_err());
        board.make_move("b7").unwrap();
    }

    #[test]
    fn blocked_side_must_pass() {
        let mut board =
            AtaxxBoard::from_fen("x------/-------/-------/7/7/7/6o x 0 1").unwrap();

        assert!(!board.can_move(Side::Player1));
        assert!(board.can_move(Side::Player2));
        assert!(!board.is_gameover());
        assert_eq!(board.legal_moves(), vec![NULL_MOVE.to_owned()]);

        board.make_move("0000").unwrap();
        assert_eq!(board.turn(), Side::Player2);
        assert_eq!(board.halfmoves(), 1);
    }

    #[test]
    fn elimination_ends_the_game() {
        let board = AtaxxBoard::from_fen("x6/7/7/7/7/7/7 o 0 1").unwrap();

        assert!(board.is_gameover());
        assert_eq!(board.result(), GameResult::Player1Win);
    }

    #[test]
    fn fifty_move_rule_draws() {
        let board = AtaxxBoard::from_fen("x5o/7/7/7/7/7/o5x x 100 1").unwrap();

        assert!(board.is_gameover());
        assert_eq!(board.result(), GameResult::Draw);
    }

    #[test]
    fn full_board_counts_stones() {
        let board = AtaxxBoard::from_fen("xxxxx1o/xxxxxxx/xxxxxxx/xxxxxxx/xxxxxxx/xxxxxxx/xxxxxxx x 0 1")
            .unwrap();

        // one empty square remains, so the game is still on
        assert!(!board.is_gameover());
        assert_eq!(board.result(), GameResult::None);

        let mut board = board;
        board.make_move("f7").unwrap();
        assert!(board.is_gameover());
        assert_eq!(board.result(), GameResult::Player1Win);
    }

    #[test]
    fn legal_move_list_matches_the_position() {
        let board = AtaxxBoard::from_fen("startpos").unwrap();
        let moves = board.legal_moves();

        // each corner pair has 2+2 spawn targets and a handful of jumps
        assert!(moves.contains(&"b7".to_owned()));
        assert!(moves.contains(&"f2".to_owned()));
        assert!(moves.contains(&"a7c5".to_owned()));
        assert!(!moves.contains(&NULL_MOVE.to_owned()));
        for mv in &moves {
            let mut copy = board;
            copy.make_move(mv).unwrap();
        }
    }
}
