//! Generates the stream of game assignments for a tournament.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The shape of the tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentKind {
    /// Every engine plays every other engine.
    RoundRobin,
    /// The first engine plays every other engine.
    Gauntlet,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One game to be played: who plays whom, from which opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Monotonically increasing game number, starting at 0.
    pub game_num: usize,
    /// Index into the opening book.
    pub opening: usize,
    /// The engine playing as player 1.
    pub engine1: usize,
    /// The engine playing as player 2.
    pub engine2: usize,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A lazy, restartable stream of [`Assignment`]s.
///
/// Each matchup gets `games` games. With `repeat` on, colours alternate between
/// consecutive games and the opening index advances once per colour-reversed pair, so
/// both games of a pair share an opening; without it, every game keeps the same
/// colours and takes the next opening. Opening indices cycle modulo the book size and
/// restart for each matchup.
#[derive(Debug, Clone)]
pub struct Schedule {
    games: usize,
    openings: usize,
    repeat: bool,
    pairs: Vec<(usize, usize)>,
    pair_index: usize,
    game_in_pair: usize,
    game_num: usize,
}

impl Schedule {
    /// Creates the schedule for `engines` engines and `openings` book entries.
    pub fn new(
        kind: TournamentKind,
        engines: usize,
        games: usize,
        openings: usize,
        repeat: bool,
    ) -> Schedule {
        let pairs = match kind {
            TournamentKind::RoundRobin => {
                let mut pairs = Vec::new();
                for i in 0..engines {
                    for j in i + 1..engines {
                        pairs.push((i, j));
                    }
                }
                pairs
            },
            TournamentKind::Gauntlet => (1..engines).map(|j| (0, j)).collect(),
        };

        Schedule {
            games,
            openings: openings.max(1),
            repeat,
            pairs,
            pair_index: 0,
            game_in_pair: 0,
            game_num: 0,
        }
    }

    /// The total number of assignments the stream will yield.
    pub fn expected(&self) -> usize {
        self.pairs.len() * self.games
    }

    /// Returns `true` once every assignment has been yielded.
    pub fn is_finished(&self) -> bool {
        self.pair_index >= self.pairs.len() || self.games == 0
    }

    /// Yields the next assignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] once the stream is finished.
    pub fn next(&mut self) -> Result<Assignment, Error> {
        if self.is_finished() {
            return Err(Error::Exhausted);
        }

        let (i, j) = self.pairs[self.pair_index];
        let game = self.game_in_pair;
        let (engine1, engine2) = if self.repeat && game % 2 == 1 { (j, i) } else { (i, j) };
        let opening = if self.repeat { game / 2 } else { game } % self.openings;

        let assignment = Assignment {
            game_num: self.game_num,
            opening,
            engine1,
            engine2,
        };

        self.game_num += 1;
        self.game_in_pair += 1;
        if self.game_in_pair == self.games {
            self.game_in_pair = 0;
            self.pair_index += 1;
        }

        Ok(assignment)
    }

    /// Rewinds the stream to its beginning.
    pub fn reset(&mut self) {
        self.pair_index = 0;
        self.game_in_pair = 0;
        self.game_num = 0;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An error from the assignment stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Every assignment has been yielded.
    Exhausted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Exhausted => "the tournament schedule is exhausted".fmt(f),
        }
    }
}

impl std::error::Error for Error { }
