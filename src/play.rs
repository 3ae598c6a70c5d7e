//! Drives a single game between two engines from its opening to its adjudication.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::time::{Duration, Instant};
use log::warn;
use crate::engine::{Engine, SearchSettings};
use crate::events::{Dispatcher, Event};
use crate::games::{AdjudicationReason, Game, GameRecord, GameResult, Side};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Which engines are asked whether the game is over after each position update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryGameover {
    /// Only the engine about to move.
    ToMove,
    /// Both engines, every ply.
    Both,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Knobs for engines whose protocol behaviour needs hand-holding.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolSettings {
    /// Re-query the side to move every ply instead of assuming strict alternation.
    pub ask_turn: bool,
    /// Who is asked about the end of the game during play.
    pub gameover: QueryGameover,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Limits the runner imposes on top of the game rules.
#[derive(Debug, Clone, Copy)]
pub struct AdjudicationSettings {
    /// Slack added to `movetime` overrun checks, to absorb measurement jitter.
    pub timeout_buffer_ms: i64,
    /// Adjudicate once this many full moves have been played. Zero disables the limit.
    pub max_full_moves: usize,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A finished game: what was played, and how it was decided.
#[derive(Debug)]
pub struct PlayedGame {
    /// The opening, moves, first mover and per-move times.
    pub record: GameRecord,
    /// The outcome from player 1's point of view.
    pub result: GameResult,
    /// Why the runner decided the game, if play alone didn't.
    pub reason: Option<AdjudicationReason>,
    /// The side whose engine died, when `reason` is `Crash`.
    pub crashed: Option<Side>,
}

/// How the play loop ended.
enum LoopExit {
    OutOfTime,
    GameoverClaimed,
    MoveLimit,
    BadMove,
}

/// An engine I/O failure, attributed to the side it happened on.
struct Crashed(Side);

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Plays one game to completion and adjudicates it.
///
/// The two engines must have completed their handshakes. Protocol failures never
/// propagate: a dead engine loses the game as `Crash` and is reported through
/// [`PlayedGame::crashed`] so the caller knows not to reuse its session. The search
/// settings are copied; under a `Time` control the copy tracks both clocks as the
/// game goes on.
pub fn play_game(
    game: &mut dyn Game,
    engine1: &mut dyn Engine,
    engine2: &mut dyn Engine,
    timecontrol: &SearchSettings,
    adjudication: &AdjudicationSettings,
    protocol: &ProtocolSettings,
    dispatcher: &Dispatcher,
) -> PlayedGame {
    let mut tc = *timecontrol;
    let mut move_times = Vec::new();

    let outcome = drive(
        game,
        engine1,
        engine2,
        &mut tc,
        adjudication,
        protocol,
        dispatcher,
        &mut move_times,
    );

    let (result, reason, crashed) = match outcome {
        Ok(LoopExit::OutOfTime) => {
            // the clocks stop the moment `go` returns, so the flag falls on the side to move
            let result = match game.turn() {
                Side::Player1 => GameResult::Player2Win,
                Side::Player2 => GameResult::Player1Win,
            };
            (result, Some(AdjudicationReason::Timeout), None)
        },
        Ok(LoopExit::GameoverClaimed) => match confirm_gameover(game, engine1, engine2) {
            Ok(outcome) => outcome,
            Err(Crashed(side)) => (GameResult::None, Some(AdjudicationReason::Crash), Some(side)),
        },
        Ok(LoopExit::MoveLimit) => (GameResult::None, Some(AdjudicationReason::Gamelength), None),
        Ok(LoopExit::BadMove) => (GameResult::None, None, None),
        Err(Crashed(side)) => (GameResult::None, Some(AdjudicationReason::Crash), Some(side)),
    };

    PlayedGame {
        record: GameRecord {
            start_fen: game.start_fen().to_owned(),
            moves: game.moves().to_vec(),
            first_mover: game.first_mover(),
            move_times,
        },
        result,
        reason,
        crashed,
    }
}

/// The init/ready/step loop. Returns how the loop ended, or which engine died.
#[allow(clippy::too_many_arguments)]
fn drive<'a>(
    game: &mut dyn Game,
    engine1: &'a mut dyn Engine,
    engine2: &'a mut dyn Engine,
    tc: &mut SearchSettings,
    adjudication: &AdjudicationSettings,
    protocol: &ProtocolSettings,
    dispatcher: &Dispatcher,
    move_times: &mut Vec<Duration>,
) -> Result<LoopExit, Crashed> {
    let p1 = |_| Crashed(Side::Player1);
    let p2 = |_| Crashed(Side::Player2);

    engine1.is_ready().map_err(p1)?;
    engine2.is_ready().map_err(p2)?;
    engine1.new_game().map_err(p1)?;
    engine2.new_game().map_err(p2)?;

    // Find out whose turn it is, and remember who moved first for the record file.
    engine1.position(game.start_fen(), game.moves()).map_err(p1)?;
    let p1_turn = game.is_p1_turn(engine1).map_err(p1)?;
    game.set_turn(if p1_turn { Side::Player1 } else { Side::Player2 });
    game.set_first_mover(game.turn());

    loop {
        if protocol.ask_turn {
            engine1.position(game.start_fen(), game.moves()).map_err(p1)?;
            let p1_turn = game.is_p1_turn(engine1).map_err(p1)?;
            game.set_turn(if p1_turn { Side::Player1 } else { Side::Player2 });
        }

        let side = game.turn();
        let (us, them) = match side {
            Side::Player1 => (&mut *engine1, &mut *engine2),
            Side::Player2 => (&mut *engine2, &mut *engine1),
        };
        let crash_us = |_| Crashed(side);
        let crash_them = |_| Crashed(!side);

        // Inform the engine of the current position, then ask if the game is over.
        us.is_ready().map_err(crash_us)?;
        us.position(game.start_fen(), game.moves()).map_err(crash_us)?;
        if game.is_gameover(us).map_err(crash_us)? {
            return Ok(LoopExit::GameoverClaimed);
        }

        if protocol.gameover == QueryGameover::Both {
            them.is_ready().map_err(crash_them)?;
            them.position(game.start_fen(), game.moves()).map_err(crash_them)?;
            if game.is_gameover(them).map_err(crash_them)? {
                return Ok(LoopExit::GameoverClaimed);
            }
        }

        let t0 = Instant::now();
        let mv = us.go(tc).map_err(crash_us)?;
        let elapsed = t0.elapsed();
        move_times.push(elapsed);
        dispatcher.post(Event::MovePlayed { mv: mv.clone(), elapsed });

        // Charge the elapsed time against the search budget.
        let ms = elapsed.as_millis() as i64;
        match tc {
            SearchSettings::Time { p1time, p2time, p1inc, p2inc } => {
                let (time, inc) = match side {
                    Side::Player1 => (p1time, p1inc),
                    Side::Player2 => (p2time, p2inc),
                };
                *time -= ms;
                if *time <= 0 {
                    return Ok(LoopExit::OutOfTime);
                }
                *time += *inc;
            },
            SearchSettings::MoveTime(limit) => {
                if ms > *limit + adjudication.timeout_buffer_ms {
                    return Ok(LoopExit::OutOfTime);
                }
            },
            SearchSettings::Depth(_) | SearchSettings::Nodes(_) => {},
        }

        if game.make_move(&mv).is_err() {
            warn!("unplayable move '{}' from engine {}", mv, us.id());
            return Ok(LoopExit::BadMove);
        }

        if adjudication.max_full_moves > 0 && game.moves().len() >= 2 * adjudication.max_full_moves {
            return Ok(LoopExit::MoveLimit);
        }
    }
}

/// Both engines are shown the final position and asked for the verdict. They have to
/// agree the game is over, and on who won, before the result counts.
fn confirm_gameover(
    game: &mut dyn Game,
    engine1: &mut dyn Engine,
    engine2: &mut dyn Engine,
) -> Result<(GameResult, Option<AdjudicationReason>, Option<Side>), Crashed> {
    let p1 = |_| Crashed(Side::Player1);
    let p2 = |_| Crashed(Side::Player2);

    engine1.is_ready().map_err(p1)?;
    engine1.position(game.start_fen(), game.moves()).map_err(p1)?;
    let gameover1 = game.is_gameover(engine1).map_err(p1)?;
    let result1 = game.result(engine1).map_err(p1)?;

    engine2.is_ready().map_err(p2)?;
    engine2.position(game.start_fen(), game.moves()).map_err(p2)?;
    let gameover2 = game.is_gameover(engine2).map_err(p2)?;
    let result2 = game.result(engine2).map_err(p2)?;

    Ok(if gameover1 != gameover2 {
        (GameResult::None, Some(AdjudicationReason::GameoverMismatch), None)
    } else if result1 != result2 {
        (GameResult::None, Some(AdjudicationReason::ResultMismatch), None)
    } else {
        (result1, None, None)
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::thread::sleep;
    use crate::engine::{self, NULL_MOVE};
    use crate::games::ataxx::{AtaxxBoard, AtaxxGame};
    use crate::games::GenericGame;
    use super::*;

    /// An in-process ataxx engine which plays the first legal move it finds.
    #[derive(Debug)]
    struct TestEngine {
        id: usize,
        board: AtaxxBoard,
        delay: Duration,
        go_calls: usize,
        claim_gameover: Option<bool>,
        claim_result: Option<GameResult>,
        fail: bool,
    }

    impl TestEngine {
        fn new(id: usize) -> TestEngine {
            TestEngine {
                id,
                board: AtaxxBoard::from_fen("startpos").unwrap(),
                delay: Duration::from_millis(0),
                go_calls: 0,
                claim_gameover: None,
                claim_result: None,
                fail: false,
            }
        }
    }

    impl Engine for TestEngine {
        fn id(&self) -> usize {
            self.id
        }

        fn init(&mut self) -> engine::Result<()> {
            Ok(())
        }

        fn is_ready(&mut self) -> engine::Result<()> {
            if self.fail {
                Err(engine::Error::Crash)
            } else {
                Ok(())
            }
        }

        fn new_game(&mut self) -> engine::Result<()> {
            Ok(())
        }

        fn set_option(&mut self, _: &str, _: &str) -> engine::Result<()> {
            Ok(())
        }

        fn position(&mut self, start_fen: &str, moves: &[String]) -> engine::Result<()> {
            self.board = AtaxxBoard::from_fen(start_fen).expect("bad test fen");
            for mv in moves {
                self.board.make_move(mv).expect("bad test move");
            }
            Ok(())
        }

        fn go(&mut self, _: &SearchSettings) -> engine::Result<String> {
            self.go_calls += 1;
            if self.delay > Duration::from_millis(0) {
                sleep(self.delay);
            }
            Ok(self.board.legal_moves().first().cloned().unwrap_or_else(|| NULL_MOVE.to_owned()))
        }

        fn query_p1_turn(&mut self) -> engine::Result<bool> {
            Ok(self.board.turn() == Side::Player1)
        }

        fn query_gameover(&mut self) -> engine::Result<bool> {
            Ok(self.claim_gameover.unwrap_or_else(|| self.board.is_gameover()))
        }

        fn query_result(&mut self) -> engine::Result<GameResult> {
            Ok(self.claim_result.unwrap_or_else(|| self.board.result()))
        }

        fn quit(&mut self) -> engine::Result<()> {
            Ok(())
        }

        fn is_alive(&mut self) -> bool {
            true
        }
    }

    fn depth_one() -> SearchSettings {
        SearchSettings::Depth(1)
    }

    fn no_adjudication() -> AdjudicationSettings {
        AdjudicationSettings { timeout_buffer_ms: 10, max_full_moves: 0 }
    }

    fn to_move_only() -> ProtocolSettings {
        ProtocolSettings { ask_turn: false, gameover: QueryGameover::ToMove }
    }

    /// Replays a finished game and checks every move was legal and the final position
    /// really is terminal.
    fn final_position(record: &GameRecord) -> AtaxxBoard {
        let mut board = AtaxxBoard::from_fen(&record.start_fen).unwrap();
        for mv in &record.moves {
            assert!(!board.is_gameover());
            assert_eq!(board.result(), GameResult::None);
            board.make_move(mv).unwrap();
        }
        board
    }

    const FENS: &[&str] = &[
        "startpos",
        "x5o/7/7/7/7/7/o5x x 0 1",
        "x5o/7/7/7/7/7/o5x o 0 1",
        "x5o/7/2-1-2/7/2-1-2/7/o5x x 0 1",
        "x5o/7/2-1-2/7/2-1-2/7/o5x o 0 1",
        "x5o/7/2-1-2/3-3/2-1-2/7/o5x x 0 1",
        "x5o/7/3-3/2-1-2/3-3/7/o5x o 0 1",
        "7/7/7/7/ooooooo/ooooooo/xxxxxxx x 0 1",
        "7/7/7/7/xxxxxxx/xxxxxxx/ooooooo o 0 1",
        "7/7/7/2x1o2/7/7/7 x 0 1",
        "7/7/7/2x1o2/7/7/7 o 0 1",
    ];

    #[test]
    fn ataxx_games_end_in_the_position_they_claim() {
        for fen in FENS {
            for order in &[(0, 1), (1, 0)] {
                let mut engine1 = TestEngine::new(order.0);
                let mut engine2 = TestEngine::new(order.1);
                let mut game = AtaxxGame::new(fen).unwrap();
                let dispatcher = Dispatcher::new();

                let played = play_game(
                    &mut game,
                    &mut engine1,
                    &mut engine2,
                    &depth_one(),
                    &no_adjudication(),
                    &to_move_only(),
                    &dispatcher,
                );

                assert_eq!(played.reason, None);
                assert_eq!(played.record.start_fen, *fen);

                let board = final_position(&played.record);
                assert!(board.is_gameover());
                assert_eq!(played.result, board.result());

                // neither engine searched more than one move beyond the other
                let diff = engine1.go_calls as i64 - engine2.go_calls as i64;
                assert!(diff.abs() <= 1);
            }
        }
    }

    #[test]
    fn generic_games_agree_with_the_local_oracle() {
        for fen in FENS {
            let mut engine1 = TestEngine::new(0);
            let mut engine2 = TestEngine::new(1);
            let mut game = GenericGame::new(fen);
            let dispatcher = Dispatcher::new();

            let played = play_game(
                &mut game,
                &mut engine1,
                &mut engine2,
                &depth_one(),
                &no_adjudication(),
                &ProtocolSettings { ask_turn: true, gameover: QueryGameover::Both },
                &dispatcher,
            );

            assert_eq!(played.reason, None);
            let board = final_position(&played.record);
            assert_eq!(played.result, board.result());
        }
    }

    #[test]
    fn winning_position_is_credited_to_player_one() {
        let fen = "xxxxx1o/xxxxxxx/xxxxxxx/xxxxxxx/xxxxxxx/xxxxxxx/xxxxxxx x 0 1";
        for order in &[(0, 1), (1, 0)] {
            let mut engine1 = TestEngine::new(order.0);
            let mut engine2 = TestEngine::new(order.1);
            let mut game = AtaxxGame::new(fen).unwrap();
            let dispatcher = Dispatcher::new();

            let played = play_game(
                &mut game,
                &mut engine1,
                &mut engine2,
                &depth_one(),
                &no_adjudication(),
                &to_move_only(),
                &dispatcher,
            );

            assert_eq!(played.result, GameResult::Player1Win);
            assert_eq!(played.reason, None);
        }
    }

    #[test]
    fn exhausted_halfmove_clock_is_a_draw() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        let mut game = AtaxxGame::new("x5o/7/7/7/7/7/o5x x 100 1").unwrap();
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &depth_one(),
            &no_adjudication(),
            &to_move_only(),
            &dispatcher,
        );

        assert_eq!(played.result, GameResult::Draw);
        assert_eq!(played.reason, None);
        assert!(played.record.moves.is_empty());
    }

    #[test]
    fn movetime_overrun_loses_on_time() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        engine1.delay = Duration::from_millis(50);
        engine2.delay = Duration::from_millis(50);
        let mut game = AtaxxGame::new("startpos").unwrap();
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &SearchSettings::MoveTime(5),
            &AdjudicationSettings { timeout_buffer_ms: 0, max_full_moves: 0 },
            &to_move_only(),
            &dispatcher,
        );

        // player 1 moves first from startpos and flags immediately
        assert_eq!(played.result, GameResult::Player2Win);
        assert_eq!(played.reason, Some(AdjudicationReason::Timeout));
    }

    #[test]
    fn clock_exhaustion_loses_on_time() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        engine1.delay = Duration::from_millis(20);
        engine2.delay = Duration::from_millis(20);
        let mut game = AtaxxGame::new("startpos").unwrap();
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &SearchSettings::Time { p1time: 1, p2time: 10_000, p1inc: 0, p2inc: 0 },
            &no_adjudication(),
            &to_move_only(),
            &dispatcher,
        );

        assert_eq!(played.result, GameResult::Player2Win);
        assert_eq!(played.reason, Some(AdjudicationReason::Timeout));
    }

    #[test]
    fn move_limit_adjudicates_without_a_result() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        let mut game = AtaxxGame::new("startpos").unwrap();
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &depth_one(),
            &AdjudicationSettings { timeout_buffer_ms: 10, max_full_moves: 1 },
            &to_move_only(),
            &dispatcher,
        );

        assert_eq!(played.result, GameResult::None);
        assert_eq!(played.reason, Some(AdjudicationReason::Gamelength));
        assert_eq!(played.record.moves.len(), 2);
    }

    #[test]
    fn dead_engine_forfeits_as_a_crash() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        engine2.fail = true;
        let mut game = AtaxxGame::new("startpos").unwrap();
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &depth_one(),
            &no_adjudication(),
            &to_move_only(),
            &dispatcher,
        );

        assert_eq!(played.result, GameResult::None);
        assert_eq!(played.reason, Some(AdjudicationReason::Crash));
        assert_eq!(played.crashed, Some(Side::Player2));
    }

    #[test]
    fn engines_disagreeing_on_gameover_voids_the_result() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        engine1.claim_gameover = Some(true);
        engine2.claim_gameover = Some(false);
        let mut game = GenericGame::new("startpos");
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &depth_one(),
            &no_adjudication(),
            &to_move_only(),
            &dispatcher,
        );

        assert_eq!(played.result, GameResult::None);
        assert_eq!(played.reason, Some(AdjudicationReason::GameoverMismatch));
    }

    #[test]
    fn engines_disagreeing_on_the_result_voids_it() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        engine1.claim_gameover = Some(true);
        engine2.claim_gameover = Some(true);
        engine1.claim_result = Some(GameResult::Player1Win);
        engine2.claim_result = Some(GameResult::Draw);
        let mut game = GenericGame::new("startpos");
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &depth_one(),
            &no_adjudication(),
            &to_move_only(),
            &dispatcher,
        );

        assert_eq!(played.result, GameResult::None);
        assert_eq!(played.reason, Some(AdjudicationReason::ResultMismatch));
    }

    #[test]
    fn every_move_is_announced() {
        let mut engine1 = TestEngine::new(0);
        let mut engine2 = TestEngine::new(1);
        let mut game = AtaxxGame::new("startpos").unwrap();
        let dispatcher = Dispatcher::new();

        let played = play_game(
            &mut game,
            &mut engine1,
            &mut engine2,
            &depth_one(),
            &no_adjudication(),
            &to_move_only(),
            &dispatcher,
        );

        assert_eq!(dispatcher.size(), played.record.moves.len());
        assert_eq!(played.record.move_times.len(), played.record.moves.len());
    }
}
