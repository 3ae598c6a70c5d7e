//! Runs a whole match: workers playing games in parallel, a consumer thread turning
//! events into statistics, reports and record-file entries.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, error, info};
use crate::engine::{Engine, EngineSession, EngineSpec, Store};
use crate::events::{Dispatcher, Event, EventKind};
use crate::games::{self, AdjudicationReason, GameRecord, GameResult, Side};
use crate::openings;
use crate::pgn;
use crate::play;
use crate::settings::MatchSettings;
use crate::stats::{self, EngineStats, MatchStats};
use crate::tournament::{Assignment, Schedule};
use crate::{sprt, PRINT_MUTEX};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Plays the configured match to completion. Returns once every game has finished (or
/// the match was stopped early) and all engines have been torn down.
pub fn run_match(settings: MatchSettings) -> Result<(), Error> {
    let openings = openings::load(&settings.openings)?;

    if settings.pgn.enabled && settings.pgn.overwrite {
        File::create(&settings.pgn.path)?;
    }

    let schedule = Schedule::new(
        settings.tournament,
        settings.engines.len(),
        settings.num_games,
        openings.len(),
        settings.openings.repeat,
    );
    let games_total = schedule.expected();

    {
        let _guard = PRINT_MUTEX.lock().expect("INFALLIBLE");
        settings.print();
        println!();
        settings.print_engines();
        println!();
        println!("Opening positions: {}", openings.len());
        println!();
    }

    let settings = Arc::new(settings);
    let openings = Arc::new(openings);
    let dispatcher = Arc::new(Dispatcher::new());
    let store = Arc::new(Store::new(settings.store_size));
    let schedule = Arc::new(Mutex::new(schedule));
    let quit = Arc::new(AtomicBool::new(false));

    let match_stats = Arc::new(Mutex::new(MatchStats {
        games_total: games_total as u64,
        ..MatchStats::default()
    }));
    let engine_stats = Arc::new(Mutex::new(vec![EngineStats::default(); settings.engines.len()]));

    register_listeners(
        &settings,
        &dispatcher,
        &store,
        &quit,
        &match_stats,
        &engine_stats,
    );

    let start = Instant::now();

    let mut workers = Vec::new();
    for index in 0..settings.num_threads {
        let settings = settings.clone();
        let openings = openings.clone();
        let dispatcher = dispatcher.clone();
        let store = store.clone();
        let schedule = schedule.clone();
        let quit = quit.clone();

        let handle = thread::Builder::new()
            .name(format!("worker-{}", index))
            .spawn(move || {
                loop {
                    if quit.load(Ordering::Relaxed) {
                        break;
                    }
                    let assignment = match schedule.lock().expect("INFALLIBLE").next() {
                        Ok(assignment) => assignment,
                        Err(_) => break,
                    };
                    play_one(&assignment, &settings, &openings, &dispatcher, &store);
                }
                dispatcher.post(Event::ThreadFinished { thread: thread::current().id() });
            })?;
        workers.push(handle);
    }

    // The main thread is the event consumer.
    while !quit.load(Ordering::Relaxed) {
        dispatcher.wait();
        dispatcher.drain();
    }

    for handle in workers {
        if handle.join().is_err() {
            error!("a worker thread panicked");
        }
    }
    dispatcher.drain();

    print_summary(&match_stats.lock().expect("INFALLIBLE"), start.elapsed());
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Wires the reporting side together. Every listener runs on the consumer thread, so
/// the shared tallies only ever see serialised updates.
fn register_listeners(
    settings: &Arc<MatchSettings>,
    dispatcher: &Arc<Dispatcher>,
    store: &Arc<Store<EngineSession>>,
    quit: &Arc<AtomicBool>,
    match_stats: &Arc<Mutex<MatchStats>>,
    engine_stats: &Arc<Mutex<Vec<EngineStats>>>,
) {
    {
        let settings = settings.clone();
        dispatcher.register(EventKind::GameStarted, move |event| {
            if let Event::GameStarted { game_num, fen, engine1, engine2 } = event {
                info!(
                    "game {} started: {} vs {} ({})",
                    game_num, settings.engines[*engine1].name, settings.engines[*engine2].name, fen,
                );
            }
        });
    }

    {
        let settings = settings.clone();
        let match_stats = match_stats.clone();
        dispatcher.register(EventKind::EngineCreated, move |event| {
            if let Event::EngineCreated { name, path, .. } = event {
                match_stats.lock().expect("INFALLIBLE").engine_loads += 1;
                info!("engine loaded: {} ({})", name, path);
                if settings.verbose {
                    let _guard = PRINT_MUTEX.lock().expect("INFALLIBLE");
                    println!("Engine loaded: {}", name);
                }
            }
        });
    }

    {
        let match_stats = match_stats.clone();
        dispatcher.register(EventKind::EngineDestroyed, move |_| {
            match_stats.lock().expect("INFALLIBLE").engine_unloads += 1;
            debug!("engine unloaded");
        });
    }

    {
        let settings = settings.clone();
        let dispatcher_inner = dispatcher.clone();
        let match_stats = match_stats.clone();
        let engine_stats = engine_stats.clone();
        dispatcher.register(EventKind::GameFinished, move |event| {
            if let Event::GameFinished { game_num, engine1, engine2, result, reason, crashed, record } =
                event
            {
                on_game_finished(
                    &settings,
                    &dispatcher_inner,
                    &match_stats,
                    &engine_stats,
                    *game_num,
                    *engine1,
                    *engine2,
                    *result,
                    *reason,
                    *crashed,
                    record,
                );
            }
        });
    }

    {
        let store = store.clone();
        let quit = quit.clone();
        let dispatcher_inner = dispatcher.clone();
        dispatcher.register(EventKind::MatchFinished, move |_| {
            quit.store(true, Ordering::Relaxed);
            while !store.empty() {
                store.remove_oldest();
                dispatcher_inner.post(Event::EngineDestroyed);
            }
        });
    }

    dispatcher.register(EventKind::ThreadFinished, |event| {
        if let Event::ThreadFinished { thread } = event {
            debug!("worker {:?} finished", thread);
        }
    });
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The bookkeeping for one finished game: tallies, the record file, the running score
/// report, and the decision to end the match.
#[allow(clippy::too_many_arguments)]
fn on_game_finished(
    settings: &MatchSettings,
    dispatcher: &Dispatcher,
    match_stats: &Mutex<MatchStats>,
    engine_stats: &Mutex<Vec<EngineStats>>,
    game_num: usize,
    engine1: usize,
    engine2: usize,
    result: GameResult,
    reason: Option<AdjudicationReason>,
    crashed: Option<Side>,
    record: &GameRecord,
) {
    let finished;
    let games_total;
    {
        let mut stats = match_stats.lock().expect("INFALLIBLE");
        stats.games_finished += 1;
        match result {
            GameResult::Player1Win => stats.p1_wins += 1,
            GameResult::Player2Win => stats.p2_wins += 1,
            GameResult::Draw => stats.draws += 1,
            GameResult::None => {},
        }
        finished = stats.games_finished;
        games_total = stats.games_total;
    }

    {
        let mut engines = engine_stats.lock().expect("INFALLIBLE");
        engines[engine1].played += 1;
        engines[engine2].played += 1;
        match result {
            GameResult::Player1Win => {
                engines[engine1].wins += 1;
                engines[engine2].losses += 1;
            },
            GameResult::Player2Win => {
                engines[engine1].losses += 1;
                engines[engine2].wins += 1;
            },
            GameResult::Draw => {
                engines[engine1].draws += 1;
                engines[engine2].draws += 1;
            },
            GameResult::None => {},
        }
        match reason {
            Some(AdjudicationReason::Timeout) => {
                let loser = if result == GameResult::Player1Win { engine2 } else { engine1 };
                engines[loser].timeouts += 1;
            },
            Some(AdjudicationReason::Crash) => {
                let loser = match crashed {
                    Some(Side::Player1) | None => engine1,
                    Some(Side::Player2) => engine2,
                };
                engines[loser].crashes += 1;
            },
            _ => {},
        }
    }

    if settings.pgn.enabled {
        if let Err(err) = pgn::append_game(
            &settings.pgn,
            &settings.engines[engine1].name,
            &settings.engines[engine2].name,
            result,
            reason,
            record,
            game_num + 1,
        ) {
            error!("could not write {}: {}", settings.pgn.path, err);
        }
    }

    if settings.verbose {
        let _guard = PRINT_MUTEX.lock().expect("INFALLIBLE");
        println!("Finished game {} of {}", finished, games_total);
    }

    if stats::should_update(finished, settings.update_frequency) {
        let engines = engine_stats.lock().expect("INFALLIBLE");
        let print_elo = settings.engines.len() == 2 && finished >= settings.update_frequency;
        stats::print_results(&settings.engines, &engines, print_elo, &settings.sprt);
    }

    // A crash ends the match unless we were told to push on.
    if reason == Some(AdjudicationReason::Crash) && !settings.recover {
        dispatcher.post(Event::MatchFinished);
        return;
    }

    if settings.sprt.enabled && settings.engines.len() == 2 {
        let engines = engine_stats.lock().expect("INFALLIBLE");
        let first = &engines[0];
        if sprt::should_stop(
            first.wins,
            first.losses,
            first.draws,
            settings.sprt.elo0,
            settings.sprt.elo1,
            settings.sprt.alpha,
            settings.sprt.beta,
        ) {
            dispatcher.post(Event::MatchFinished);
            return;
        }
    }

    if finished >= games_total {
        dispatcher.post(Event::MatchFinished);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One worker assignment: fetch engines, play the game, return the survivors, report.
fn play_one(
    assignment: &Assignment,
    settings: &MatchSettings,
    openings: &[String],
    dispatcher: &Dispatcher,
    store: &Store<EngineSession>,
) {
    let fen = &openings[assignment.opening];

    dispatcher.post(Event::GameStarted {
        game_num: assignment.game_num,
        fen: fen.clone(),
        engine1: assignment.engine1,
        engine2: assignment.engine2,
    });

    let spec1 = &settings.engines[assignment.engine1];
    let spec2 = &settings.engines[assignment.engine2];

    let mut session1 = match checkout(spec1, settings, dispatcher, store) {
        Ok(session) => session,
        Err(err) => {
            error!("could not start engine '{}': {}", spec1.name, err);
            report_unplayed(assignment, fen, Some(Side::Player1), dispatcher);
            return;
        },
    };
    let mut session2 = match checkout(spec2, settings, dispatcher, store) {
        Ok(session) => session,
        Err(err) => {
            error!("could not start engine '{}': {}", spec2.name, err);
            if store.release(session1) {
                dispatcher.post(Event::EngineDestroyed);
            }
            report_unplayed(assignment, fen, Some(Side::Player2), dispatcher);
            return;
        },
    };

    let mut game = match games::new_game(settings.game, fen) {
        Ok(game) => game,
        Err(err) => {
            error!("opening {} is unusable: {}", assignment.opening, err);
            for session in vec![session1, session2] {
                if store.release(session) {
                    dispatcher.post(Event::EngineDestroyed);
                }
            }
            report_unplayed(assignment, fen, None, dispatcher);
            return;
        },
    };

    let played = play::play_game(
        game.as_mut(),
        &mut session1,
        &mut session2,
        &settings.timecontrol,
        &settings.adjudication,
        &settings.protocol,
        dispatcher,
    );

    // A crashed session is dropped rather than cached; its partner goes back.
    for (session, side) in vec![(session1, Side::Player1), (session2, Side::Player2)] {
        if played.crashed == Some(side) {
            drop(session);
            dispatcher.post(Event::EngineDestroyed);
        } else if store.release(session) {
            dispatcher.post(Event::EngineDestroyed);
        }
    }

    dispatcher.post(Event::GameFinished {
        game_num: assignment.game_num,
        engine1: assignment.engine1,
        engine2: assignment.engine2,
        result: played.result,
        reason: played.reason,
        crashed: played.crashed,
        record: played.record,
    });
}

/// Takes a warm session for this engine out of the store, or spawns a fresh one and
/// walks it through its handshake and options.
fn checkout(
    spec: &EngineSpec,
    settings: &MatchSettings,
    dispatcher: &Dispatcher,
    store: &Store<EngineSession>,
) -> crate::engine::Result<EngineSession> {
    if let Some(session) = store.get(|session| session.id() == spec.id) {
        return Ok(session);
    }

    dispatcher.post(Event::EngineCreated {
        engine: spec.id,
        name: spec.name.clone(),
        path: spec.path.clone(),
    });

    let mut session = EngineSession::spawn(spec, settings.debug)?;
    session.init()?;
    for (name, value) in &spec.options {
        session.set_option(name, value)?;
    }

    Ok(session)
}

/// Reports a game that never got off the ground. A failed engine launch counts as a
/// crash forfeit; anything else goes down with no result and no reason.
fn report_unplayed(
    assignment: &Assignment,
    fen: &str,
    crashed: Option<Side>,
    dispatcher: &Dispatcher,
) {
    dispatcher.post(Event::GameFinished {
        game_num: assignment.game_num,
        engine1: assignment.engine1,
        engine2: assignment.engine2,
        result: GameResult::None,
        reason: crashed.map(|_| AdjudicationReason::Crash),
        crashed,
        record: GameRecord {
            start_fen: fen.to_owned(),
            moves: Vec::new(),
            first_mover: Side::Player1,
            move_times: Vec::new(),
        },
    });
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The closing report: totals, the elapsed wall clock, and the throughput.
fn print_summary(stats: &MatchStats, elapsed: Duration) {
    let _guard = PRINT_MUTEX.lock().expect("INFALLIBLE");

    println!();
    println!("Statistics:");
    println!("Engines loaded: {}", stats.engine_loads);
    println!("Engines unloaded: {}", stats.engine_unloads);
    println!("Games finished: {}", stats.games_finished);
    println!(
        "Player 1 Score: +{}-{}={}",
        stats.p1_wins, stats.p2_wins, stats.draws,
    );

    let secs = elapsed.as_secs();
    print!("Time taken:");
    if secs >= 3600 {
        print!(" {}h", secs / 3600);
    }
    println!(" {}m {}s", (secs % 3600) / 60, secs % 60);

    let ms = elapsed.as_millis() as u64;
    if ms > 0 && stats.games_finished > 0 {
        let games_per_ms = stats.games_finished as f64 / ms as f64;
        println!("Games/min: {:.2}", games_per_ms * 60_000.0);
        println!("Games/sec: {:.2}", games_per_ms * 1_000.0);
        println!("ms/game: {}", ms / stats.games_finished);
    }

    if stats.games_finished != stats.games_total {
        println!();
        println!("[WARN] Game count might be wrong?");
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A failure that stops the match from starting.
#[derive(Debug)]
pub enum Error {
    /// The opening book couldn't be loaded.
    Openings(openings::Error),
    /// Setting up files or threads failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Openings(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Openings(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<openings::Error> for Error {
    fn from(err: openings::Error) -> Error {
        Error::Openings(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
