//! Writes finished games to the record file in PGN form.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fs::OpenOptions;
use std::io::{self, Write};
use chrono::Local;
use crate::games::{AdjudicationReason, GameRecord, GameResult, Side};
use crate::settings::PgnSettings;

/// The PGN result token for a game outcome.
pub fn result_string(result: GameResult) -> &'static str {
    match result {
        GameResult::Player1Win => "1-0",
        GameResult::Player2Win => "0-1",
        GameResult::Draw => "1/2-1/2",
        GameResult::None => "*",
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Writes one game as a PGN block: tag pairs, a blank line, then the move text.
///
/// Games whose first mover was player 2 get the conventional `1... ` continuation
/// prefix so the move numbers stay honest. In verbose mode each move is followed by a
/// comment with its thinking time.
pub fn write_game<W: Write>(
    out: &mut W,
    settings: &PgnSettings,
    player1: &str,
    player2: &str,
    result: GameResult,
    reason: Option<AdjudicationReason>,
    record: &GameRecord,
    round: usize,
) -> io::Result<()> {
    writeln!(out, "[Event \"{}\"]", settings.event)?;
    writeln!(out, "[Site \"{}\"]", site())?;
    writeln!(out, "[Date \"{}\"]", Local::today().format("%Y.%m.%d"))?;
    writeln!(out, "[Round \"{}\"]", round)?;
    writeln!(out, "[{} \"{}\"]", settings.colour1, player1)?;
    writeln!(out, "[{} \"{}\"]", settings.colour2, player2)?;
    writeln!(out, "[Result \"{}\"]", result_string(result))?;
    writeln!(out, "[FEN \"{}\"]", record.start_fen)?;
    if let Some(reason) = reason {
        writeln!(out, "[Adjudicated \"{}\"]", reason)?;
    }
    match result {
        GameResult::Player1Win => {
            writeln!(out, "[Winner \"{}\"]", player1)?;
            writeln!(out, "[Loser \"{}\"]", player2)?;
        },
        GameResult::Player2Win => {
            writeln!(out, "[Winner \"{}\"]", player2)?;
            writeln!(out, "[Loser \"{}\"]", player1)?;
        },
        _ => {},
    }
    writeln!(out, "[PlyCount \"{}\"]", record.moves.len())?;
    writeln!(out)?;

    let mut ply = 0;
    if record.first_mover == Side::Player2 {
        write!(out, "1... ")?;
        ply += 1;
    }
    for (index, mv) in record.moves.iter().enumerate() {
        if ply % 2 == 0 {
            write!(out, "{}. ", ply / 2 + 1)?;
        }
        write!(out, "{} ", mv)?;
        if settings.verbose {
            if let Some(elapsed) = record.move_times.get(index) {
                write!(out, "{{{}ms}} ", elapsed.as_millis())?;
            }
        }
        ply += 1;
    }
    writeln!(out, "{}", result_string(result))?;
    writeln!(out)?;
    writeln!(out)
}

/// Appends one game to the record file named by the settings.
pub fn append_game(
    settings: &PgnSettings,
    player1: &str,
    player2: &str,
    result: GameResult,
    reason: Option<AdjudicationReason>,
    record: &GameRecord,
    round: usize,
) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&settings.path)?;

    write_game(&mut file, settings, player1, player2, result, reason, record, round)
}

fn site() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "matchman".to_owned())
}
