//! Wald's sequential probability ratio test over game results, used to stop a match
//! as soon as the data decides between two Elo hypotheses.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Win, draw and loss probabilities for a given Elo difference under the draw-Elo model.
fn elo_to_probability(elo: f64, drawelo: f64) -> (f64, f64, f64) {
    let pwin = 1.0 / (1.0 + 10f64.powf((-elo + drawelo) / 400.0));
    let ploss = 1.0 / (1.0 + 10f64.powf((elo + drawelo) / 400.0));
    let pdraw = 1.0 - pwin - ploss;

    (pwin, pdraw, ploss)
}

/// The Elo difference and draw-Elo implied by observed probabilities.
fn probability_to_elo(pwin: f64, ploss: f64) -> (f64, f64) {
    let elo = 200.0 * (pwin / ploss * (1.0 - ploss) / (1.0 - pwin)).log10();
    let drawelo = 200.0 * ((1.0 - ploss) / ploss * (1.0 - pwin) / pwin).log10();

    (elo, drawelo)
}

/// The log-likelihood ratio of the hypotheses `Elo = elo1` against `Elo = elo0`,
/// given the observed win/loss/draw counts. Counts are clamped to at least one so a
/// young match never divides by zero.
pub fn get_llr(wins: u64, losses: u64, draws: u64, elo0: f64, elo1: f64) -> f64 {
    let wins = wins.max(1) as f64;
    let losses = losses.max(1) as f64;
    let draws = draws.max(1) as f64;
    let total = wins + losses + draws;

    let (_, drawelo) = probability_to_elo(wins / total, losses / total);

    let (p0win, p0draw, p0loss) = elo_to_probability(elo0, drawelo);
    let (p1win, p1draw, p1loss) = elo_to_probability(elo1, drawelo);

    wins * (p1win / p0win).ln() + losses * (p1loss / p0loss).ln() + draws * (p1draw / p0draw).ln()
}

/// The lower decision bound: at or below it, H0 is accepted.
pub fn get_lbound(alpha: f64, beta: f64) -> f64 {
    (beta / (1.0 - alpha)).ln()
}

/// The upper decision bound: at or above it, H1 is accepted.
pub fn get_ubound(alpha: f64, beta: f64) -> f64 {
    ((1.0 - beta) / alpha).ln()
}

/// Whether the match can stop early: the log-likelihood ratio has left the
/// continue-region between the two bounds.
pub fn should_stop(
    wins: u64,
    losses: u64,
    draws: u64,
    elo0: f64,
    elo1: f64,
    alpha: f64,
    beta: f64,
) -> bool {
    let llr = get_llr(wins, losses, draws, elo0, elo1);

    llr <= get_lbound(alpha, beta) || llr >= get_ubound(alpha, beta)
}
