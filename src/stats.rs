//! Result bookkeeping and the Elo arithmetic behind the score reports.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::f64::consts::PI;
use crate::engine::EngineSpec;
use crate::settings::SprtSettings;
use crate::{sprt, PRINT_MUTEX};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Per-engine tallies, updated by the consumer thread as games finish.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    /// Games this engine took part in.
    pub played: u64,
    /// Games won.
    pub wins: u64,
    /// Games lost.
    pub losses: u64,
    /// Games drawn.
    pub draws: u64,
    /// Games lost to an engine crash.
    pub crashes: u64,
    /// Games lost on time.
    pub timeouts: u64,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Whole-match tallies.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchStats {
    /// How many games the schedule will produce.
    pub games_total: u64,
    /// How many games have finished.
    pub games_finished: u64,
    /// Games won by player 1.
    pub p1_wins: u64,
    /// Games won by player 2.
    pub p2_wins: u64,
    /// Drawn games.
    pub draws: u64,
    /// Engine processes spawned.
    pub engine_loads: u64,
    /// Engine sessions destroyed.
    pub engine_unloads: u64,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The score fraction `(2W + D) / 2(W + L + D)`.
pub fn get_score(wins: u64, losses: u64, draws: u64) -> f64 {
    (2 * wins + draws) as f64 / (2 * (wins + losses + draws)) as f64
}

/// The logistic Elo difference implied by a score fraction. Infinite at 0 and 1.
fn elo_from_score(score: f64) -> f64 {
    -400.0 * (1.0 / score - 1.0).log10()
}

/// The Elo difference implied by the observed counts.
pub fn get_elo(wins: u64, losses: u64, draws: u64) -> f64 {
    elo_from_score(get_score(wins, losses, draws))
}

/// The 95% confidence margin on [`get_elo`], from the variance of the win/draw/loss
/// trial.
pub fn get_err(wins: u64, losses: u64, draws: u64) -> f64 {
    let total = (wins + losses + draws) as f64;
    let w = wins as f64 / total;
    let l = losses as f64 / total;
    let d = draws as f64 / total;

    let mu = w + d / 2.0;
    let devw = w * (1.0 - mu) * (1.0 - mu);
    let devl = l * mu * mu;
    let devd = d * (0.5 - mu) * (0.5 - mu);
    let stdev = (devw + devl + devd).sqrt() / total.sqrt();

    let mu_min = mu + phi_inv(0.025) * stdev;
    let mu_max = mu + phi_inv(0.975) * stdev;

    (elo_from_score(mu_max) - elo_from_score(mu_min)) / 2.0
}

/// The inverse normal CDF.
fn phi_inv(p: f64) -> f64 {
    2f64.sqrt() * erf_inv(2.0 * p - 1.0)
}

/// Winitzki's approximation of the inverse error function. The score reports have
/// always been quoted with this approximation, so it stays even though it only
/// carries a few digits.
fn erf_inv(x: f64) -> f64 {
    let a = 8.0 * (PI - 3.0) / (3.0 * PI * (4.0 - PI));
    let y = (1.0 - x * x).ln();
    let z = 2.0 / (PI * a) + y / 2.0;

    let ret = ((z * z - y / a).sqrt() - z).sqrt();
    if x < 0.0 {
        -ret
    } else {
        ret
    }
}

/// Whether the score report is due: every game early on, then every `frequency`
/// finishes.
pub fn should_update(finished: u64, frequency: u64) -> bool {
    finished % frequency == 0 || finished < frequency
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Prints the running score. Head-to-head matches get a scoreline with Elo and, when
/// SPRT is running, the current log-likelihood ratio; bigger fields get a table.
pub fn print_results(
    specs: &[EngineSpec],
    engine_stats: &[EngineStats],
    print_elo: bool,
    sprt: &SprtSettings,
) {
    let _guard = PRINT_MUTEX.lock().expect("INFALLIBLE");

    if specs.len() == 2 {
        let wins = engine_stats[0].wins;
        let losses = engine_stats[0].losses;
        let draws = engine_stats[0].draws;

        println!(
            "Score of {} vs {}: {} - {} - {} [{:.3}] {}",
            specs[0].name,
            specs[1].name,
            wins,
            losses,
            draws,
            get_score(wins, losses, draws),
            engine_stats[0].played,
        );
        if print_elo {
            println!("{:.2} +/- {:.2}", get_elo(wins, losses, draws), get_err(wins, losses, draws));
            if sprt.enabled {
                println!(
                    "LLR: {:.2} [{:.2}, {:.2}] (elo0: {:.2}, elo1: {:.2})",
                    sprt::get_llr(wins, losses, draws, sprt.elo0, sprt.elo1),
                    sprt::get_lbound(sprt.alpha, sprt.beta),
                    sprt::get_ubound(sprt.alpha, sprt.beta),
                    sprt.elo0,
                    sprt.elo1,
                );
            }
            println!();
        }
    } else {
        println!("Name  Wins  Losses  Draws");
        for (spec, stats) in specs.iter().zip(engine_stats) {
            println!("{}  {}  {}  {}", spec.name, stats.wins, stats.losses, stats.draws);
        }
        println!();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    fn round2(x: f64) -> f64 {
        (x * 100.0).round() / 100.0
    }

    #[test]
    fn elo_from_observed_counts() {
        let table = [
            (10, 10, 10, 0.0),
            (20, 10, 10, 88.74),
            (10, 20, 10, -88.74),
            (10, 10, 20, 0.0),
            (0, 10, 10, -190.85),
            (10, 0, 10, 190.85),
            (10, 10, 0, 0.0),
            (300, 100, 100, 147.19),
            (100, 300, 100, -147.19),
            (100, 100, 300, 0.0),
        ];

        for &(wins, losses, draws, expected) in &table {
            assert_eq!(round2(get_elo(wins, losses, draws)), expected);
        }
    }

    #[test]
    fn error_margin_from_observed_counts() {
        let table = [
            (10, 10, 10, 104.40),
            (20, 10, 10, 98.10),
            (10, 20, 10, 98.10),
            (10, 10, 20, 77.27),
            (0, 10, 10, 107.05),
            (10, 0, 10, 107.05),
            (10, 10, 0, 163.05),
            (300, 100, 100, 29.06),
            (100, 300, 100, 29.06),
            (100, 100, 300, 19.25),
        ];

        for &(wins, losses, draws, expected) in &table {
            assert_eq!(round2(get_err(wins, losses, draws)), expected);
        }
    }

    #[test]
    fn elo_is_infinite_at_the_boundaries() {
        assert!(get_elo(10, 0, 0).is_infinite());
        assert!(get_elo(10, 0, 0) > 0.0);
        assert!(get_elo(0, 10, 0).is_infinite());
        assert!(get_elo(0, 10, 0) < 0.0);
    }

    #[test]
    fn update_cadence() {
        // every game until the interval is reached, then on multiples only
        assert!(should_update(1, 10));
        assert!(should_update(9, 10));
        assert!(should_update(10, 10));
        assert!(!should_update(11, 10));
        assert!(should_update(20, 10));
    }
}
