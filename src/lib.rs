//! A library for running tournaments between game engines which speak a
//! line-oriented text protocol (UGI and its UAI/UCI dialects).
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
#![warn(missing_docs, missing_debug_implementations, unused_extern_crates)]
#![warn(clippy::unimplemented, clippy::todo)]

use std::sync::Mutex;
use lazy_static::lazy_static;

pub mod engine;
pub mod events;
pub mod games;
pub mod openings;
pub mod pgn;
pub mod play;
pub mod run;
pub mod settings;
pub mod sprt;
pub mod stats;
pub mod tournament;

lazy_static! {
    /// Guards `stdout` so that report lines from concurrent workers don't interleave.
    pub static ref PRINT_MUTEX: Mutex<()> = Mutex::new(());
}
