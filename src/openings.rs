//! Reads the opening book: one starting position per line.
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
use std::io::{self, BufRead, BufReader, Read};
use rand::seq::SliceRandom;
use crate::settings::OpeningsSettings;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Reads opening positions from `reader`. Blank lines and `#` comments are skipped;
/// everything else is taken verbatim as a position token.
pub fn read_openings<R: Read>(reader: R) -> io::Result<Vec<String>> {
    let mut openings = Vec::new();

    for line in BufReader::new(reader).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        openings.push(line.to_owned());
    }

    Ok(openings)
}

/// Loads the opening book named by the settings, shuffling it if asked to.
///
/// # Errors
///
/// Fails if the file can't be read or contains no positions.
pub fn load(settings: &OpeningsSettings) -> Result<Vec<String>, Error> {
    let file = File::open(&settings.path)
        .map_err(|err| Error::Io(settings.path.clone(), err))?;
    let mut openings = read_openings(file)
        .map_err(|err| Error::Io(settings.path.clone(), err))?;

    if openings.is_empty() {
        return Err(Error::Empty(settings.path.clone()));
    }
    if settings.shuffle {
        openings.shuffle(&mut rand::thread_rng());
    }

    Ok(openings)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A failure to produce an opening book.
#[derive(Debug)]
pub enum Error {
    /// The book could not be read.
    Io(String, io::Error),
    /// The book contains no positions.
    Empty(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(path, err) => write!(f, "{}: {}", path, err),
            Error::Empty(path) => write!(f, "{}: no opening positions found", path),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(_, err) => Some(err),
            Error::Empty(_) => None,
        }
    }
}
