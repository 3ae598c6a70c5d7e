//! Owns an engine child process and exchanges lines of text with it.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};
use log::debug;
use super::{Error, Result};

/// A hook invoked with every line sent to or received from the engine. Hooks run on
/// whichever worker thread drives the engine, so they must be thread-safe.
pub type LineHook = Arc<dyn Fn(&str) + Send + Sync>;

/// How long a child is given to exit on its own after its stdin closes.
const REAP_GRACE: Duration = Duration::from_millis(1000);

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A running engine subprocess with piped standard input and output.
///
/// All line I/O goes through the owner; the process is strictly single-consumer and
/// nothing here is synchronised.
pub struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    send_hook: Option<LineHook>,
    recv_hook: Option<LineHook>,
}

impl EngineProcess {
    /// Spawns a new engine process.
    ///
    /// # Errors
    ///
    /// Returns `Error::Launch` if the executable could not be started.
    pub fn spawn(path: &str, args: &[String]) -> Result<EngineProcess> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(Error::Launch)?;

        let stdin = child.stdin.take().expect("INFALLIBLE");
        let stdout = child.stdout.take().expect("INFALLIBLE");

        Ok(EngineProcess {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            send_hook: None,
            recv_hook: None,
        })
    }

    /// Installs hooks which observe every line sent and received.
    pub fn set_hooks(&mut self, send: Option<LineHook>, recv: Option<LineHook>) {
        self.send_hook = send;
        self.recv_hook = recv;
    }

    /// Sends a single line to the engine, appending the terminator and flushing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the pipe is broken.
    pub fn send(&mut self, line: &str) -> Result<()> {
        debug!("<send:{}> {}", self.child.id(), line);
        if let Some(hook) = &self.send_hook {
            hook(line);
        }

        let stdin = self.stdin.as_mut().ok_or(Error::Crash)?;
        writeln!(stdin, "{}", line).map_err(Error::Io)?;
        stdin.flush().map_err(Error::Io)
    }

    /// Reads lines from the engine until one satisfies `pred`, and returns that line.
    /// Every line read, matching or not, is passed to the receive hook.
    ///
    /// # Errors
    ///
    /// Returns `Error::Crash` if the engine exits or closes its output before a
    /// matching line arrives, and `Error::Io` on a read failure.
    pub fn recv_until<F>(&mut self, pred: F) -> Result<String>
        where F: Fn(&str) -> bool {
        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line).map_err(Error::Io)?;
            if n == 0 {
                return Err(Error::Crash);
            }

            let line = line.trim_end();
            debug!("<recv:{}> {}", self.child.id(), line);
            if let Some(hook) = &self.recv_hook {
                hook(line);
            }

            if pred(line) {
                return Ok(line.to_owned());
            }
        }
    }

    /// Returns `true` if the child process has not yet exited.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for EngineProcess {
    /// Closes the child's stdin and reaps it, killing it if it ignores the closed pipe.
    fn drop(&mut self) {
        drop(self.stdin.take());

        let start = Instant::now();
        while start.elapsed() < REAP_GRACE {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(10));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl std::fmt::Debug for EngineProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineProcess").field("pid", &self.child.id()).finish()
    }
}
