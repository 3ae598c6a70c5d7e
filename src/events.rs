//! A thread-safe event queue which funnels match progress to a single consumer.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Condvar, Mutex};
use std::thread::ThreadId;
use std::time::Duration;
use crate::games::{AdjudicationReason, GameRecord, GameResult, Side};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Something that happened during the match. Workers post these; the consumer thread
/// drains them and drives reporting and statistics.
#[derive(Debug)]
pub enum Event {
    /// A worker picked up an assignment and is about to play it.
    GameStarted {
        /// The assignment's game number.
        game_num: usize,
        /// The opening the game starts from.
        fen: String,
        /// Player 1's engine id.
        engine1: usize,
        /// Player 2's engine id.
        engine2: usize,
    },
    /// A game finished (or was adjudicated) and its engines were returned.
    GameFinished {
        /// The assignment's game number.
        game_num: usize,
        /// Player 1's engine id.
        engine1: usize,
        /// Player 2's engine id.
        engine2: usize,
        /// The outcome, from player 1's point of view.
        result: GameResult,
        /// Why the runner decided the game, if play alone didn't.
        reason: Option<AdjudicationReason>,
        /// Which side's engine died, when `reason` is `Crash`.
        crashed: Option<Side>,
        /// The played game, for the record file.
        record: GameRecord,
    },
    /// An engine produced a move.
    MovePlayed {
        /// The move token.
        mv: String,
        /// How long the engine thought.
        elapsed: Duration,
    },
    /// A new engine process was spawned.
    EngineCreated {
        /// The engine's id.
        engine: usize,
        /// The engine's display name.
        name: String,
        /// The engine's executable path.
        path: String,
    },
    /// An engine session was destroyed (evicted from the store or cleared at shutdown).
    EngineDestroyed,
    /// All games are done, or the match was stopped early.
    MatchFinished,
    /// A worker thread ran out of assignments and exited.
    ThreadFinished {
        /// The worker's thread id.
        thread: ThreadId,
    },
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The kind of an [`Event`], used to pick which listeners see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventKind {
    GameStarted,
    GameFinished,
    MovePlayed,
    EngineCreated,
    EngineDestroyed,
    MatchFinished,
    ThreadFinished,
}

impl Event {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GameStarted { .. } => EventKind::GameStarted,
            Event::GameFinished { .. } => EventKind::GameFinished,
            Event::MovePlayed { .. } => EventKind::MovePlayed,
            Event::EngineCreated { .. } => EventKind::EngineCreated,
            Event::EngineDestroyed => EventKind::EngineDestroyed,
            Event::MatchFinished => EventKind::MatchFinished,
            Event::ThreadFinished { .. } => EventKind::ThreadFinished,
        }
    }
}

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A queue of events plus a table of per-kind listeners.
///
/// Any thread may post. Listener registration happens before the match starts and is
/// not concurrent with posting. Delivery is serialised by whichever single thread
/// drains the queue, so listeners never race each other; events of one kind arrive in
/// post order.
pub struct Dispatcher {
    queue: Mutex<VecDeque<Event>>,
    work: Condvar,
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Dispatcher {
        Dispatcher {
            queue: Mutex::new(VecDeque::new()),
            work: Condvar::new(),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a listener for one kind of event.
    pub fn register<F>(&self, kind: EventKind, listener: F)
        where F: Fn(&Event) + Send + Sync + 'static {
        self.listeners.lock().expect("INFALLIBLE")
            .entry(kind)
            .or_insert_with(Vec::new)
            .push(Box::new(listener));
    }

    /// Enqueues an event and wakes one waiter.
    pub fn post(&self, event: Event) {
        self.queue.lock().expect("INFALLIBLE").push_back(event);
        self.work.notify_one();
    }

    /// Synchronously invokes every listener registered for the event's kind.
    pub fn send_one(&self, event: &Event) {
        let listeners = self.listeners.lock().expect("INFALLIBLE");
        if let Some(list) = listeners.get(&event.kind()) {
            for listener in list {
                listener(event);
            }
        }
    }

    /// Pops and delivers queued events until the queue is empty. The queue lock is
    /// not held while listeners run, so listeners may post further events (but must
    /// not drain recursively).
    pub fn drain(&self) {
        loop {
            let event = self.queue.lock().expect("INFALLIBLE").pop_front();
            match event {
                Some(event) => self.send_one(&event),
                None => return,
            }
        }
    }

    /// Blocks until the queue is non-empty.
    pub fn wait(&self) {
        let mut queue = self.queue.lock().expect("INFALLIBLE");
        while queue.is_empty() {
            queue = self.work.wait(queue).expect("INFALLIBLE");
        }
    }

    /// Returns `true` if no events are queued.
    pub fn empty(&self) -> bool {
        self.queue.lock().expect("INFALLIBLE").is_empty()
    }

    /// The number of queued events.
    pub fn size(&self) -> usize {
        self.queue.lock().expect("INFALLIBLE").len()
    }

    /// Discards all queued events.
    pub fn clear(&self) {
        self.queue.lock().expect("INFALLIBLE").clear();
    }
}

impl Default for Dispatcher {
    fn default() -> Dispatcher {
        Dispatcher::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("queued", &self.size()).finish()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use super::*;

    fn counter(dispatcher: &Dispatcher, kind: EventKind) -> Arc<Mutex<usize>> {
        let count = Arc::new(Mutex::new(0));
        let clone = count.clone();
        dispatcher.register(kind, move |_| {
            *clone.lock().unwrap() += 1;
        });
        count
    }

    #[test]
    fn empty_size_clear() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.empty());
        assert_eq!(dispatcher.size(), 0);

        dispatcher.post(Event::MatchFinished);
        assert!(!dispatcher.empty());
        dispatcher.post(Event::MatchFinished);
        dispatcher.post(Event::EngineDestroyed);
        assert_eq!(dispatcher.size(), 3);

        dispatcher.clear();
        assert!(dispatcher.empty());
    }

    #[test]
    fn drain_delivers_everything_queued() {
        let dispatcher = Dispatcher::new();
        let count = counter(&dispatcher, EventKind::MatchFinished);

        dispatcher.post(Event::MatchFinished);
        dispatcher.post(Event::MatchFinished);
        dispatcher.drain();

        assert!(dispatcher.empty());
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn send_one_skips_the_queue() {
        let dispatcher = Dispatcher::new();
        let count = counter(&dispatcher, EventKind::EngineDestroyed);

        dispatcher.send_one(&Event::EngineDestroyed);
        dispatcher.send_one(&Event::EngineDestroyed);

        assert!(dispatcher.empty());
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn listeners_only_hear_their_kind() {
        let dispatcher = Dispatcher::new();
        let finished = counter(&dispatcher, EventKind::MatchFinished);
        let destroyed = counter(&dispatcher, EventKind::EngineDestroyed);

        dispatcher.post(Event::MatchFinished);
        dispatcher.post(Event::EngineDestroyed);
        dispatcher.post(Event::MatchFinished);
        dispatcher.drain();

        assert_eq!(*finished.lock().unwrap(), 2);
        assert_eq!(*destroyed.lock().unwrap(), 1);
    }

    #[test]
    fn every_listener_sees_every_post_in_order() {
        let dispatcher = Dispatcher::new();
        let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));

        for listener in 0..3 {
            let seen = seen.clone();
            dispatcher.register(EventKind::MovePlayed, move |event| {
                if let Event::MovePlayed { elapsed, .. } = event {
                    seen.lock().unwrap().push((listener, elapsed.as_millis() as usize));
                }
            });
        }

        for post in 0..4 {
            dispatcher.post(Event::MovePlayed {
                mv: "0000".to_owned(),
                elapsed: Duration::from_millis(post as u64),
            });
        }
        dispatcher.drain();

        let seen = seen.lock().unwrap();
        // 4 posts x 3 listeners, delivered in post order to each listener in turn
        assert_eq!(seen.len(), 12);
        for post in 0..4 {
            for listener in 0..3 {
                assert_eq!(seen[post * 3 + listener], (listener, post));
            }
        }
    }

    #[test]
    fn listeners_may_post_while_draining() {
        let dispatcher = Arc::new(Dispatcher::new());
        let clone = dispatcher.clone();
        let count = counter(&dispatcher, EventKind::MatchFinished);

        dispatcher.register(EventKind::GameFinished, move |_| {
            clone.post(Event::MatchFinished);
        });

        dispatcher.post(Event::GameFinished {
            game_num: 0,
            engine1: 0,
            engine2: 1,
            result: GameResult::Draw,
            reason: None,
            crashed: None,
            record: GameRecord {
                start_fen: "startpos".to_owned(),
                moves: Vec::new(),
                first_mover: crate::games::Side::Player1,
                move_times: Vec::new(),
            },
        });
        dispatcher.drain();

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(dispatcher.empty());
    }
}
