// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Periodic callbacks driving the playback position poll.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

pub type Tick = Arc<dyn Fn() + Send + Sync>;

/// Invokes a callback at a fixed interval until stopped.
///
/// Starting a ticker that is already running replaces its callback.
pub trait Ticker: Send {
    fn start(&mut self, interval: Duration, tick: Tick);

    fn stop(&mut self);
}

/// A ticker backed by a sleeping thread.
///
/// Each `start` spawns a new thread tagged with a generation number; bumping
/// the generation makes older threads exit at their next wake-up without
/// having to be joined.
#[derive(Default)]
pub struct ThreadTicker {
    generation: Arc<AtomicU64>,
}

impl ThreadTicker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ticker for ThreadTicker {
    fn start(&mut self, interval: Duration, tick: Tick) {
        let generation = Arc::clone(&self.generation);
        let mine = generation.fetch_add(1, Ordering::AcqRel) + 1;

        thread::spawn(move || {
            loop {
                thread::sleep(interval);
                if generation.load(Ordering::Acquire) != mine {
                    break;
                }
                tick();
            }
        });
    }

    fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
