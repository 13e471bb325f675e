// This code is provided under the MIT license.

//! Mock transport for driver unit tests.
//!
//! Records every write transaction, hands out queued payloads on
//! `request_from` and advances a fake microsecond clock by one tick per
//! observation, which makes the HMC read deadline deterministic.

use super::bus::MagBus;
use core::convert::Infallible;
use std::collections::VecDeque;
use std::vec::Vec;

/// One logged write transaction: address plus payload.
pub type WriteLog = (u8, Vec<u8>);

pub struct MockBus {
    /// every write transaction, in order
    pub writes: Vec<WriteLog>,
    /// payloads handed out on `request_from`, one per request
    pub responses: VecDeque<Vec<u8>>,
    /// when set, requested bytes never become available
    pub starve: bool,
    /// every `delay_ms` call, in order
    pub delays: Vec<u32>,
    buffered: VecDeque<u8>,
    now_us: u32,
}

impl MockBus {
    pub fn new() -> Self {
        MockBus {
            writes: Vec::new(),
            responses: VecDeque::new(),
            starve: false,
            delays: Vec::new(),
            buffered: VecDeque::new(),
            now_us: 0,
        }
    }

    pub fn push_response(&mut self, payload: &[u8]) {
        self.responses.push_back(payload.to_vec());
    }

    /// Fake clock reading after the last observation.
    pub fn elapsed_us(&self) -> u32 {
        self.now_us
    }
}

impl MagBus for MockBus {
    type Error = Infallible;

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.writes.push((addr, bytes.to_vec()));
        Ok(())
    }

    fn request_from(&mut self, _addr: u8, count: usize, _stop: bool) -> Result<(), Self::Error> {
        if self.starve {
            return Ok(());
        }
        if let Some(payload) = self.responses.pop_front() {
            self.buffered.extend(payload.into_iter().take(count));
        }
        Ok(())
    }

    fn available(&mut self) -> usize {
        self.buffered.len()
    }

    fn read_byte(&mut self) -> u8 {
        self.buffered.pop_front().unwrap_or(0)
    }

    fn micros(&mut self) -> u32 {
        self.now_us += 1;
        self.now_us
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}
