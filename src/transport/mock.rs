//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{CalError, CalResult};

use super::Transport;

/// Transport that replays a canned script of response lines.
///
/// Tests queue device output with [`push_line`](Self::push_line) or
/// [`push_lines`](Self::push_lines) and inspect everything the session
/// wrote with [`sent`](Self::sent). Reading past the end of the script
/// behaves like a dead device: the read times out.
#[derive(Debug, Default)]
pub struct MockTransport {
    reads: VecDeque<String>,
    writes: Vec<String>,
}

impl MockTransport {
    /// Empty transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response line.
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.reads.push_back(line.into());
    }

    /// Queue several response lines in order.
    pub fn push_lines(&mut self, lines: &[&str]) {
        for line in lines {
            self.push_line(*line);
        }
    }

    /// Every command sent so far, in order.
    pub fn sent(&self) -> &[String] {
        &self.writes
    }

    /// Scripted lines not yet consumed.
    pub fn remaining(&self) -> usize {
        self.reads.len()
    }
}

impl Transport for MockTransport {
    fn send_command(&mut self, command: &str) -> CalResult<()> {
        self.writes.push(command.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> CalResult<String> {
        self.reads
            .pop_front()
            .ok_or(CalError::Timeout(Duration::ZERO))
    }
}
