//! Scripted in-memory [`SerialLink`] for exercising the drivers without
//! hardware.
//!
//! Every write is recorded and answered by a responder closure. Responses
//! pile up in a pending buffer until the next read drains it, which mirrors
//! how the real devices behave when several commands are written before one
//! read.

use std::collections::VecDeque;

use super::SerialLink;
use crate::error::ChannelError;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

pub struct MockLink {
    name: String,
    open: bool,
    unavailable: bool,
    baud_rate: u32,
    responder: Responder,
    pending: Vec<u8>,
    writes: Vec<Vec<u8>>,
    opens: usize,
    closes: usize,
}

impl MockLink {
    /// A link that accepts everything and never answers.
    pub fn new() -> Self {
        Self::with_responder(|_| Vec::new())
    }

    /// Answer each write with the next scripted response, then with nothing.
    pub fn scripted<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut queue: VecDeque<Vec<u8>> = responses.into_iter().collect();
        Self::with_responder(move |_| queue.pop_front().unwrap_or_default())
    }

    /// Answer each write by calling `responder` with the written bytes.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        Self {
            name: "mock".to_string(),
            open: false,
            unavailable: false,
            baud_rate: 9600,
            responder: Box::new(responder),
            pending: Vec::new(),
            writes: Vec::new(),
            opens: 0,
            closes: 0,
        }
    }

    /// A link whose port can never be opened.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    /// Every buffer written so far, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Written buffers decoded lossily as text, for ASCII protocols.
    pub fn written_lines(&self) -> Vec<String> {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.opens
    }

    pub fn close_count(&self) -> usize {
        self.closes
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for MockLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<(), ChannelError> {
        if self.unavailable {
            return Err(ChannelError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "mock port unavailable",
            )));
        }
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closes += 1;
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::NotOpen(self.name.clone()));
        }
        self.writes.push(bytes.to_vec());
        let response = (self.responder)(bytes);
        self.pending.extend_from_slice(&response);
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, ChannelError> {
        if !self.open {
            return Err(ChannelError::NotOpen(self.name.clone()));
        }
        Ok(std::mem::take(&mut self.pending))
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), ChannelError> {
        self.baud_rate = baud_rate;
        Ok(())
    }
}
