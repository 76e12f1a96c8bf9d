//! Newline-delimited record framing over an unstructured byte feed
//!
//! Network reads split and coalesce records arbitrarily. Framing works on
//! raw bytes so a multi-byte UTF-8 sequence cut by a read boundary is
//! reassembled before anything is decoded (`\n` never occurs inside one).

use thiserror::Error;

/// Longest partial record held back while waiting for its newline
pub const MAX_RECORD_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stream record exceeds {limit} bytes without a newline")]
pub struct RecordTooLong {
    pub limit: usize,
}

/// Splits a byte feed into complete records, carrying partial ones over
#[derive(Debug)]
pub struct RecordFramer {
    carry: Vec<u8>,
    limit: usize,
}

impl Default for RecordFramer {
    fn default() -> Self {
        Self::with_limit(MAX_RECORD_LEN)
    }
}

impl RecordFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            carry: Vec::new(),
            limit,
        }
    }

    /// Feed one network read, returning every record it completed
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, RecordTooLong> {
        let mut records = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (line, tail) = rest.split_at(pos);
            rest = &tail[1..];

            let line = if self.carry.is_empty() {
                line.to_vec()
            } else {
                self.carry.extend_from_slice(line);
                std::mem::take(&mut self.carry)
            };
            records.extend(clean_record(line));
        }

        if self.carry.len() + rest.len() > self.limit {
            self.carry.clear();
            return Err(RecordTooLong { limit: self.limit });
        }
        self.carry.extend_from_slice(rest);
        Ok(records)
    }

    /// End of stream: a final record may lack its terminating newline
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        clean_record(std::mem::take(&mut self.carry))
    }

    /// Bytes held back waiting for the rest of a record
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

/// Strip a trailing `\r`; blank lines are not records
fn clean_record(mut line: Vec<u8>) -> Option<Vec<u8>> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(line)
}
