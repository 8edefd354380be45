//! Frame picker strategies
//!
//! A `FramePicker` consumes byte chunks incrementally and decides where a
//! frame ends. Sockets feed every chunk they receive into the picker of the
//! current read operation; whatever the picker does not consume belongs to
//! the next frame and stays buffered in the socket.
//!
//! | Picker                   | Frame ends                               |
//! |--------------------------|------------------------------------------|
//! | `RawFramePicker`         | after the first non-empty chunk          |
//! | `FixedLengthFramePicker` | after exactly N bytes                    |
//! | `MarkerFramePicker`      | after the end marker (start optional)    |
//! | `EmptyFramePicker`       | immediately, without consuming anything  |

use crate::frame::DataFrame;

/// Incremental frame assembly strategy
pub trait FramePicker {
    /// Feed a chunk and return how many of its bytes were consumed.
    ///
    /// Bytes past the returned count were not used and must be offered to
    /// the next frame. Once `is_eof()` is true the picker consumes nothing.
    fn push_data(&mut self, chunk: &[u8], remote_address: Option<&str>) -> usize;

    /// Whether the frame is complete
    fn is_eof(&self) -> bool;

    /// Bytes collected for the current frame
    fn buffered(&self) -> usize;

    /// Take the collected frame and reset the picker
    fn create_frame(&mut self) -> DataFrame;
}

/// Frame is whatever arrives first
#[derive(Debug, Default)]
pub struct RawFramePicker {
    data: Vec<u8>,
    remote: Option<String>,
    eof: bool,
}

impl RawFramePicker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FramePicker for RawFramePicker {
    fn push_data(&mut self, chunk: &[u8], remote_address: Option<&str>) -> usize {
        if self.eof || chunk.is_empty() {
            return 0;
        }
        self.data.extend_from_slice(chunk);
        self.remote = remote_address.map(str::to_owned);
        self.eof = true;
        chunk.len()
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn buffered(&self) -> usize {
        self.data.len()
    }

    fn create_frame(&mut self) -> DataFrame {
        self.eof = false;
        DataFrame::new(std::mem::take(&mut self.data), self.remote.take())
    }
}

/// Frame of exactly `length` bytes
#[derive(Debug)]
pub struct FixedLengthFramePicker {
    length: usize,
    data: Vec<u8>,
    remote: Option<String>,
}

impl FixedLengthFramePicker {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            data: Vec::with_capacity(length.min(64 * 1024)),
            remote: None,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl FramePicker for FixedLengthFramePicker {
    fn push_data(&mut self, chunk: &[u8], remote_address: Option<&str>) -> usize {
        let take = (self.length - self.data.len()).min(chunk.len());
        if take > 0 {
            self.data.extend_from_slice(&chunk[..take]);
            self.remote = remote_address.map(str::to_owned);
        }
        take
    }

    fn is_eof(&self) -> bool {
        self.data.len() == self.length
    }

    fn buffered(&self) -> usize {
        self.data.len()
    }

    fn create_frame(&mut self) -> DataFrame {
        DataFrame::new(std::mem::take(&mut self.data), self.remote.take())
    }
}

/// Frame delimited by markers
///
/// Without a start marker the frame starts at the first byte. Bytes before
/// a start marker are consumed and discarded. The frame includes both
/// markers.
#[derive(Debug)]
pub struct MarkerFramePicker {
    start: Option<Vec<u8>>,
    end: Vec<u8>,
    case_insensitive: bool,
    buffer: Vec<u8>,
    started: bool,
    /// Offset from which the end marker search resumes
    scan_from: usize,
    eof: bool,
    remote: Option<String>,
}

impl MarkerFramePicker {
    /// Frame running from the first byte through `end`
    pub fn until(end: impl Into<Vec<u8>>) -> Self {
        Self::new(None, end)
    }

    pub fn new(start: Option<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.filter(|s| !s.is_empty()),
            end: end.into(),
            case_insensitive: false,
            buffer: Vec::new(),
            started: false,
            scan_from: 0,
            eof: false,
            remote: None,
        }
    }

    /// Match markers ignoring ASCII case
    pub fn case_insensitive(mut self, enable: bool) -> Self {
        self.case_insensitive = enable;
        self
    }

    fn find(&self, haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
        if needle.is_empty() {
            return Some(from.min(haystack.len()));
        }
        if haystack.len() < needle.len() || from > haystack.len() - needle.len() {
            return None;
        }
        (from..=haystack.len() - needle.len()).find(|&i| {
            let window = &haystack[i..i + needle.len()];
            if self.case_insensitive {
                window.eq_ignore_ascii_case(needle)
            } else {
                window == needle
            }
        })
    }
}

impl FramePicker for MarkerFramePicker {
    fn push_data(&mut self, chunk: &[u8], remote_address: Option<&str>) -> usize {
        if self.eof || chunk.is_empty() {
            return 0;
        }
        self.remote = remote_address.map(str::to_owned);
        self.buffer.extend_from_slice(chunk);

        if !self.started {
            match self.start.clone() {
                None => {
                    self.started = true;
                    self.scan_from = 0;
                }
                Some(start) => match self.find(&self.buffer, &start, 0) {
                    Some(pos) => {
                        self.buffer.drain(..pos);
                        self.started = true;
                        self.scan_from = start.len();
                    }
                    None => {
                        // keep a tail long enough to hold a split marker
                        let keep = (start.len() - 1).min(self.buffer.len());
                        let cut = self.buffer.len() - keep;
                        self.buffer.drain(..cut);
                        return chunk.len();
                    }
                },
            }
        }

        match self.find(&self.buffer, &self.end, self.scan_from) {
            Some(pos) => {
                let frame_end = pos + self.end.len();
                let leftover = self.buffer.len() - frame_end;
                self.buffer.truncate(frame_end);
                self.eof = true;
                chunk.len() - leftover
            }
            None => {
                let min_start = self.start.as_ref().map_or(0, Vec::len);
                self.scan_from = (self.buffer.len() + 1)
                    .saturating_sub(self.end.len())
                    .max(min_start);
                chunk.len()
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn buffered(&self) -> usize {
        if self.started {
            self.buffer.len()
        } else {
            0
        }
    }

    fn create_frame(&mut self) -> DataFrame {
        let data = if self.started {
            std::mem::take(&mut self.buffer)
        } else {
            self.buffer.clear();
            Vec::new()
        };
        self.started = false;
        self.scan_from = 0;
        self.eof = false;
        DataFrame::new(data, self.remote.take())
    }
}

/// Frame that completes immediately with no data
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyFramePicker;

impl FramePicker for EmptyFramePicker {
    fn push_data(&mut self, _chunk: &[u8], _remote_address: Option<&str>) -> usize {
        0
    }

    fn is_eof(&self) -> bool {
        true
    }

    fn buffered(&self) -> usize {
        0
    }

    fn create_frame(&mut self) -> DataFrame {
        DataFrame::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_takes_first_chunk() {
        let mut p = RawFramePicker::new();
        assert!(!p.is_eof());
        assert_eq!(p.push_data(b"abc", Some("1.2.3.4:5")), 3);
        assert!(p.is_eof());
        assert_eq!(p.push_data(b"def", None), 0);

        let frame = p.create_frame();
        assert_eq!(frame.data(), b"abc");
        assert_eq!(frame.remote_address(), Some("1.2.3.4:5"));
        assert!(!p.is_eof());
    }

    #[test]
    fn test_fixed_length_across_chunks() {
        let mut p = FixedLengthFramePicker::new(5);
        assert_eq!(p.push_data(b"ab", None), 2);
        assert!(!p.is_eof());
        assert_eq!(p.push_data(b"cdefg", None), 3);
        assert!(p.is_eof());
        assert_eq!(p.create_frame().data(), b"abcde");
    }

    #[test]
    fn test_fixed_length_zero_is_eof() {
        let p = FixedLengthFramePicker::new(0);
        assert!(p.is_eof());
    }

    #[test]
    fn test_marker_end_only_returns_leftover() {
        let mut p = MarkerFramePicker::until(b"\r\n\r\n".to_vec());
        assert_eq!(p.push_data(b"HTTP/1.1 200 OK\r\n", None), 17);
        assert!(!p.is_eof());
        // marker split across chunks, body bytes left over
        assert_eq!(p.push_data(b"\r\nbody", None), 2);
        assert!(p.is_eof());
        assert_eq!(p.create_frame().data(), b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn test_marker_start_discards_prefix() {
        let mut p = MarkerFramePicker::new(Some(b"<".to_vec()), b">".to_vec());
        assert_eq!(p.push_data(b"noise", None), 5);
        assert_eq!(p.buffered(), 0);
        assert_eq!(p.push_data(b"xx<tag>rest", None), 7);
        assert!(p.is_eof());
        assert_eq!(p.create_frame().data(), b"<tag>");
    }

    #[test]
    fn test_marker_start_split_across_chunks() {
        let mut p = MarkerFramePicker::new(Some(b"BEGIN".to_vec()), b"END".to_vec());
        assert_eq!(p.push_data(b"junkBEG", None), 7);
        assert_eq!(p.push_data(b"IN-data-END", None), 11);
        assert!(p.is_eof());
        assert_eq!(p.create_frame().data(), b"BEGIN-data-END");
    }

    #[test]
    fn test_marker_start_and_end_overlap_not_matched() {
        // the end marker must not be found inside the start marker itself
        let mut p = MarkerFramePicker::new(Some(b"ab".to_vec()), b"b".to_vec());
        assert_eq!(p.push_data(b"ab", None), 2);
        assert!(!p.is_eof());
        assert_eq!(p.push_data(b"cb", None), 2);
        assert_eq!(p.create_frame().data(), b"abcb");
    }

    #[test]
    fn test_marker_case_insensitive() {
        let mut p = MarkerFramePicker::until(b"END".to_vec()).case_insensitive(true);
        p.push_data(b"data end", None);
        assert!(p.is_eof());
        assert_eq!(p.create_frame().data(), b"data end");
    }

    #[test]
    fn test_empty_picker() {
        let mut p = EmptyFramePicker;
        assert!(p.is_eof());
        assert_eq!(p.push_data(b"abc", None), 0);
        assert!(p.create_frame().is_empty());
    }
}
