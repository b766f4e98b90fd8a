/// Keeps the tail of a byte stream large enough to yield its last `max_chars` characters.
///
/// A UTF-8 character is at most 4 bytes, so `4 * max_chars + 3` trailing bytes always contain the last
/// `max_chars` complete characters plus at most one partial character in front of them.
#[derive(Debug)]
pub(crate) struct TailBuffer {
    bytes: Vec<u8>,
    keep: usize,
    max_chars: usize,
}

impl TailBuffer {
    pub(crate) fn new(max_chars: usize) -> Self {
        let keep = if max_chars == 0 {
            0
        } else {
            max_chars.saturating_mul(4).saturating_add(3)
        };
        Self {
            bytes: Vec::with_capacity(keep.min(64 * 1024)),
            keep,
            max_chars,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        if self.keep == 0 {
            return;
        }
        if chunk.len() >= self.keep {
            self.bytes.clear();
            self.bytes
                .extend_from_slice(&chunk[chunk.len() - self.keep..]);
            return;
        }
        self.bytes.extend_from_slice(chunk);
        // compact lazily to keep pushes amortised O(chunk)
        if self.bytes.len() > self.keep * 2 {
            let excess = self.bytes.len() - self.keep;
            self.bytes.drain(..excess);
        }
    }

    /// Decode (invalid sequences become U+FFFD) and return the last `max_chars` characters.
    pub(crate) fn into_string(self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        let count = text.chars().count();
        if count <= self.max_chars {
            return text.into_owned();
        }
        text.chars().skip(count - self.max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tail_of(s: &str, n: usize) -> String {
        let count = s.chars().count();
        s.chars().skip(count.saturating_sub(n)).collect()
    }

    #[test]
    fn short_output_is_kept_whole() {
        let mut buf = TailBuffer::new(100);
        buf.push(b"hello ");
        buf.push(b"world");
        assert_eq!(buf.into_string(), "hello world");
    }

    #[test]
    fn keeps_exactly_the_last_n_characters() {
        let line: String = (0..5000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let mut buf = TailBuffer::new(1000);
        for chunk in line.as_bytes().chunks(4096) {
            buf.push(chunk);
        }
        let out = buf.into_string();
        assert_eq!(out.chars().count(), 1000);
        assert_eq!(out, tail_of(&line, 1000));
    }

    #[test]
    fn multibyte_split_across_chunks() {
        let text = "ä€😀".repeat(400);
        let mut buf = TailBuffer::new(50);
        for chunk in text.as_bytes().chunks(7) {
            buf.push(chunk);
        }
        assert_eq!(buf.into_string(), tail_of(&text, 50));
    }

    #[test]
    fn zero_capture_yields_empty() {
        let mut buf = TailBuffer::new(0);
        buf.push(b"anything");
        assert_eq!(buf.into_string(), "");
    }

    #[test]
    fn oversized_chunk_is_cut_to_tail() {
        let mut buf = TailBuffer::new(2);
        buf.push(b"0123456789abcdef");
        assert_eq!(buf.into_string(), "ef");
    }
}
