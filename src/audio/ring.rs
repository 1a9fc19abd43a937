//! Fixed-capacity PCM ring buffer (spec §4.1).
//!
//! Thread-safety is enforced externally by a single mutex guarding both the
//! input and output rings and the preamble generator -- see [`crate::audio::AudioMutex`].
//! `add_data` fails silently (dropping the tail of `samples`) if there isn't
//! enough free space; the audio pipeline treats this as dropped samples
//! (`RingOverflow`, logged by the caller at most once a second).

pub struct RingBuffer {
    buf: Vec<i16>,
    capacity: usize,
    head: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            buf: vec![0i16; capacity],
            capacity,
            head: 0,
            len: 0,
        }
    }

    pub fn data_size(&self) -> usize {
        self.len
    }

    pub fn free_space(&self) -> usize {
        self.capacity - self.len
    }

    /// Appends up to `free_space()` samples; extra samples beyond capacity
    /// are silently dropped. Returns the number of samples actually written.
    pub fn add_data(&mut self, samples: &[i16]) -> usize {
        let n = samples.len().min(self.free_space());
        let tail = (self.head + self.len) % self.capacity;
        for (i, &s) in samples.iter().take(n).enumerate() {
            self.buf[(tail + i) % self.capacity] = s;
        }
        self.len += n;
        n
    }

    /// Pops up to `out.len()` samples into `out`, zero-filling any remainder.
    /// Returns the number of real samples copied.
    pub fn get(&mut self, out: &mut [i16]) -> usize {
        let n = out.len().min(self.len);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = if i < n {
                self.buf[(self.head + i) % self.capacity]
            } else {
                0
            };
        }
        self.head = (self.head + n) % self.capacity;
        self.len -= n;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_get_round_trips() {
        let mut ring = RingBuffer::new(320);
        let samples: Vec<i16> = (0..160).collect();
        assert_eq!(ring.add_data(&samples), 160);
        assert_eq!(ring.data_size(), 160);
        let mut out = vec![0i16; 160];
        assert_eq!(ring.get(&mut out), 160);
        assert_eq!(out, samples);
        assert_eq!(ring.data_size(), 0);
    }

    #[test]
    fn overflow_drops_tail_silently() {
        let mut ring = RingBuffer::new(4);
        let samples = [1i16, 2, 3, 4, 5, 6];
        let written = ring.add_data(&samples);
        assert_eq!(written, 4);
        assert_eq!(ring.free_space(), 0);
    }

    #[test]
    fn get_zero_fills_when_underrun() {
        let mut ring = RingBuffer::new(8);
        ring.add_data(&[9, 9]);
        let mut out = [7i16; 4];
        let copied = ring.get(&mut out);
        assert_eq!(copied, 2);
        assert_eq!(out, [9, 9, 0, 0]);
    }

    #[test]
    fn wraps_around_capacity() {
        let mut ring = RingBuffer::new(4);
        ring.add_data(&[1, 2, 3]);
        let mut out = [0i16; 2];
        ring.get(&mut out);
        assert_eq!(out, [1, 2]);
        ring.add_data(&[4, 5]);
        let mut out2 = [0i16; 3];
        assert_eq!(ring.get(&mut out2), 3);
        assert_eq!(out2, [3, 4, 5]);
    }
}
