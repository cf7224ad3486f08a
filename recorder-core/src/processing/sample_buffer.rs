/// Reusable fixed-capacity buffer of 16-bit samples.
///
/// Owned by the capture loop. Each read refills it in place and records how
/// many samples are valid; callers only ever see the valid prefix.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<i16>,
    len: usize,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity.max(1)],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Refill the buffer. `read` receives the whole backing storage and
    /// returns how many samples it wrote.
    pub fn fill<E>(&mut self, read: impl FnOnce(&mut [i16]) -> Result<usize, E>) -> Result<usize, E> {
        self.len = 0;
        let n = read(&mut self.samples)?;
        self.len = n.min(self.samples.len());
        Ok(self.len)
    }

    pub fn valid_mut(&mut self) -> &mut [i16] {
        &mut self.samples[..self.len]
    }

    pub fn valid(&self) -> &[i16] {
        &self.samples[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_tracks_valid_length() {
        let mut buf = SampleBuffer::with_capacity(8);
        let n = buf
            .fill(|out| {
                out[..3].copy_from_slice(&[1, 2, 3]);
                Ok::<_, ()>(3)
            })
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(buf.valid(), &[1, 2, 3]);
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn failed_fill_leaves_buffer_empty() {
        let mut buf = SampleBuffer::with_capacity(4);
        buf.fill(|_| Ok::<_, ()>(4)).unwrap();
        assert_eq!(buf.len(), 4);

        assert!(buf.fill(|_| Err::<usize, _>("boom")).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn over_reported_length_is_capped() {
        let mut buf = SampleBuffer::with_capacity(2);
        assert_eq!(buf.fill(|_| Ok::<_, ()>(10)).unwrap(), 2);
    }
}
