/// Sliding buffer that cuts an unbounded sample stream into 50%-overlapping windows.
///
/// After every drain pass the buffer holds fewer than `window` samples.
///
/// # Example
/// ```
/// use bc_audio::window::WindowAssembler;
/// let mut asm = WindowAssembler::new(4);
/// asm.append(&[1.0, 2.0, 3.0, 4.0]);
/// assert_eq!(asm.drain(), vec![vec![1.0, 2.0, 3.0, 4.0]]);
/// assert_eq!(asm.buffered(), &[3.0, 4.0]);
/// ```
pub struct WindowAssembler {
    window: usize,
    overlap: usize,
    buffer: Vec<f32>,
}

impl WindowAssembler {
    /// Create an assembler emitting windows of `window` samples, hopping by `window / 2`.
    ///
    /// # Panics
    /// Panics if `window < 2` (the hop would be zero).
    #[must_use]
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "window must be >= 2");
        Self {
            window,
            overlap: window / 2,
            buffer: Vec::with_capacity(window + window / 2),
        }
    }

    /// Append `chunk` to the tail of the buffer.
    pub fn append(&mut self, chunk: &[f32]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Call `f` on every complete window, oldest first, then drop the consumed hop.
    ///
    /// Returns how many windows were emitted.
    pub fn for_each_window(&mut self, mut f: impl FnMut(&[f32])) -> usize {
        let mut emitted = 0;
        while self.buffer.len() >= self.window {
            f(&self.buffer[..self.window]);
            self.buffer.drain(..self.overlap);
            emitted += 1;
        }
        emitted
    }

    /// Extract every complete window as an owned vector.
    pub fn drain(&mut self) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        self.for_each_window(|w| out.push(w.to_vec()));
        out
    }

    /// Samples not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> &[f32] {
        &self.buffer
    }

    /// Window length in samples.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Hop length in samples.
    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toy_scale_overlap() {
        let mut asm = WindowAssembler::new(4);
        assert_eq!(asm.overlap(), 2);

        asm.append(&[1.0, 2.0]);
        assert!(asm.drain().is_empty());
        assert_eq!(asm.buffered(), &[1.0, 2.0]);

        asm.append(&[3.0, 4.0]);
        assert_eq!(asm.drain(), vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(asm.buffered(), &[3.0, 4.0]);

        asm.append(&[5.0, 6.0]);
        assert_eq!(asm.drain(), vec![vec![3.0, 4.0, 5.0, 6.0]]);
        assert_eq!(asm.buffered(), &[5.0, 6.0]);
    }

    #[test]
    fn one_large_append_yields_several_windows_in_order() {
        let mut asm = WindowAssembler::new(4);
        let samples: Vec<f32> = (1..=9).map(|i| i as f32).collect();
        asm.append(&samples);
        let windows = asm.drain();
        assert_eq!(
            windows,
            vec![
                vec![1.0, 2.0, 3.0, 4.0],
                vec![3.0, 4.0, 5.0, 6.0],
                vec![5.0, 6.0, 7.0, 8.0],
            ]
        );
        assert_eq!(asm.buffered(), &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn buffer_stays_shorter_than_window() {
        let mut asm = WindowAssembler::new(6);
        for len in [1usize, 5, 2, 11, 3, 0, 7] {
            asm.append(&vec![0.5; len]);
            asm.for_each_window(|w| assert_eq!(w.len(), 6));
            assert!(asm.buffered().len() < asm.window());
        }
    }

    #[test]
    fn odd_window_hops_by_floor_half() {
        let mut asm = WindowAssembler::new(5);
        asm.append(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let windows = asm.drain();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1], vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(asm.buffered(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn no_sample_is_lost_or_duplicated_between_hops() {
        let mut asm = WindowAssembler::new(8);
        let mut heads = Vec::new();
        for chunk in (0..40).collect::<Vec<i32>>().chunks(4) {
            let chunk: Vec<f32> = chunk.iter().map(|&i| i as f32).collect();
            asm.append(&chunk);
            asm.for_each_window(|w| heads.push(w[0]));
        }
        // Each window starts exactly one hop after the previous one.
        let expected: Vec<f32> = (0..heads.len()).map(|i| (i * 4) as f32).collect();
        assert_eq!(heads, expected);
    }
}
