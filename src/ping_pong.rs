//! Double-buffered particle storage.
//!
//! Two buffers of identical capacity alternate between the *read* role (stable
//! input for the frame) and the *write* role (sole mutation target for the
//! frame). The only way to reach the write buffer during a frame is
//! [`PingPong::split`], which hands out the read buffer shared and the write
//! buffer exclusive, so the two can never both be mutable at once.

/// A pair of buffers with a single front index.
#[derive(Debug)]
pub struct PingPong<T> {
    buffers: [T; 2],
    front: usize,
}

impl<T> PingPong<T> {
    /// `first` starts as the front (read) buffer.
    pub fn new(first: T, second: T) -> Self {
        Self {
            buffers: [first, second],
            front: 0,
        }
    }

    /// Index (0 or 1) of the front buffer.
    #[inline]
    pub fn front_index(&self) -> usize {
        self.front
    }

    /// The read buffer of the next frame, which is also the most recently
    /// written one.
    #[inline]
    pub fn front(&self) -> &T {
        &self.buffers[self.front]
    }

    /// Mutable front buffer, for seeding state between frames.
    #[inline]
    pub fn front_mut(&mut self) -> &mut T {
        &mut self.buffers[self.front]
    }

    /// The write buffer of the next frame.
    #[inline]
    pub fn back(&self) -> &T {
        &self.buffers[1 - self.front]
    }

    /// `(read, write)` for the current frame.
    pub fn split(&mut self) -> (&T, &mut T) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.front == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Mutable write buffer, once the read buffer is no longer needed.
    #[inline]
    pub fn back_mut(&mut self) -> &mut T {
        &mut self.buffers[1 - self.front]
    }

    /// Both buffers by index, read-only.
    pub fn buffers(&self) -> &[T; 2] {
        &self.buffers
    }

    /// Flip roles. Called exactly once per completed frame.
    #[inline]
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_alternates() {
        let mut pp = PingPong::new("a", "b");
        assert_eq!(*pp.front(), "a");
        assert_eq!(*pp.back(), "b");

        pp.swap();
        assert_eq!(pp.front_index(), 1);
        assert_eq!(*pp.front(), "b");
        assert_eq!(*pp.back(), "a");

        pp.swap();
        assert_eq!(*pp.front(), "a");
    }

    #[test]
    fn test_split_writes_back_buffer_only() {
        let mut pp = PingPong::new(vec![1, 2], vec![0, 0]);

        for frame in 0..4 {
            let (read, write) = pp.split();
            for (w, r) in write.iter_mut().zip(read.iter()) {
                *w = r + 1;
            }
            pp.swap();
            assert_eq!(pp.front()[0], 2 + frame);
        }
    }

    #[test]
    fn test_split_buffers_are_distinct() {
        let mut pp = PingPong::new([0u8; 4], [0u8; 4]);
        for _ in 0..3 {
            let (read, write) = pp.split();
            assert!(!std::ptr::eq(read, write));
            pp.swap();
        }
    }
}
