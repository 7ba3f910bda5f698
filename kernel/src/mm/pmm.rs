//! Physical frame allocator.
//!
//! A flat bitmap covers the first 16 MiB of physical memory in 4 KiB
//! frames. A rotating hint remembers where the last allocation happened:
//! allocation scans from the hint to the end of the bitmap, and freeing a
//! frame below the hint pulls the hint back so the frame is found again
//! immediately. Nothing is reserved up front; the initial state is all
//! frames free.

use spin::Mutex;

use crate::error::{KernelError, KernelResult};

/// Size of a physical frame (4 KiB).
pub const FRAME_SIZE: usize = 4096;

/// Extent of managed physical memory (16 MiB).
pub const MANAGED_BYTES: usize = 16 * 1024 * 1024;

/// Number of frames the bitmap tracks.
pub const MAX_FRAMES: usize = MANAGED_BYTES / FRAME_SIZE;

/// Physical frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameNumber(u32);

impl FrameNumber {
    pub const fn new(num: u32) -> Self {
        Self(num)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Physical byte address of the frame's first byte.
    pub const fn as_addr(&self) -> u32 {
        self.0 * FRAME_SIZE as u32
    }
}

/// Bitmap allocator state: one bit per frame, set = in use.
pub struct FrameBitmap {
    bits: [u8; MAX_FRAMES / 8],
    last_frame: u32,
}

impl FrameBitmap {
    pub const fn new() -> Self {
        Self {
            bits: [0; MAX_FRAMES / 8],
            last_frame: 0,
        }
    }

    fn is_set(&self, frame: u32) -> bool {
        self.bits[(frame / 8) as usize] & (1 << (frame % 8)) != 0
    }

    fn set(&mut self, frame: u32) {
        self.bits[(frame / 8) as usize] |= 1 << (frame % 8);
    }

    fn clear(&mut self, frame: u32) {
        self.bits[(frame / 8) as usize] &= !(1 << (frame % 8));
    }

    /// Claim the first free frame at or after the hint.
    ///
    /// The scan deliberately does not wrap: frames below the hint only
    /// become reachable again when a free pulls the hint back.
    pub fn alloc_frame(&mut self) -> KernelResult<FrameNumber> {
        for frame in self.last_frame..MAX_FRAMES as u32 {
            if !self.is_set(frame) {
                self.set(frame);
                self.last_frame = frame + 1;
                return Ok(FrameNumber::new(frame));
            }
        }
        Err(KernelError::Full {
            resource: "frame bitmap",
        })
    }

    /// Release a frame and retreat the hint if the frame lies below it.
    pub fn free_frame(&mut self, frame: FrameNumber) {
        let num = frame.as_u32();
        if num as usize >= MAX_FRAMES {
            return;
        }
        self.clear(num);
        if num < self.last_frame {
            self.last_frame = num;
        }
    }

    pub fn is_allocated(&self, frame: FrameNumber) -> bool {
        (frame.as_u32() as usize) < MAX_FRAMES && self.is_set(frame.as_u32())
    }

    /// Number of frames currently free.
    pub fn free_frames(&self) -> usize {
        let used: u32 = self.bits.iter().map(|byte| byte.count_ones()).sum();
        MAX_FRAMES - used as usize
    }
}

impl Default for FrameBitmap {
    fn default() -> Self {
        Self::new()
    }
}

static FRAMES: Mutex<FrameBitmap> = Mutex::new(FrameBitmap::new());

/// Reset the bitmap to all-free. Called once during boot.
pub fn init() {
    *FRAMES.lock() = FrameBitmap::new();
    log::info!("pmm: {} frames over {} MiB", MAX_FRAMES, MANAGED_BYTES >> 20);
}

/// Claim a frame from the global bitmap.
pub fn alloc_frame() -> KernelResult<FrameNumber> {
    FRAMES.lock().alloc_frame()
}

/// Release a frame to the global bitmap.
pub fn free_frame(frame: FrameNumber) {
    FRAMES.lock().free_frame(frame);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_returns_distinct_frames() {
        let mut bitmap = FrameBitmap::new();
        let a = bitmap.alloc_frame().unwrap();
        let b = bitmap.alloc_frame().unwrap();
        let c = bitmap.alloc_frame().unwrap();
        assert_eq!(a.as_u32(), 0);
        assert_eq!(b.as_u32(), 1);
        assert_eq!(c.as_u32(), 2);
        assert!(bitmap.is_allocated(a));
    }

    #[test]
    fn test_free_retreats_hint() {
        let mut bitmap = FrameBitmap::new();
        for _ in 0..10 {
            bitmap.alloc_frame().unwrap();
        }
        let freed = FrameNumber::new(4);
        bitmap.free_frame(freed);
        // The hint moved back, so the freed frame is the next one handed out.
        assert_eq!(bitmap.alloc_frame().unwrap(), freed);
    }

    #[test]
    fn test_alloc_then_free_then_alloc_is_stable() {
        let mut bitmap = FrameBitmap::new();
        let frame = bitmap.alloc_frame().unwrap();
        bitmap.free_frame(frame);
        assert_eq!(bitmap.alloc_frame().unwrap(), frame);
    }

    #[test]
    fn test_exhaustion_reports_full() {
        let mut bitmap = FrameBitmap::new();
        for _ in 0..MAX_FRAMES {
            bitmap.alloc_frame().unwrap();
        }
        assert_eq!(
            bitmap.alloc_frame(),
            Err(KernelError::Full {
                resource: "frame bitmap"
            })
        );
        assert_eq!(bitmap.free_frames(), 0);
    }

    #[test]
    fn test_frame_address() {
        assert_eq!(FrameNumber::new(0).as_addr(), 0);
        assert_eq!(FrameNumber::new(3).as_addr(), 0x3000);
    }
}
