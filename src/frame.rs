//! Frame buffer bridge between the engine's paint callback and the host's
//! texture.
//!
//! The engine paints full BGRA frames on its UI thread; the host samples the
//! published RGBA buffer from its render thread. The mutex guarding the
//! backing store is held only for copy+convert (producer) or for the duration
//! of the consumer closure, never across a host render call, to bound the
//! time the engine's UI thread may be blocked.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Host-side texture identifier, unique per process.
pub type TextureId = i64;

static NEXT_TEXTURE_ID: AtomicI64 = AtomicI64::new(1);

/// The most recently published frame, in the host's RGBA channel order.
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// Version marker, incremented on every published frame. Intermediate
    /// frames may be skipped (last-writer-wins); gaps in the generation let a
    /// consumer detect that.
    pub generation: u64,
}

struct Inner {
    texture: Option<TextureId>,
    /// Dimensions the next paint must match. Paints for a superseded size
    /// are discarded instead of written into a wrongly sized store.
    target: (u32, u32),
    frame: FrameBuffer,
}

/// Converts raw engine pixel frames and publishes the latest one.
pub struct FrameBufferBridge {
    inner: Mutex<Inner>,
}

impl FrameBufferBridge {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                texture: None,
                target: (0, 0),
                frame: FrameBuffer {
                    width: 0,
                    height: 0,
                    pixels: Vec::new(),
                    generation: 0,
                },
            }),
        }
    }

    /// Bind a texture and return its id. Calling `attach` again without an
    /// intervening [`detach`](Self::detach) returns the same id.
    pub fn attach(&self) -> TextureId {
        let mut inner = self.inner.lock().unwrap();
        *inner
            .texture
            .get_or_insert_with(|| NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Release the backing store and the texture binding.
    pub fn detach(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.texture = None;
        inner.frame = FrameBuffer {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            generation: inner.frame.generation,
        };
    }

    pub fn texture_id(&self) -> Option<TextureId> {
        self.inner.lock().unwrap().texture
    }

    /// Record the dimensions the next paint must carry. The backing store is
    /// reallocated when that paint arrives.
    pub fn resize(&self, width: u32, height: u32) {
        self.inner.lock().unwrap().target = (width, height);
    }

    /// Convert and publish one engine frame. Returns false when the frame was
    /// dropped: no texture attached, or the frame targets a superseded size.
    pub fn on_frame(&self, raw_bgra: &[u8], width: u32, height: u32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.texture.is_none() {
            return false;
        }
        if (width, height) != inner.target {
            log::debug!(
                "dropping stale {}x{} frame, current target is {}x{}",
                width,
                height,
                inner.target.0,
                inner.target.1
            );
            return false;
        }

        let len = width as usize * height as usize * 4;
        if raw_bgra.len() < len {
            log::warn!("paint buffer shorter than {}x{} frame, dropping", width, height);
            return false;
        }

        if inner.frame.pixels.len() != len {
            inner.frame.pixels.resize(len, 0);
        }
        swap_bgra_to_rgba(&mut inner.frame.pixels, &raw_bgra[..len]);
        inner.frame.width = width;
        inner.frame.height = height;
        inner.frame.generation += 1;
        true
    }

    /// Run `f` against the most recently published frame. The lock is held
    /// only while `f` runs; keep host render calls outside of it. Returns
    /// `None` when detached or before the first paint.
    pub fn with_frame<R>(&self, f: impl FnOnce(&FrameBuffer) -> R) -> Option<R> {
        let inner = self.inner.lock().unwrap();
        if inner.texture.is_none() || inner.frame.pixels.is_empty() {
            return None;
        }
        Some(f(&inner.frame))
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().unwrap().frame.generation
    }
}

impl Default for FrameBufferBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn swap_bgra_to_rgba(dest: &mut [u8], src: &[u8]) {
    for (d, s) in dest.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        d[0] = s[2];
        d[1] = s[1];
        d[2] = s[0];
        d[3] = s[3];
    }
}
