//! Glyph atlas — CPU-side coverage atlas for rasterized glyphs.
//!
//! Uses a row-based "shelf" packing algorithm. Each shelf has a fixed
//! height determined by the tallest glyph placed on it; when a glyph
//! doesn't fit the current shelf, a new shelf is started below.
//!
//! Storage is a single coverage channel (1 byte per pixel), uploaded to
//! the GPU as an R8 texture. Placements are addressed in texel space
//! and the atlas only ever grows in place (existing placements are
//! never moved), so texel coordinates handed out earlier in a frame
//! stay valid across growth.

use log::debug;

/// Default atlas edge length in pixels.
pub const INITIAL_ATLAS_SIZE: u32 = 256;

/// Growth cap; beyond this, new glyphs are rejected.
pub const MAX_ATLAS_SIZE: u32 = 4096;

/// Texel-space rectangle within the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Shelf (row) in the atlas.
struct Shelf {
    /// Y offset of this shelf.
    y: u32,
    /// Height of this shelf (tallest glyph placed on it, plus padding).
    height: u32,
    /// Next free X position.
    cursor_x: u32,
}

/// CPU-side glyph coverage atlas.
pub struct Atlas {
    /// Edge length in pixels (always square).
    size: u32,
    /// Coverage data, `size * size` bytes, row-major.
    data: Vec<u8>,
    /// Bumped on every blit or growth; lets a GPU context detect that
    /// its texture copy is stale.
    version: u64,
    shelves: Vec<Shelf>,
    /// Padding between glyphs in pixels.
    padding: u32,
}

impl Atlas {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            data: vec![0u8; (size as usize) * (size as usize)],
            version: 0,
            shelves: Vec::new(),
            padding: 1,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Raw coverage pixels, `size() * size()` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Insert a glyph bitmap (1 byte per pixel, row-major), growing the
    /// atlas if needed. Returns `None` only when the glyph cannot fit
    /// even at [`MAX_ATLAS_SIZE`].
    pub fn insert(&mut self, width: u32, height: u32, bitmap: &[u8]) -> Option<AtlasRect> {
        if width == 0 || height == 0 {
            return None;
        }
        loop {
            if let Some(rect) = self.allocate(width, height) {
                self.blit(&rect, bitmap);
                return Some(rect);
            }
            if !self.grow() {
                return None;
            }
        }
    }

    /// Allocate a rect using shelf packing.
    fn allocate(&mut self, width: u32, height: u32) -> Option<AtlasRect> {
        let padded_w = width + self.padding;
        let padded_h = height + self.padding;

        if padded_w > self.size {
            return None;
        }

        // Try existing shelves.
        for shelf in &mut self.shelves {
            if shelf.height >= padded_h && shelf.cursor_x + padded_w <= self.size {
                let rect = AtlasRect {
                    x: shelf.cursor_x,
                    y: shelf.y,
                    width,
                    height,
                };
                shelf.cursor_x += padded_w;
                return Some(rect);
            }
        }

        // Start a new shelf.
        let shelf_y = self.shelves.last().map(|s| s.y + s.height).unwrap_or(0);
        if shelf_y + padded_h > self.size {
            return None;
        }

        self.shelves.push(Shelf {
            y: shelf_y,
            height: padded_h,
            cursor_x: padded_w,
        });

        Some(AtlasRect {
            x: 0,
            y: shelf_y,
            width,
            height,
        })
    }

    /// Double the atlas edge length, preserving every existing
    /// placement at its old texel coordinates. Returns `false` at the
    /// growth cap.
    fn grow(&mut self) -> bool {
        let new_size = self.size * 2;
        if new_size > MAX_ATLAS_SIZE {
            return false;
        }

        let mut new_data = vec![0u8; (new_size as usize) * (new_size as usize)];
        for row in 0..self.size as usize {
            let src = row * self.size as usize;
            let dst = row * new_size as usize;
            new_data[dst..dst + self.size as usize]
                .copy_from_slice(&self.data[src..src + self.size as usize]);
        }

        debug!("glyph atlas grown {}px -> {}px", self.size, new_size);
        self.size = new_size;
        self.data = new_data;
        self.version += 1;
        true
    }

    fn blit(&mut self, rect: &AtlasRect, bitmap: &[u8]) {
        let w = rect.width as usize;
        for row in 0..rect.height as usize {
            let src = row * w;
            let dst = (rect.y as usize + row) * self.size as usize + rect.x as usize;
            self.data[dst..dst + w].copy_from_slice(&bitmap[src..src + w]);
        }
        self.version += 1;
    }
}

// ===================================================================
// Tests
// ===================================================================
