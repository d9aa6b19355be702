//! Circular block buffer for the TCP data path
//!
//! Network segments arrive in arbitrary sizes; the device moves whole blocks.
//! The producer copies segments in at `write_ptr` (split at the wrap point),
//! the consumer takes one block at a time from `read_ptr`.
//!
//! `read_ptr` only ever advances by `BLOCK_SIZE` from zero, so the block at
//! the read position is always contiguous and can be handed to the device
//! in place.
//!
//! The buffer never holds `capacity` bytes: a full ring would be
//! indistinguishable from an empty one, so a segment that would make
//! `available` reach the capacity is rejected whole.

use crate::core::types::{Block, BLOCK_SIZE};
use crate::error::{Error, Result};

/// Marker bytes at the head of the seeded first block
pub const SEED_HEADER: [u8; 4] = [0xEB, 0x90, 0x00, 0x00];

/// Fixed-capacity byte ring sized as a whole number of blocks
pub struct CircularDataBuffer {
    blocks: Vec<Block>,
    write_ptr: usize,
    read_ptr: usize,
}

impl CircularDataBuffer {
    /// Create a ring of `blocks` blocks, seeded and with both pointers at 0
    pub fn new(blocks: usize) -> Self {
        let mut ring = Self {
            blocks: vec![[0u8; BLOCK_SIZE]; blocks.max(2)],
            write_ptr: 0,
            read_ptr: 0,
        };
        ring.reset();
        ring
    }

    /// Total size in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }

    /// Bytes written and not yet consumed
    #[inline]
    pub fn available(&self) -> usize {
        let cap = self.capacity();
        (self.write_ptr + cap - self.read_ptr) % cap
    }

    /// Largest segment `push` accepts right now
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - 1 - self.available()
    }

    #[inline]
    pub fn write_ptr(&self) -> usize {
        self.write_ptr
    }

    #[inline]
    pub fn read_ptr(&self) -> usize {
        self.read_ptr
    }

    /// Copy a segment in at the write position
    ///
    /// # Errors
    ///
    /// `Error::Overflow` if the segment does not fit; nothing is written.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        let free = self.free();
        if data.len() > free {
            return Err(Error::Overflow {
                len: data.len(),
                free,
            });
        }

        let cap = self.capacity();
        let start = self.write_ptr;
        let first = data.len().min(cap - start);
        let flat = self.blocks.as_flattened_mut();
        flat[start..start + first].copy_from_slice(&data[..first]);
        flat[..data.len() - first].copy_from_slice(&data[first..]);

        self.write_ptr = (start + data.len()) % cap;
        Ok(())
    }

    /// At least one whole block is waiting
    #[inline]
    pub fn has_block(&self) -> bool {
        self.available() >= BLOCK_SIZE
    }

    /// The block at the read position, if a whole one is available
    pub fn front_block_mut(&mut self) -> Option<&mut Block> {
        if !self.has_block() {
            return None;
        }
        let index = self.read_ptr / BLOCK_SIZE;
        self.blocks.get_mut(index)
    }

    /// Release the block at the read position
    pub fn consume_block(&mut self) {
        if self.has_block() {
            self.read_ptr = (self.read_ptr + BLOCK_SIZE) % self.capacity();
        }
    }

    /// The first block of the backing storage, used as scratch by the
    /// synthetic and diagnostic paths
    pub fn first_block_mut(&mut self) -> &mut Block {
        &mut self.blocks[0]
    }

    /// Zero both pointers and reseed the first block with the test pattern
    ///
    /// The pattern is `EB 90 00 00` followed by a counter that starts at 0
    /// on byte 4 and wraps every 256 bytes.
    pub fn reset(&mut self) {
        self.write_ptr = 0;
        self.read_ptr = 0;
        let first = &mut self.blocks[0];
        first[..SEED_HEADER.len()].copy_from_slice(&SEED_HEADER);
        for (i, b) in first[SEED_HEADER.len()..].iter_mut().enumerate() {
            *b = (i & 0xFF) as u8;
        }
    }
}

impl std::fmt::Debug for CircularDataBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircularDataBuffer")
            .field("capacity", &self.capacity())
            .field("write_ptr", &self.write_ptr)
            .field("read_ptr", &self.read_ptr)
            .finish()
    }
}
