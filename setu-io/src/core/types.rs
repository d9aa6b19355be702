//! Block geometry and small byte helpers

use std::fmt::Write;

/// Unit moved by one block transfer
pub const BLOCK_SIZE: usize = 4096;

/// Payload of one UDP datagram
pub const SUB_BLOCK_SIZE: usize = 1024;

/// Datagrams per reassembled block
pub const SUB_BLOCKS_PER_BLOCK: usize = BLOCK_SIZE / SUB_BLOCK_SIZE;

/// Circular buffer size in blocks on the reference board
pub const DEFAULT_RING_BLOCKS: usize = 32;

/// Segments above this size are logged as suspicious
pub const LARGE_SEGMENT_THRESHOLD: usize = BLOCK_SIZE * 4;

/// One fixed-size transfer unit
pub type Block = [u8; BLOCK_SIZE];

/// Fill a block with a 32-bit word repeated in memory (little-endian) order
pub fn fill_words(block: &mut Block, word: u32) {
    for chunk in block.chunks_exact_mut(4) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Format a buffer as a hex dump, 32 bytes per line in 4-byte groups.
///
/// With `summary` set only the first and last line are rendered, separated by
/// `...` when the buffer is longer than two lines.
pub fn hex_dump(buf: &[u8], summary: bool) -> String {
    const LINE: usize = 32;

    // Writing into a String cannot fail
    fn line(out: &mut String, buf: &[u8], offset: usize) {
        let _ = write!(out, "{:08X}:", offset);
        let end = (offset + LINE).min(buf.len());
        for group in buf[offset..end].chunks(4) {
            out.push(' ');
            for b in group {
                let _ = write!(out, "{:02X}", b);
            }
        }
        out.push('\n');
    }

    let mut out = String::new();
    if buf.is_empty() {
        return out;
    }

    if !summary {
        for offset in (0..buf.len()).step_by(LINE) {
            line(&mut out, buf, offset);
        }
        return out;
    }

    line(&mut out, buf, 0);
    if buf.len() <= LINE {
        return out;
    }
    if buf.len() > 2 * LINE {
        out.push_str("...\n");
    }
    let last = (buf.len() - 1) / LINE * LINE;
    line(&mut out, buf, last);
    out
}
