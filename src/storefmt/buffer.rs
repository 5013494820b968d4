use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

use crate::error::{AbacError, Result};

pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Keep at most this many idle buffers around.
const MAX_IDLE: usize = 16;

/// Fixed-capacity byte buffer for building keys and values.
/// Writing past the capacity is an error, never a truncation.
#[derive(Debug)]
pub struct ScratchBuf {
    data: Vec<u8>,
    capacity: usize,
}

impl ScratchBuf {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn reserve(&self, extra: usize) -> Result<()> {
        let needed = self.data.len() + extra;
        if needed > self.capacity {
            return Err(AbacError::BufferOverflow {
                needed,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.reserve(1)?;
        self.data.push(v);
        Ok(())
    }

    pub fn put_u32_le(&mut self, v: u32) -> Result<()> {
        self.put_slice(&v.to_le_bytes())
    }

    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Overwrite four bytes already written at `pos`.
    pub fn set_u32_le_at(&mut self, pos: usize, v: u32) {
        self.data[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Buffers shared by the threads using one store.
pub struct BufferPool {
    capacity: usize,
    idle: Mutex<Vec<ScratchBuf>>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acquire(&self) -> PooledBuf<'_> {
        let buf = self
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| ScratchBuf::with_capacity(self.capacity));
        PooledBuf { pool: self, buf }
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

/// A buffer on loan from a [`BufferPool`]; returned cleared on drop.
pub struct PooledBuf<'a> {
    pool: &'a BufferPool,
    buf: ScratchBuf,
}

impl Deref for PooledBuf<'_> {
    type Target = ScratchBuf;

    fn deref(&self) -> &ScratchBuf {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut ScratchBuf {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        // A zero-capacity Vec does not allocate.
        let mut buf = std::mem::replace(&mut self.buf, ScratchBuf::with_capacity(0));
        buf.clear();
        let mut idle = self.pool.idle.lock();
        if idle.len() < MAX_IDLE {
            idle.push(buf);
        }
    }
}

/// Cursor over stored bytes.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(AbacError::decode(format!(
                "wanted {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    /// Little-endian signed integer of 1, 2, 4 or 8 bytes.
    pub fn int_le(&mut self, width: usize) -> Result<i64> {
        let raw = self.take(width)?;
        Ok(match width {
            1 => raw[0] as i8 as i64,
            2 => i16::from_le_bytes([raw[0], raw[1]]) as i64,
            4 => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64,
            8 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(raw);
                i64::from_le_bytes(b)
            }
            other => return Err(AbacError::decode(format!("bad integer width {other}"))),
        })
    }
}
