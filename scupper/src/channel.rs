// -*- mode: rust; -*-
//
// This file is part of `scupper`.
// See LICENSE for licensing information.

//! Blocking, ordered communication channels and the typed read/write
//! operations protocols build on.

use crate::Block;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use std::{
    cell::RefCell,
    io::{Read, Result, Write},
    rc::Rc,
};

/// Frames larger than this are treated as corrupt rather than allocated.
const MAX_FRAME_LEN: u64 = 1 << 30;

/// A trait for managing I/O. `AbstractChannel`s are clonable, and provide
/// basic read/write capabilities for both common and protocol-specific types.
pub trait AbstractChannel {
    /// Read a slice of `u8`s from the channel.
    fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<()>;
    /// Write a slice of `u8`s to the channel.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
    /// Flush the channel.
    fn flush(&mut self) -> Result<()>;
    /// Clone the channel.
    fn clone(&self) -> Self
    where
        Self: Sized;

    /// Read `nbytes` from the channel, and return it as a `Vec`.
    fn read_vec(&mut self, nbytes: usize) -> Result<Vec<u8>> {
        let mut data = vec![0; nbytes];
        self.read_bytes(&mut data)?;
        Ok(data)
    }

    /// Write a `bool` to the channel.
    #[inline(always)]
    fn write_bool(&mut self, b: bool) -> Result<()> {
        self.write_bytes(&[b as u8])
    }

    /// Read a `bool` from the channel.
    #[inline(always)]
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Write a `u8` to the channel.
    #[inline(always)]
    fn write_u8(&mut self, s: u8) -> Result<()> {
        self.write_bytes(&[s])
    }

    /// Read a `u8` from the channel.
    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8> {
        let mut data = [0];
        self.read_bytes(&mut data)?;
        Ok(data[0])
    }

    /// Write a `u32` to the channel.
    #[inline(always)]
    fn write_u32(&mut self, s: u32) -> Result<()> {
        self.write_bytes(&s.to_le_bytes())
    }

    /// Read a `u32` from the channel.
    #[inline(always)]
    fn read_u32(&mut self) -> Result<u32> {
        let mut data = [0u8; 4];
        self.read_bytes(&mut data)?;
        Ok(u32::from_le_bytes(data))
    }

    /// Write a `u64` to the channel.
    #[inline(always)]
    fn write_u64(&mut self, s: u64) -> Result<()> {
        self.write_bytes(&s.to_le_bytes())
    }

    /// Read a `u64` from the channel.
    #[inline(always)]
    fn read_u64(&mut self) -> Result<u64> {
        let mut data = [0u8; 8];
        self.read_bytes(&mut data)?;
        Ok(u64::from_le_bytes(data))
    }

    /// Write a `usize` to the channel as a `u64`.
    #[inline(always)]
    fn write_usize(&mut self, s: usize) -> Result<()> {
        self.write_u64(s as u64)
    }

    /// Read a `usize` from the channel.
    #[inline(always)]
    fn read_usize(&mut self) -> Result<usize> {
        Ok(self.read_u64()? as usize)
    }

    /// Write a `Block` to the channel.
    #[inline(always)]
    fn write_block(&mut self, b: &Block) -> Result<()> {
        self.write_bytes(b.as_ref())
    }

    /// Read a `Block` from the channel.
    #[inline(always)]
    fn read_block(&mut self) -> Result<Block> {
        let mut v = Block::default();
        self.read_bytes(v.as_mut())?;
        Ok(v)
    }

    /// Read `n` `Block`s from the channel.
    #[inline(always)]
    fn read_blocks(&mut self, n: usize) -> Result<Vec<Block>> {
        (0..n).map(|_| self.read_block()).collect()
    }

    /// Write a length-prefixed byte frame (`u64` length, then the bytes).
    fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_u64(bytes.len() as u64)?;
        self.write_bytes(bytes)
    }

    /// Read a length-prefixed byte frame.
    fn read_frame(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u64()?;
        if len > MAX_FRAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame length {} exceeds limit", len),
            ));
        }
        self.read_vec(len as usize)
    }

    /// Write a length-prefixed UTF-8 string.
    fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_frame(s.as_bytes())
    }

    /// Read a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_frame()?;
        String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Write a `RistrettoPoint` to the channel.
    #[inline(always)]
    fn write_pt(&mut self, pt: &RistrettoPoint) -> Result<()> {
        self.write_bytes(pt.compress().as_bytes())
    }

    /// Read a `RistrettoPoint` from the channel.
    #[inline(always)]
    fn read_pt(&mut self) -> Result<RistrettoPoint> {
        let mut data = [0u8; 32];
        self.read_bytes(&mut data)?;
        match CompressedRistretto::from_slice(&data)
            .ok()
            .and_then(|pt| pt.decompress())
        {
            Some(pt) => Ok(pt),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "unable to decompress ristretto point",
            )),
        }
    }
}

/// A standard read/write channel that implements `AbstractChannel`.
pub struct Channel<R, W> {
    reader: Rc<RefCell<R>>,
    writer: Rc<RefCell<W>>,
}

impl<R: Read, W: Write> Channel<R, W> {
    /// Make a new `Channel` from a `reader` and a `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        let reader = Rc::new(RefCell::new(reader));
        let writer = Rc::new(RefCell::new(writer));
        Self { reader, writer }
    }
}

impl<R: Read, W: Write> AbstractChannel for Channel<R, W> {
    #[inline(always)]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.borrow_mut().write_all(bytes)
    }

    #[inline(always)]
    fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        self.reader.borrow_mut().read_exact(bytes)
    }

    #[inline(always)]
    fn flush(&mut self) -> Result<()> {
        self.writer.borrow_mut().flush()
    }

    #[inline(always)]
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            writer: self.writer.clone(),
        }
    }
}

/// A channel that tracks the number of bytes read/written.
pub struct TrackChannel<R, W> {
    channel: Channel<R, W>,
    nbytes_read: usize,
    nbytes_written: usize,
}

impl<R: Read, W: Write> TrackChannel<R, W> {
    /// Make a new `TrackChannel` from a `reader` and a `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        let channel = Channel::new(reader, writer);
        Self {
            channel,
            nbytes_read: 0,
            nbytes_written: 0,
        }
    }

    /// Clear the number of bytes read/written.
    pub fn clear(&mut self) {
        self.nbytes_read = 0;
        self.nbytes_written = 0;
    }

    /// Return the number of bytes written to the channel.
    pub fn bytes_written(&self) -> usize {
        self.nbytes_written
    }

    /// Return the number of bytes read from the channel.
    pub fn bytes_read(&self) -> usize {
        self.nbytes_read
    }

    /// Return the number of megabytes written to the channel.
    pub fn megabytes_written(&self) -> f64 {
        self.nbytes_written as f64 / (1024.0 * 1024.0)
    }

    /// Return the number of megabytes read from the channel.
    pub fn megabytes_read(&self) -> f64 {
        self.nbytes_read as f64 / (1024.0 * 1024.0)
    }

    /// Return the total amount of communication on the channel in megabytes.
    pub fn total_megabytes(&self) -> f64 {
        self.megabytes_written() + self.megabytes_read()
    }
}

impl<R: Read, W: Write> AbstractChannel for TrackChannel<R, W> {
    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.nbytes_written += bytes.len();
        self.channel.write_bytes(bytes)
    }

    #[inline]
    fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        self.nbytes_read += bytes.len();
        self.channel.read_bytes(bytes)
    }

    #[inline]
    fn flush(&mut self) -> Result<()> {
        self.channel.flush()
    }

    #[inline]
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            nbytes_written: self.nbytes_written,
            nbytes_read: self.nbytes_read,
        }
    }
}
