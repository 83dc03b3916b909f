//! `Read + Seek` over a remote file, backed by HTTP Range requests.
//!
//! The file is split into fixed-size blocks; each block is fetched once and
//! kept in an LRU cache so the TIFF decoder can seek freely between the
//! header, the tile offset tables and the tiles it needs.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::debug;

use crate::cache::BlockCache;
use crate::error::Result;
use crate::http::HttpClient;

/// Block size and cache capacity for [`RangeReader`].
#[derive(Debug, Clone, Copy)]
pub struct RangeReaderOptions {
    /// Bytes per Range request (default 512 KiB)
    pub block_size: u64,
    /// Blocks kept in memory (default 64)
    pub cache_blocks: usize,
}

impl Default for RangeReaderOptions {
    fn default() -> Self {
        Self {
            block_size: 512 * 1024,
            cache_blocks: 64,
        }
    }
}

/// Blocking reader over a remote file.
pub struct RangeReader {
    rt: Arc<Runtime>,
    http: HttpClient,
    url: String,
    len: u64,
    pos: u64,
    block_size: u64,
    cache: BlockCache,
}

impl RangeReader {
    /// Open `url`, discovering its size with a HEAD request.
    pub fn open(rt: Arc<Runtime>, http: HttpClient, url: &str, options: RangeReaderOptions) -> Result<Self> {
        let len = rt.block_on(http.content_length(url))?;
        debug!(url, len, "opened remote file");

        Ok(Self {
            rt,
            http,
            url: url.to_string(),
            len,
            pos: 0,
            block_size: options.block_size.max(1),
            cache: BlockCache::new(options.cache_blocks),
        })
    }

    /// File size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `(hits, misses)` of the block cache
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }

    fn fetch_block(&self, block: u64) -> io::Result<Vec<u8>> {
        let offset = block * self.block_size;
        let length = self.block_size.min(self.len - offset);
        self.rt
            .block_on(self.http.fetch_range(&self.url, offset, length))
            .map_err(io::Error::other)
    }
}

fn copy_from(block: &[u8], within: usize, buf: &mut [u8]) -> usize {
    let available = block.len().saturating_sub(within);
    let n = available.min(buf.len());
    buf[..n].copy_from_slice(&block[within..within + n]);
    n
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len {
            return Ok(0);
        }

        let block = self.pos / self.block_size;
        let within = (self.pos % self.block_size) as usize;

        let n = match self.cache.get(block) {
            Some(data) => copy_from(data, within, buf),
            None => {
                let data = self.fetch_block(block)?;
                let n = copy_from(&data, within, buf);
                self.cache.insert(block, data);
                n
            }
        };

        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };

        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_from_block_tail() {
        let block = [1_u8, 2, 3, 4, 5];
        let mut buf = [0_u8; 4];
        assert_eq!(copy_from(&block, 3, &mut buf), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(copy_from(&block, 5, &mut buf), 0);
    }
}
