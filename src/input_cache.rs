use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{anyhow, Context};

/// Where the cache loads its buffers from.
///
/// Blocks are requested at multiples of the block size. A short read means the input ends inside
/// that block.
pub(crate) trait BlockSource {
    fn read_block(&mut self, start: u64, block: &mut [u8]) -> Result<usize, anyhow::Error>;
}

pub(crate) struct FileBlocks {
    file: File,
}

impl FileBlocks {
    pub(crate) fn new(file: File) -> FileBlocks {
        FileBlocks { file }
    }
}

impl BlockSource for FileBlocks {
    fn read_block(&mut self, start: u64, block: &mut [u8]) -> Result<usize, anyhow::Error> {
        self.file.seek(SeekFrom::Start(start))?;
        Ok(read_full(&mut self.file, block)?)
    }
}

/// Blocks of a forward-only stream. Everything pulled from the stream is spooled to an anonymous
/// temp file so that evicted blocks can be loaded again.
pub(crate) struct StreamBlocks<R: Read> {
    reader: R,
    spool: File,
    streamed: u64,
    exhausted: bool,
}

impl<R: Read> StreamBlocks<R> {
    pub(crate) fn new(reader: R, spool_dir: &Path) -> Result<StreamBlocks<R>, anyhow::Error> {
        let spool = tempfile::tempfile_in(spool_dir)
            .with_context(|| anyhow!("create spool file in {}", spool_dir.display()))?;
        Ok(
            StreamBlocks {
                reader,
                spool,
                streamed: 0,
                exhausted: false,
            }
        )
    }

    fn pull(&mut self, block: &mut [u8]) -> Result<usize, anyhow::Error> {
        if self.exhausted {
            return Ok(0);
        }
        let n = read_full(&mut self.reader, block)?;
        self.spool.seek(SeekFrom::Start(self.streamed))?;
        self.spool.write_all(&block[..n])?;
        self.streamed += n as u64;
        if n < block.len() {
            self.exhausted = true;
        }
        Ok(n)
    }
}

impl<R: Read> BlockSource for StreamBlocks<R> {
    fn read_block(&mut self, start: u64, block: &mut [u8]) -> Result<usize, anyhow::Error> {
        if start < self.streamed {
            self.spool.seek(SeekFrom::Start(start))?;
            return Ok(read_full(&mut self.spool, block)?);
        }
        if start > self.streamed {
            let mut skipped = vec![0u8; block.len()];
            while self.streamed < start && !self.exhausted {
                self.pull(&mut skipped)?;
            }
            if self.streamed < start {
                return Ok(0);
            }
        }
        self.pull(block)
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Index of the last buffer starting at or before `position`.
///
/// `starts` must be sorted ascending. Returns `None` when `position` precedes the first start.
pub(crate) fn find_buffer_index_for_position(position: u64, starts: &[u64]) -> Option<usize> {
    match starts.partition_point(|start| *start <= position) {
        0 => None,
        i => Some(i - 1),
    }
}

struct Buffer {
    start: u64,
    len: usize,
    last_used: u64,
    data: Vec<u8>,
}

impl Buffer {
    fn covers(&self, position: u64) -> bool {
        position >= self.start && position < self.start + self.len as u64
    }
}

/// One input source seen as a single addressable byte array, held in at most `max_buffers`
/// buffers of `buffer_size` bytes.
pub(crate) struct InputCache {
    source_index: u32,
    name: String,
    blocks: Box<dyn BlockSource>,
    buffer_size: usize,
    max_buffers: usize,
    // sorted, parallel to `slots`
    starts: Vec<u64>,
    slots: Vec<usize>,
    pool: Vec<Buffer>,
    free: Vec<usize>,
    clock: u64,
    cursor: u64,
    current: Option<usize>,
    end: Option<u64>,
}

impl InputCache {
    pub(crate) fn new(
        source_index: u32,
        name: String,
        blocks: Box<dyn BlockSource>,
        buffer_size: usize,
        max_buffers: usize,
    ) -> InputCache {
        InputCache {
            source_index,
            name,
            blocks,
            buffer_size,
            max_buffers,
            starts: Vec::with_capacity(max_buffers),
            slots: Vec::with_capacity(max_buffers),
            pool: Vec::with_capacity(max_buffers),
            free: Vec::new(),
            clock: 0,
            cursor: 0,
            current: None,
            end: None,
        }
    }

    /// Cache over a file, or over standard input when the path is `-`.
    pub(crate) fn open(
        source_index: u32,
        path: &Path,
        buffer_size: usize,
        max_buffers: usize,
        spool_dir: &Path,
    ) -> Result<InputCache, anyhow::Error> {
        let blocks: Box<dyn BlockSource> = if path == Path::new("-") {
            Box::new(StreamBlocks::new(std::io::stdin(), spool_dir)?)
        } else {
            let file = File::open(path).with_context(|| anyhow!("path: {}", path.display()))?;
            Box::new(FileBlocks::new(file))
        };
        log::debug!("Opened input {} as source {}", path.display(), source_index);
        Ok(InputCache::new(source_index, path.display().to_string(), blocks, buffer_size, max_buffers))
    }

    pub(crate) fn source_index(&self) -> u32 {
        self.source_index
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Position of the next byte returned by [InputCache::read_next_byte].
    pub(crate) fn position(&self) -> u64 {
        self.cursor
    }

    /// The byte at the sequential cursor, `None` at end of input.
    pub(crate) fn read_next_byte(&mut self) -> Result<Option<u8>, anyhow::Error> {
        let slot = match self.current {
            Some(slot) if self.pool[slot].covers(self.cursor) => slot,
            _ => match self.locate(self.cursor)? {
                Some(slot) => {
                    self.current = Some(slot);
                    slot
                }
                None => return Ok(None),
            },
        };
        self.clock += 1;
        let buffer = &mut self.pool[slot];
        buffer.last_used = self.clock;
        let b = buffer.data[(self.cursor - buffer.start) as usize];
        self.cursor += 1;
        Ok(Some(b))
    }

    /// Copy the bytes starting at `position` into `dest` without moving the sequential cursor.
    /// Returns the number of bytes copied, less than `dest.len()` only at end of input.
    pub(crate) fn read(&mut self, position: u64, dest: &mut [u8]) -> Result<usize, anyhow::Error> {
        let mut copied = 0;
        while copied < dest.len() {
            let at = position + copied as u64;
            let slot = match self.locate(at)? {
                Some(slot) => slot,
                None => break,
            };
            let buffer = &self.pool[slot];
            let from = (at - buffer.start) as usize;
            let n = (buffer.len - from).min(dest.len() - copied);
            dest[copied..copied + n].copy_from_slice(&buffer.data[from..from + n]);
            copied += n;
        }
        Ok(copied)
    }

    fn locate(&mut self, position: u64) -> Result<Option<usize>, anyhow::Error> {
        if let Some(i) = find_buffer_index_for_position(position, &self.starts) {
            let slot = self.slots[i];
            if self.pool[slot].covers(position) {
                self.clock += 1;
                self.pool[slot].last_used = self.clock;
                return Ok(Some(slot));
            }
        }
        if let Some(end) = self.end {
            if position >= end {
                return Ok(None);
            }
        }
        let start = position - position % self.buffer_size as u64;
        match self.load(start)? {
            Some(slot) if self.pool[slot].covers(position) => Ok(Some(slot)),
            _ => Ok(None),
        }
    }

    fn load(&mut self, start: u64) -> Result<Option<usize>, anyhow::Error> {
        let slot = self.take_slot();
        let n = self.blocks.read_block(start, &mut self.pool[slot].data)
            .with_context(|| anyhow!("input: {}, block at {}", self.name, start))?;
        if n < self.buffer_size {
            self.end = Some(start + n as u64);
        }
        if n == 0 {
            self.free.push(slot);
            return Ok(None);
        }
        self.clock += 1;
        let buffer = &mut self.pool[slot];
        buffer.start = start;
        buffer.len = n;
        buffer.last_used = self.clock;
        let i = self.starts.partition_point(|s| *s < start);
        self.starts.insert(i, start);
        self.slots.insert(i, slot);
        Ok(Some(slot))
    }

    fn take_slot(&mut self) -> usize {
        if let Some(slot) = self.free.pop() {
            return slot;
        }
        if self.pool.len() < self.max_buffers {
            self.pool.push(
                Buffer {
                    start: 0,
                    len: 0,
                    last_used: 0,
                    data: vec![0u8; self.buffer_size],
                }
            );
            return self.pool.len() - 1;
        }
        let mut victim = 0;
        for i in 1..self.slots.len() {
            if self.pool[self.slots[i]].last_used < self.pool[self.slots[victim]].last_used {
                victim = i;
            }
        }
        self.starts.remove(victim);
        let slot = self.slots.remove(victim);
        if self.current == Some(slot) {
            self.current = None;
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use crate::input_cache::{find_buffer_index_for_position, FileBlocks, InputCache, StreamBlocks};

    fn numbered_lines(min: u64, max: u64) -> Vec<u8> {
        let mut content = Vec::new();
        for num in min..max {
            content.extend_from_slice(format!("{num}\n").as_bytes());
        }
        content
    }

    fn stream_cache(content: Vec<u8>, buffer_size: usize, max_buffers: usize) -> InputCache {
        let blocks = StreamBlocks::new(Cursor::new(content), &std::env::temp_dir()).unwrap();
        InputCache::new(0, "stream".to_string(), Box::new(blocks), buffer_size, max_buffers)
    }

    #[test]
    fn test_buffer_positioning_large_numbers() {
        let starts = [0, 32768];
        assert_eq!(find_buffer_index_for_position(32767, &starts), Some(0));
        assert_eq!(find_buffer_index_for_position(32768, &starts), Some(1));
        assert_eq!(find_buffer_index_for_position(32846, &starts), Some(1));
    }

    #[test]
    fn test_buffer_positioning_not_pow2() {
        let starts = [0, 10, 20, 30];
        assert_eq!(find_buffer_index_for_position(0, &starts), Some(0));
        assert_eq!(find_buffer_index_for_position(9, &starts), Some(0));
        assert_eq!(find_buffer_index_for_position(10, &starts), Some(1));
        assert_eq!(find_buffer_index_for_position(19, &starts), Some(1));
        assert_eq!(find_buffer_index_for_position(20, &starts), Some(2));
        assert_eq!(find_buffer_index_for_position(29, &starts), Some(2));
        assert_eq!(find_buffer_index_for_position(30, &starts), Some(3));
    }

    #[test]
    fn test_buffer_positioning_past_last_start() {
        let starts = [0, 10];
        assert_eq!(find_buffer_index_for_position(20, &starts), Some(1));
        assert_eq!(find_buffer_index_for_position(30, &starts), Some(1));
        assert_eq!(find_buffer_index_for_position(5, &[10, 20]), None);
        assert_eq!(find_buffer_index_for_position(5, &[]), None);
    }

    #[test]
    fn test_stream_with_many_buffers_by_byte() -> Result<(), anyhow::Error> {
        let content = numbered_lines(100000, 104106);
        let mut cache = stream_cache(content.clone(), 1000, 2);
        let mut read = Vec::new();
        while let Some(b) = cache.read_next_byte()? {
            read.push(b);
        }
        assert_eq!(read, content);
        assert_eq!(cache.position(), content.len() as u64);
        assert_eq!(cache.read_next_byte()?, None);
        Ok(())
    }

    #[test]
    fn test_stream_with_many_buffers_by_position() -> Result<(), anyhow::Error> {
        let mut cache = stream_cache(numbered_lines(100000, 104106), 1000, 2);
        let mut record = [0u8; 6];
        // backwards forces every block to be reloaded from the spool
        for num in (100000..104106u64).rev() {
            let n = cache.read((num - 100000) * 7, &mut record)?;
            assert_eq!(n, 6);
            assert_eq!(std::str::from_utf8(&record)?, num.to_string());
        }
        assert_eq!(cache.position(), 0);
        Ok(())
    }

    #[test]
    fn test_positional_read_keeps_cursor() -> Result<(), anyhow::Error> {
        let mut cache = stream_cache(b"abcdefghijklmnopqrstuvwxyz".to_vec(), 4, 2);
        assert_eq!(cache.read_next_byte()?, Some(b'a'));
        assert_eq!(cache.read_next_byte()?, Some(b'b'));
        let mut dest = [0u8; 10];
        assert_eq!(cache.read(15, &mut dest)?, 10);
        assert_eq!(&dest, b"pqrstuvwxy");
        assert_eq!(cache.read_next_byte()?, Some(b'c'));
        assert_eq!(cache.position(), 3);
        Ok(())
    }

    #[test]
    fn test_read_past_end() -> Result<(), anyhow::Error> {
        let mut cache = stream_cache(b"0123456789".to_vec(), 4, 2);
        let mut dest = [0u8; 8];
        assert_eq!(cache.read(6, &mut dest)?, 4);
        assert_eq!(&dest[..4], b"6789");
        assert_eq!(cache.read(10, &mut dest)?, 0);
        assert_eq!(cache.read(100, &mut dest)?, 0);
        Ok(())
    }

    #[test]
    fn test_exact_multiple_of_buffer_size() -> Result<(), anyhow::Error> {
        let mut cache = stream_cache(b"01234567".to_vec(), 4, 2);
        let mut count = 0;
        while cache.read_next_byte()?.is_some() {
            count += 1;
        }
        assert_eq!(count, 8);
        let mut dest = [0u8; 3];
        assert_eq!(cache.read(3, &mut dest)?, 3);
        assert_eq!(&dest, b"345");
        Ok(())
    }

    #[test]
    fn test_starts_stay_sorted_after_eviction() -> Result<(), anyhow::Error> {
        let mut cache = stream_cache(numbered_lines(0, 1000), 16, 3);
        let mut dest = [0u8; 1];
        for position in [500u64, 20, 300, 0, 900, 40, 700] {
            cache.read(position, &mut dest)?;
            assert!(cache.starts.windows(2).all(|w| w[0] < w[1]));
            assert!(cache.starts.len() <= 3);
            assert!(cache.starts.iter().all(|s| s % 16 == 0));
        }
        Ok(())
    }

    #[test]
    fn test_file_blocks() -> Result<(), anyhow::Error> {
        let content = numbered_lines(100000, 101000);
        let mut file = tempfile::tempfile()?;
        file.write_all(&content)?;
        let mut cache = InputCache::new(3, "file".to_string(), Box::new(FileBlocks::new(file)), 100, 2);
        assert_eq!(cache.source_index(), 3);
        let mut record = [0u8; 6];
        for num in (100000..101000u64).rev().step_by(37) {
            cache.read((num - 100000) * 7, &mut record)?;
            assert_eq!(std::str::from_utf8(&record)?, num.to_string());
        }
        let mut count = 0;
        while cache.read_next_byte()?.is_some() {
            count += 1;
        }
        assert_eq!(count, content.len());
        Ok(())
    }
}
