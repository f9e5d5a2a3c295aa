//! Double-buffered packet storage shared by the conversion worker and the emitter

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::capture::frame::{PacketHeader, PacketLayout, HEADER_SIZE};
use crate::error::Result;

/// One `[PacketHeader][payload]` region.
///
/// Backed by `u64` words so the header can be viewed in place. Allocated once
/// and never resized; moving a `Region` only moves the box pointer.
struct Region {
    words: Box<[u64]>,
    len: usize,
    /// Trigger sequence the contents were converted from; not part of the packet
    sequence: u64,
}

impl Region {
    fn new(layout: &PacketLayout) -> Self {
        let len = layout.total_size();
        let mut region = Self {
            words: vec![0u64; len.div_ceil(8)].into_boxed_slice(),
            len,
            sequence: 0,
        };
        *region.header_mut() = layout.header();
        region
    }

    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len]
    }

    fn header(&self) -> &PacketHeader {
        bytemuck::from_bytes(&self.bytes()[..HEADER_SIZE])
    }

    fn header_mut(&mut self) -> &mut PacketHeader {
        bytemuck::from_bytes_mut(&mut self.bytes_mut()[..HEADER_SIZE])
    }

    fn payload(&self) -> &[u8] {
        &self.bytes()[HEADER_SIZE..]
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.bytes_mut()[HEADER_SIZE..]
    }
}

struct ReadSide {
    region: Region,
    /// A commit is waiting to be consumed
    pending: bool,
    /// Set once by `force_unblock`, never cleared
    released: bool,
}

#[derive(Default)]
struct Stats {
    commits: AtomicUsize,
    reads: AtomicUsize,
    forced_unblocks: AtomicUsize,
}

/// Snapshot of the buffer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub commits: usize,
    pub reads: usize,
    pub forced_unblocks: usize,
}

/// Double buffer holding one sensor frame for writing and one for reading.
///
/// The writer fills the write region through a [`FrameWriter`] and commits it,
/// which swaps the two regions under the read lock and wakes the reader. The
/// reader holds the read lock from [`begin_read`](Self::begin_read) until the
/// [`FrameReader`] is dropped, so a commit never lands mid-read and the header
/// and payload a reader sees always come from the same commit.
pub struct FrameBuffer {
    layout: PacketLayout,
    write: Mutex<Region>,
    read: Mutex<ReadSide>,
    readable: Condvar,
    stats: CachePadded<Stats>,
}

impl FrameBuffer {
    /// Allocate both regions. Geometry is fixed for the buffer's lifetime.
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32, field_of_view: f32) -> Result<Self> {
        let layout = PacketLayout::new(width, height, bytes_per_pixel, field_of_view)?;
        Ok(Self::with_layout(layout))
    }

    pub fn with_layout(layout: PacketLayout) -> Self {
        debug!(
            width = layout.width,
            height = layout.height,
            bytes_per_pixel = layout.bytes_per_pixel,
            total_size = layout.total_size(),
            "allocating frame buffer"
        );

        Self {
            layout,
            write: Mutex::new(Region::new(&layout)),
            read: Mutex::new(ReadSide {
                region: Region::new(&layout),
                pending: false,
                released: false,
            }),
            readable: Condvar::new(),
            stats: CachePadded::new(Stats::default()),
        }
    }

    pub fn layout(&self) -> &PacketLayout {
        &self.layout
    }

    /// Exclusive access to the write region.
    pub fn begin_write(&self) -> FrameWriter<'_> {
        FrameWriter {
            buffer: self,
            region: self.write.lock(),
        }
    }

    /// Block until a commit is available (or the buffer was released), then
    /// lock the read region until the returned reader is dropped.
    ///
    /// Single consumer: concurrent readers would serialize on the read lock and
    /// the second one would wait for the next commit.
    pub fn begin_read(&self) -> FrameReader<'_> {
        let mut side = self.read.lock();
        self.readable
            .wait_while(&mut side, |side| !side.pending && !side.released);

        let released = !side.pending;
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        trace!(released, "read region acquired");

        FrameReader { side, released }
    }

    /// Wake any blocked reader without a commit. After this call `begin_read`
    /// never blocks again and may return the last committed (or initial) frame.
    pub fn force_unblock(&self) {
        let mut side = self.read.lock();
        side.released = true;
        drop(side);

        self.stats.forced_unblocks.fetch_add(1, Ordering::Relaxed);
        self.readable.notify_all();
        debug!("frame buffer released");
    }

    pub fn is_released(&self) -> bool {
        self.read.lock().released
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            commits: self.stats.commits.load(Ordering::Relaxed),
            reads: self.stats.reads.load(Ordering::Relaxed),
            forced_unblocks: self.stats.forced_unblocks.load(Ordering::Relaxed),
        }
    }
}

/// Write access to the current write region.
pub struct FrameWriter<'a> {
    buffer: &'a FrameBuffer,
    region: MutexGuard<'a, Region>,
}

impl FrameWriter<'_> {
    /// Header of the write region. Size and geometry fields must be left alone.
    pub fn write_header(&mut self) -> &mut PacketHeader {
        self.region.header_mut()
    }

    /// Payload of the write region, exactly one frame long.
    pub fn write_payload(&mut self) -> &mut [u8] {
        self.region.payload_mut()
    }

    /// Tag the region with the trigger sequence it was converted from.
    pub fn set_sequence(&mut self, sequence: u64) {
        self.region.sequence = sequence;
    }

    /// Publish the written region: swap it with the read region, mark it
    /// readable and wake the reader.
    pub fn commit_write(self) {
        let FrameWriter { buffer, mut region } = self;

        let mut side = buffer.read.lock();
        std::mem::swap(&mut *region, &mut side.region);
        side.pending = true;
        drop(side);
        drop(region);

        buffer.stats.commits.fetch_add(1, Ordering::Relaxed);
        buffer.readable.notify_one();
    }
}

/// Exclusive read access to the last committed region. Dropping it ends the read.
pub struct FrameReader<'a> {
    side: MutexGuard<'a, ReadSide>,
    released: bool,
}

impl FrameReader<'_> {
    pub fn header(&self) -> &PacketHeader {
        self.side.region.header()
    }

    pub fn payload(&self) -> &[u8] {
        self.side.region.payload()
    }

    /// Trigger sequence of this frame; 0 for a region never written.
    pub fn sequence(&self) -> u64 {
        self.side.region.sequence
    }

    /// The full wire packet, header followed by payload.
    pub fn packet(&self) -> &[u8] {
        self.side.region.bytes()
    }

    /// Record when the packet left for the transport.
    pub fn stamp_sent(&mut self, nanos: u64) {
        self.side.region.header_mut().sent_timestamp = nanos;
    }

    /// True when this read was granted by `force_unblock` rather than a commit;
    /// the contents are then stale or a duplicate.
    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn end_read(self) {}
}

impl Drop for FrameReader<'_> {
    fn drop(&mut self) {
        self.side.pending = false;
    }
}
