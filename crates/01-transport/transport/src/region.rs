//! Ownership and section views of the shared region.
//!
//! A [`SharedRegion`] is either self-owned (an anonymous mapping or heap
//! allocation, zero-filled, used when no host buffer is supplied) or bound to
//! memory the caller owns: a borrowed slice, a raw pointer handed over through
//! FFI, or a file mapping shared with another process. All section views alias
//! the bound memory directly; nothing is buffered in between.
//!
//! The region is shared by two parties that take turns, and the peer may be a
//! different process. Views therefore never hand out long-lived references to
//! the bytes; reads and writes go through raw copies sized by the layout.

use crate::error::{LayoutError, RegionError, RegionResult};
use crate::handshake::Handshake;
use crate::layout::{RegionLayout, SectionSpan, LAYOUT};
use crate::schema::{InputRecord, CONTROL_OFFSET, FRAME_COUNT_OFFSET, INPUT_RECORD_SIZE};
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use core::sync::atomic::AtomicU8;
use log::debug;
use std::alloc::{alloc_zeroed, dealloc, Layout};

const REGION_ALIGNMENT: usize = 64;

#[cfg(not(target_arch = "wasm32"))]
type NativeMap = memmap2::MmapMut;

enum Backing {
    #[cfg(not(target_arch = "wasm32"))]
    Anonymous(NativeMap),
    Heap(Layout),
    #[cfg(not(target_arch = "wasm32"))]
    Mapped(NativeMap),
    External,
    Released,
}

/// Who owns the memory behind a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Allocated by [`SharedRegion::acquire_self_owned`].
    SelfOwned,
    /// Supplied by the caller; only borrowed.
    External,
    /// [`SharedRegion::release`] has run.
    Released,
}

/// The shared buffer partitioned into Input, Video, Sound and State sections.
pub struct SharedRegion<'a> {
    base: NonNull<u8>,
    len: usize,
    layout: RegionLayout,
    backing: Backing,
    _borrow: PhantomData<&'a mut [u8]>,
}

// SAFETY: the region is designed to be touched from two execution contexts that
// alternate turns on the control byte. All access goes through raw copies or the
// atomic control byte; exclusive use of each half is the protocol's contract.
unsafe impl Send for SharedRegion<'_> {}
// SAFETY: as above.
unsafe impl Sync for SharedRegion<'_> {}

impl SharedRegion<'static> {
    /// Allocates a zero-filled region sized for this build's layout.
    pub fn acquire_self_owned() -> RegionResult<Self> {
        Self::acquire_self_owned_with(LAYOUT)
    }

    /// Allocates a zero-filled region for an explicit layout.
    ///
    /// Native builds prefer an anonymous mapping and fall back to the heap when
    /// the mapping cannot be created.
    pub fn acquire_self_owned_with(layout: RegionLayout) -> RegionResult<Self> {
        let size = layout.total_size();

        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Ok(mut map) = memmap2::MmapOptions::new().len(size).map_anon() {
                if let Some(base) = NonNull::new(map.as_mut_ptr()) {
                    debug!("acquired {size} byte anonymous shared region");
                    return Ok(Self::from_parts(base, size, layout, Backing::Anonymous(map)));
                }
            }
        }

        let heap = Layout::from_size_align(size, REGION_ALIGNMENT)
            .map_err(|_| RegionError::AllocationFailed { size })?;
        // SAFETY: the layout has a non-zero size because the Input section is never empty.
        let ptr = unsafe { alloc_zeroed(heap) };
        let base = NonNull::new(ptr).ok_or(RegionError::AllocationFailed { size })?;
        debug!("acquired {size} byte heap shared region");
        Ok(Self::from_parts(base, size, layout, Backing::Heap(heap)))
    }

    /// Binds memory handed over as a raw pointer, e.g. from a host process
    /// embedding the emulation loop.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// the returned region is bound, and must not be freed before
    /// [`release`](SharedRegion::release) or drop.
    pub unsafe fn bind_raw(ptr: *mut u8, len: usize) -> Result<Self, LayoutError> {
        // SAFETY: forwarded to the caller.
        unsafe { Self::bind_raw_with(LAYOUT, ptr, len) }
    }

    /// [`bind_raw`](SharedRegion::bind_raw) with an explicit layout.
    ///
    /// # Safety
    /// Same contract as [`bind_raw`](SharedRegion::bind_raw).
    pub unsafe fn bind_raw_with(
        layout: RegionLayout,
        ptr: *mut u8,
        len: usize,
    ) -> Result<Self, LayoutError> {
        let base = NonNull::new(ptr).ok_or(LayoutError::NullPointer)?;
        check_len(&layout, len)?;
        debug!("bound {len} byte external region");
        Ok(Self::from_parts(base, len, layout, Backing::External))
    }

    /// Binds a writable file mapping shared with another process.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn bind_mapped(map: NativeMap) -> Result<Self, LayoutError> {
        Self::bind_mapped_with(LAYOUT, map)
    }

    /// [`bind_mapped`](SharedRegion::bind_mapped) with an explicit layout.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn bind_mapped_with(layout: RegionLayout, mut map: NativeMap) -> Result<Self, LayoutError> {
        let len = map.len();
        check_len(&layout, len)?;
        let base = NonNull::new(map.as_mut_ptr()).ok_or(LayoutError::NullPointer)?;
        debug!("bound {len} byte mapped region");
        Ok(Self::from_parts(base, len, layout, Backing::Mapped(map)))
    }
}

impl<'a> SharedRegion<'a> {
    /// Borrows a caller-owned buffer. Fails when it is shorter than the layout.
    pub fn bind_external(buffer: &'a mut [u8]) -> Result<Self, LayoutError> {
        Self::bind_external_with(LAYOUT, buffer)
    }

    /// [`bind_external`](SharedRegion::bind_external) with an explicit layout.
    pub fn bind_external_with(
        layout: RegionLayout,
        buffer: &'a mut [u8],
    ) -> Result<Self, LayoutError> {
        let len = buffer.len();
        check_len(&layout, len)?;
        let base = NonNull::from(buffer).cast::<u8>();
        debug!("bound {len} byte external region");
        Ok(Self::from_parts(base, len, layout, Backing::External))
    }

    fn from_parts(base: NonNull<u8>, len: usize, layout: RegionLayout, backing: Backing) -> Self {
        Self {
            base,
            len,
            layout,
            backing,
            _borrow: PhantomData,
        }
    }

    /// Drops self-owned memory or unbinds external memory without touching it.
    ///
    /// Calling it again, or after nothing was bound, does nothing.
    pub fn release(&mut self) {
        match core::mem::replace(&mut self.backing, Backing::Released) {
            Backing::Released => return,
            Backing::Heap(heap) => {
                // SAFETY: `base` came from `alloc_zeroed` with this exact layout and the
                // backing is now marked released, so this runs at most once.
                unsafe { dealloc(self.base.as_ptr(), heap) };
            }
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Anonymous(map) | Backing::Mapped(map) => drop(map),
            Backing::External => {}
        }
        debug!("released {} byte shared region", self.len);
        self.base = NonNull::dangling();
        self.len = 0;
    }

    /// Returns true until [`release`](SharedRegion::release) runs.
    pub fn is_bound(&self) -> bool {
        !matches!(self.backing, Backing::Released)
    }

    pub fn ownership(&self) -> Ownership {
        match self.backing {
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Anonymous(_) => Ownership::SelfOwned,
            Backing::Heap(_) => Ownership::SelfOwned,
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Mapped(_) => Ownership::External,
            Backing::External => Ownership::External,
            Backing::Released => Ownership::Released,
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Number of bytes bound. May exceed the layout's total for external buffers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the region, as handed to host-side callbacks.
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Zero-fills every section, resetting the handshake to input-ready.
    pub fn zero(&self) {
        let base = self.section_base(SectionSpan {
            offset: 0,
            len: self.layout.total_size(),
        });
        // SAFETY: the span covers exactly the layout, which is within the bound length.
        unsafe { ptr::write_bytes(base.as_ptr(), 0, self.layout.total_size()) };
    }

    /// Typed view of the Input section.
    pub fn input(&self) -> InputView<'_> {
        InputView {
            base: self.section_base(self.layout.input),
            _region: PhantomData,
        }
    }

    /// Control byte of the Input section.
    pub fn handshake(&self) -> Handshake<'_> {
        self.input().handshake()
    }

    /// Raw view of the Video section.
    pub fn video(&self) -> SectionView<'_> {
        self.section(self.layout.video)
    }

    /// Raw view of the Sound section, if this layout carries one.
    pub fn sound(&self) -> Option<SectionView<'_>> {
        self.layout.sound.map(|span| self.section(span))
    }

    /// Raw view of the State-save section, if this layout carries one.
    pub fn state(&self) -> Option<SectionView<'_>> {
        self.layout.state.map(|span| self.section(span))
    }

    fn section(&self, span: SectionSpan) -> SectionView<'_> {
        SectionView {
            base: self.section_base(span),
            span,
            _region: PhantomData,
        }
    }

    fn section_base(&self, span: SectionSpan) -> NonNull<u8> {
        assert!(self.is_bound(), "shared region accessed after release");
        debug_assert!(span.end() <= self.len);
        // SAFETY: binding checked `len >= layout.total_size()` and every span lies inside
        // the layout, so the offset stays within the bound allocation.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(span.offset)) }
    }
}

impl Drop for SharedRegion<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl core::fmt::Debug for SharedRegion<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("len", &self.len)
            .field("ownership", &self.ownership())
            .field("layout", &self.layout)
            .finish()
    }
}

fn check_len(layout: &RegionLayout, len: usize) -> Result<(), LayoutError> {
    let required = layout.total_size();
    if len < required {
        return Err(LayoutError::TooSmall {
            required,
            actual: len,
        });
    }
    Ok(())
}

/// Field-level view of the Input section.
#[derive(Clone, Copy)]
pub struct InputView<'r> {
    base: NonNull<u8>,
    _region: PhantomData<&'r [u8]>,
}

impl<'r> InputView<'r> {
    /// Copies the whole record out of shared memory.
    pub fn read(&self) -> InputRecord {
        let mut record = InputRecord::default();
        // SAFETY: the Input section holds `INPUT_RECORD_SIZE` bytes and `record` is a
        // separate stack value, so the ranges cannot overlap.
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.as_ptr(),
                bytemuck::bytes_of_mut(&mut record).as_mut_ptr(),
                INPUT_RECORD_SIZE,
            );
        }
        record
    }

    /// Writes every field of `record` except the control byte.
    ///
    /// The frame counter is written only when `include_frame_count` is set so a
    /// host can leave it to the emulation side.
    pub fn write_fields(&self, record: &InputRecord, include_frame_count: bool) {
        let bytes = record.as_bytes();
        let start = if include_frame_count {
            FRAME_COUNT_OFFSET
        } else {
            FRAME_COUNT_OFFSET + 4
        };
        // SAFETY: both ranges lie inside the Input section and skip the control byte,
        // which is only ever accessed atomically.
        unsafe {
            ptr::copy_nonoverlapping(
                bytes[start..CONTROL_OFFSET].as_ptr(),
                self.base.as_ptr().add(start),
                CONTROL_OFFSET - start,
            );
            ptr::copy_nonoverlapping(
                bytes[CONTROL_OFFSET + 1..].as_ptr(),
                self.base.as_ptr().add(CONTROL_OFFSET + 1),
                INPUT_RECORD_SIZE - CONTROL_OFFSET - 1,
            );
        }
    }

    pub fn frame_count(&self) -> u32 {
        // SAFETY: the counter occupies four bytes at a fixed offset in the section.
        unsafe {
            ptr::read_unaligned(self.base.as_ptr().add(FRAME_COUNT_OFFSET).cast::<u32>())
        }
    }

    pub fn set_frame_count(&self, value: u32) {
        // SAFETY: see `frame_count`.
        unsafe {
            ptr::write_unaligned(
                self.base.as_ptr().add(FRAME_COUNT_OFFSET).cast::<u32>(),
                value,
            )
        }
    }

    pub fn handshake(&self) -> Handshake<'r> {
        // SAFETY: `AtomicU8` has the size and alignment of `u8`, and the byte lives as
        // long as the region borrow `'r`.
        let control = unsafe { &*self.base.as_ptr().add(CONTROL_OFFSET).cast::<AtomicU8>() };
        Handshake::new(control)
    }
}

/// Bounds-checked raw view of one section.
#[derive(Clone, Copy)]
pub struct SectionView<'r> {
    base: NonNull<u8>,
    span: SectionSpan,
    _region: PhantomData<&'r [u8]>,
}

impl<'r> SectionView<'r> {
    pub fn len(&self) -> usize {
        self.span.len
    }

    pub fn is_empty(&self) -> bool {
        self.span.len == 0
    }

    /// Offset of the section from the region base.
    pub fn offset(&self) -> usize {
        self.span.offset
    }

    /// Copies `src` into the section starting at `offset`.
    pub fn write_at(&self, offset: usize, src: &[u8]) -> Result<(), LayoutError> {
        let end = offset
            .checked_add(src.len())
            .filter(|&end| end <= self.span.len)
            .ok_or(LayoutError::TooSmall {
                required: offset.saturating_add(src.len()),
                actual: self.span.len,
            })?;
        debug_assert!(end <= self.span.len);
        // SAFETY: `offset..end` is inside the section; `src` is caller memory outside
        // the shared region's turn-owned half.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.base.as_ptr().add(offset), src.len());
        }
        Ok(())
    }

    /// Copies the start of the section into `out`, returning the byte count.
    pub fn read_into(&self, out: &mut [u8]) -> usize {
        let len = out.len().min(self.span.len);
        // SAFETY: `len` bytes are available on both sides.
        unsafe { ptr::copy_nonoverlapping(self.base.as_ptr(), out.as_mut_ptr(), len) };
        len
    }

    /// Copies the whole section into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0; self.span.len];
        self.read_into(&mut out);
        out
    }

    pub fn fill(&self, value: u8) {
        // SAFETY: writes exactly the section's bytes.
        unsafe { ptr::write_bytes(self.base.as_ptr(), value, self.span.len) };
    }

    /// Runs `f` over the section as a mutable slice.
    ///
    /// # Safety
    /// The caller must own the turn for this section and must not create any
    /// other slice over the same section while `f` runs.
    pub unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        // SAFETY: forwarded to the caller; the span is inside the bound region.
        let slice = unsafe { core::slice::from_raw_parts_mut(self.base.as_ptr(), self.span.len) };
        f(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{DisplayGeometry, Sections};
    use crate::Turn;
    use proptest::prelude::*;

    fn small_layout() -> RegionLayout {
        RegionLayout::new(
            DisplayGeometry {
                framebuffer_width: 16,
                framebuffer_height: 8,
                usable_width: 12,
                usable_height: 8,
            },
            Sections {
                sound: true,
                state: false,
            },
        )
    }

    #[test]
    fn self_owned_region_starts_zeroed_and_input_ready() {
        let region = SharedRegion::acquire_self_owned().expect("acquire");
        assert_eq!(region.ownership(), Ownership::SelfOwned);
        assert_eq!(region.len(), LAYOUT.total_size());
        assert!(region.video().to_vec().iter().all(|&b| b == 0));
        assert_eq!(region.handshake().observe(), Turn::InputReady);
    }

    #[test]
    fn release_twice_is_harmless() {
        let mut region = SharedRegion::acquire_self_owned().expect("acquire");
        region.release();
        assert!(!region.is_bound());
        region.release();
        assert_eq!(region.ownership(), Ownership::Released);
        assert_eq!(region.len(), 0);
    }

    #[test]
    #[should_panic(expected = "after release")]
    fn accessors_refuse_released_region() {
        let mut region = SharedRegion::acquire_self_owned().expect("acquire");
        region.release();
        let _ = region.video();
    }

    #[test]
    fn external_release_leaves_buffer_untouched() {
        let layout = small_layout();
        let mut buffer = vec![0x5Au8; layout.total_size() + 3];
        {
            let mut region =
                SharedRegion::bind_external_with(layout, &mut buffer).expect("bind");
            assert_eq!(region.ownership(), Ownership::External);
            region.release();
            region.release();
        }
        assert!(buffer.iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn external_views_alias_the_buffer() {
        let layout = small_layout();
        let mut buffer = vec![0u8; layout.total_size()];
        {
            let region = SharedRegion::bind_external_with(layout, &mut buffer).expect("bind");
            region.video().write_at(2, &[7, 8, 9]).expect("write");
            region.sound().expect("sound").fill(0xEE);
            region.handshake().publish_screen_ready();
            region.input().set_frame_count(99);
            assert!(region.state().is_none());
        }
        let video = layout.video.offset;
        assert_eq!(&buffer[video + 2..video + 5], &[7, 8, 9]);
        assert_eq!(buffer[CONTROL_OFFSET], 1);
        assert_eq!(&buffer[0..4], &99u32.to_ne_bytes());
        let sound = layout.sound.expect("sound span");
        assert!(buffer[sound.offset..sound.end()].iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn section_writes_are_bounds_checked() {
        let layout = small_layout();
        let mut buffer = vec![0u8; layout.total_size() + 64];
        let region = SharedRegion::bind_external_with(layout, &mut buffer).expect("bind");
        let video = region.video();
        assert!(video.write_at(video.len() - 2, &[1, 2]).is_ok());
        assert_eq!(
            video.write_at(video.len() - 1, &[1, 2]),
            Err(LayoutError::TooSmall {
                required: video.len() + 1,
                actual: video.len()
            })
        );
        assert!(video.write_at(usize::MAX, &[1]).is_err());
    }

    #[test]
    fn write_fields_skips_control_and_optionally_frame_count() {
        let region = SharedRegion::acquire_self_owned().expect("acquire");
        region.handshake().publish_screen_ready();
        region.input().set_frame_count(5);

        let mut record = InputRecord::default();
        record.frame_count = 1234;
        record.control = 0x77;
        record.keychar = b'A';
        record.arg_string[79] = 0x11;

        region.input().write_fields(&record, false);
        let live = region.input().read();
        assert_eq!(live.frame_count, 5);
        assert_eq!(live.control, 1);
        assert_eq!(live.keychar, b'A');
        assert_eq!(live.arg_string[79], 0x11);

        region.input().write_fields(&record, true);
        assert_eq!(region.input().frame_count(), 1234);
        assert_eq!(region.handshake().observe(), Turn::ScreenReady);
    }

    #[test]
    fn raw_binding_rejects_null() {
        // SAFETY: a null pointer is rejected before any access.
        let result = unsafe { SharedRegion::bind_raw(ptr::null_mut(), 1 << 20) };
        assert_eq!(result.err(), Some(LayoutError::NullPointer));
    }

    #[test]
    fn mapped_file_region_is_shared_through_the_file() {
        use std::io::{Read, Seek, SeekFrom};

        let layout = small_layout();
        let mut file = tempfile::tempfile().expect("tempfile");
        file.set_len(layout.total_size() as u64).expect("size file");
        // SAFETY: the temp file is private to this test.
        let map = unsafe { memmap2::MmapMut::map_mut(&file) }.expect("map");
        let mut region = SharedRegion::bind_mapped_with(layout, map).expect("bind");
        region.video().write_at(0, b"frame").expect("write");
        region.release();

        let mut bytes = vec![0u8; 5];
        file.seek(SeekFrom::Start(layout.video.offset as u64))
            .expect("seek");
        file.read_exact(&mut bytes).expect("read");
        assert_eq!(&bytes, b"frame");
    }

    proptest! {
        #[test]
        fn bind_external_accepts_exactly_large_enough_buffers(delta in -64isize..64) {
            let layout = small_layout();
            let len = (layout.total_size() as isize + delta) as usize;
            let mut buffer = vec![0u8; len];
            let result = SharedRegion::bind_external_with(layout, &mut buffer);
            if len < layout.total_size() {
                prop_assert_eq!(
                    result.err(),
                    Some(LayoutError::TooSmall { required: layout.total_size(), actual: len })
                );
            } else {
                prop_assert!(result.is_ok());
            }
        }
    }
}
