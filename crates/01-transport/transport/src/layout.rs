//! Compile-time layout of the shared region.
//!
//! Sections are packed back to back in a fixed order: Input, Video, then the
//! optional Sound and State-save sections. Every offset and size is a pure
//! function of the [`DisplayGeometry`] and the [`Sections`] enabled for the
//! build, so host and emulation binaries built with the same options agree on
//! the layout without any runtime negotiation.

use crate::schema::INPUT_RECORD_SIZE;

/// Bytes reserved for the Input section.
pub const INPUT_SIZE: usize = INPUT_RECORD_SIZE;
/// Bytes reserved for the Sound section when it is built in.
pub const SOUND_SIZE: usize = 4096;
/// Bytes reserved for the State-save section when it is built in.
pub const STATE_SIZE: usize = 210_000;

/// Framebuffer and usable crop dimensions, one byte per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayGeometry {
    /// Width of the engine's internal framebuffer (row stride).
    pub framebuffer_width: usize,
    /// Height of the engine's internal framebuffer.
    pub framebuffer_height: usize,
    /// Largest visible width the Video section can hold.
    pub usable_width: usize,
    /// Largest visible height the Video section can hold.
    pub usable_height: usize,
}

impl DisplayGeometry {
    /// 384-wide framebuffer with the middle 336 columns published.
    pub const ATARI: DisplayGeometry = DisplayGeometry {
        framebuffer_width: 384,
        framebuffer_height: 240,
        usable_width: 336,
        usable_height: 240,
    };

    /// Size in bytes of a full usable frame.
    pub const fn video_size(&self) -> usize {
        self.usable_width * self.usable_height
    }

    /// Horizontal offset that centers `visible_width` in the framebuffer.
    pub const fn centered_offset(framebuffer_width: usize, visible_width: usize) -> usize {
        framebuffer_width.saturating_sub(visible_width) / 2
    }
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        Self::ATARI
    }
}

/// Optional sections included in the region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sections {
    pub sound: bool,
    pub state: bool,
}

impl Sections {
    /// Sections selected by the `sound` and `statesav` cargo features.
    pub const BUILD: Sections = Sections {
        sound: cfg!(feature = "sound"),
        state: cfg!(feature = "statesav"),
    };

    /// Every combination of optional sections.
    pub const ALL: [Sections; 4] = [
        Sections {
            sound: false,
            state: false,
        },
        Sections {
            sound: true,
            state: false,
        },
        Sections {
            sound: false,
            state: true,
        },
        Sections {
            sound: true,
            state: true,
        },
    ];
}

/// Offset/length pair of one section relative to the region base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionSpan {
    pub offset: usize,
    pub len: usize,
}

impl SectionSpan {
    /// First byte past the section.
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Resolved section table for one build configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionLayout {
    pub geometry: DisplayGeometry,
    pub input: SectionSpan,
    pub video: SectionSpan,
    pub sound: Option<SectionSpan>,
    pub state: Option<SectionSpan>,
    total: usize,
}

impl RegionLayout {
    /// Packs the sections for `geometry` and `sections` in protocol order.
    pub const fn new(geometry: DisplayGeometry, sections: Sections) -> Self {
        assert!(geometry.usable_width <= geometry.framebuffer_width);
        assert!(geometry.usable_height <= geometry.framebuffer_height);

        let input = SectionSpan {
            offset: 0,
            len: INPUT_SIZE,
        };
        let video = SectionSpan {
            offset: input.end(),
            len: geometry.video_size(),
        };
        let mut cursor = video.end();

        let sound = if sections.sound {
            let span = SectionSpan {
                offset: cursor,
                len: SOUND_SIZE,
            };
            cursor = span.end();
            Some(span)
        } else {
            None
        };

        let state = if sections.state {
            let span = SectionSpan {
                offset: cursor,
                len: STATE_SIZE,
            };
            cursor = span.end();
            Some(span)
        } else {
            None
        };

        Self {
            geometry,
            input,
            video,
            sound,
            state,
            total: cursor,
        }
    }

    /// Total number of bytes the region must provide.
    pub const fn total_size(&self) -> usize {
        self.total
    }

    /// Which optional sections this layout carries.
    pub const fn sections(&self) -> Sections {
        Sections {
            sound: self.sound.is_some(),
            state: self.state.is_some(),
        }
    }

    /// Sections in protocol order, absent ones skipped.
    pub fn spans(&self) -> impl Iterator<Item = (&'static str, SectionSpan)> {
        [
            Some(("input", self.input)),
            Some(("video", self.video)),
            self.sound.map(|span| ("sound", span)),
            self.state.map(|span| ("state", span)),
        ]
        .into_iter()
        .flatten()
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        LAYOUT
    }
}

/// Layout of this build.
pub const LAYOUT: RegionLayout = RegionLayout::new(DisplayGeometry::ATARI, Sections::BUILD);
/// Total region size of this build.
pub const TOTAL_SIZE: usize = LAYOUT.total_size();
