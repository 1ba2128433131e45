#![cfg(all(test, not(target_arch = "wasm32")))]
//! Layout and video sanity checks against the kernel's output.

use frame_loop::{render_dump, transfer_frame, DumpWindow, Engine};
use pretty_assertions::assert_eq;
use services_kernel::{KernelConfig, PatternKernel, TEXT_LEFT, TEXT_TOP};
use shmem_transport::{
    DisplayGeometry, RegionLayout, Sections, SharedRegion, INPUT_SIZE, LAYOUT, SOUND_SIZE,
    STATE_SIZE, TOTAL_SIZE,
};

#[test]
fn section_offsets_follow_protocol_order() {
    let video = 336 * 240;
    let expected = [
        (Sections { sound: false, state: false }, None, None, INPUT_SIZE + video),
        (
            Sections { sound: true, state: false },
            Some(INPUT_SIZE + video),
            None,
            INPUT_SIZE + video + SOUND_SIZE,
        ),
        (
            Sections { sound: false, state: true },
            None,
            Some(INPUT_SIZE + video),
            INPUT_SIZE + video + STATE_SIZE,
        ),
        (
            Sections { sound: true, state: true },
            Some(INPUT_SIZE + video),
            Some(INPUT_SIZE + video + SOUND_SIZE),
            INPUT_SIZE + video + SOUND_SIZE + STATE_SIZE,
        ),
    ];
    for (sections, sound, state, total) in expected {
        let layout = RegionLayout::new(DisplayGeometry::ATARI, sections);
        assert_eq!(layout.input.offset, 0);
        assert_eq!(layout.video.offset, INPUT_SIZE);
        assert_eq!(layout.video.len, video);
        assert_eq!(layout.sound.map(|span| span.offset), sound);
        assert_eq!(layout.state.map(|span| span.offset), state);
        assert_eq!(layout.total_size(), total);
    }
    assert_eq!(TOTAL_SIZE, LAYOUT.total_size());
}

#[test]
fn published_frame_is_the_centered_crop() {
    let mut kernel = PatternKernel::default();
    kernel.run_frame();
    let region = SharedRegion::acquire_self_owned().expect("acquire");
    let report = transfer_frame(&kernel.frame(), &region.video()).expect("transfer");
    assert_eq!((report.width, report.height, report.x_offset), (336, 240, 24));

    let video = region.video().to_vec();
    let background = KernelConfig::default().background;
    // Text area starts at framebuffer column 32, so crop column 8.
    let row = TEXT_TOP * 336;
    assert_eq!(video[row + TEXT_LEFT - 24 - 1], 0);
    assert_eq!(video[row + TEXT_LEFT - 24], background);
    assert_eq!(video[(TEXT_TOP - 1) * 336 + TEXT_LEFT - 24], 0);
}

#[test]
fn dump_of_idle_kernel_is_all_background() {
    let mut kernel = PatternKernel::default();
    kernel.run_frame();
    let region = SharedRegion::acquire_self_owned().expect("acquire");
    transfer_frame(&kernel.frame(), &region.video()).expect("transfer");

    let dump = render_dump(&region.video().to_vec(), &DumpWindow::default());
    for line in dump.lines() {
        assert_eq!(line, ".".repeat(132));
    }
}

#[test]
fn dump_of_fresh_region_is_blank() {
    let region = SharedRegion::acquire_self_owned().expect("acquire");
    let dump = render_dump(&region.video().to_vec(), &DumpWindow::default());
    assert_eq!(dump.lines().count(), 16);
    assert!(dump.lines().all(|line| line.trim().is_empty()));
}
