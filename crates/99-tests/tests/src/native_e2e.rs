#![cfg(all(test, not(target_arch = "wasm32")))]

use frame_loop::{
    render_dump, DumpWindow, FrameCounterOwner, FrameLoop, HostDriver, LoopConfig, RunSummary,
    JOY_CENTRE,
};
use memmap2::MmapMut;
use parking_lot::Mutex;
use services_kernel::PatternKernel;
use shmem_transport::{
    InputRecord, PollPolicy, SharedRegion, Turn, WaitResult, CONTROL_EXIT_ALT, TOTAL_SIZE,
};
use std::fs::OpenOptions;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL: PollPolicy = PollPolicy::new(Duration::from_micros(200));

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn deadline() -> Option<Instant> {
    Some(Instant::now() + Duration::from_secs(10))
}

fn idle_input() -> InputRecord {
    let mut record = InputRecord::default();
    for port in 0..4 {
        record.set_joystick(port, JOY_CENTRE, false);
    }
    record
}

fn loop_config() -> LoopConfig {
    LoopConfig {
        poll: POLL,
        ..LoopConfig::default()
    }
}

fn spawn_kernel(
    region: Arc<SharedRegion<'static>>,
    config: LoopConfig,
) -> thread::JoinHandle<RunSummary> {
    thread::spawn(move || {
        let mut kernel = PatternKernel::default();
        FrameLoop::new(&region, config)
            .run(&mut kernel)
            .expect("frame loop")
    })
}

fn map_file(path: &Path) -> MmapMut {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .expect("open");
    file.set_len(TOTAL_SIZE as u64).expect("set_len");
    // SAFETY: the file lives in a private temp dir for the duration of the test.
    unsafe { MmapMut::map_mut(&file) }.expect("map")
}

#[test]
fn host_types_text_into_kernel() {
    init_logging();
    let region = Arc::new(SharedRegion::acquire_self_owned().expect("acquire"));
    region.handshake().publish_screen_ready();
    let emulator = spawn_kernel(Arc::clone(&region), loop_config());

    let host = HostDriver::new(&region).with_poll(POLL);
    for key in [b'H', 0, b'I', 0] {
        assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
        let mut record = idle_input();
        record.keychar = key;
        host.submit(&record);
    }
    assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
    assert_eq!(host.frame_count(), 4);

    let mut video = vec![0u8; region.video().len()];
    assert_eq!(host.read_video(&mut video), video.len());
    host.request_exit();
    assert_eq!(emulator.join().expect("join").frames, 4);

    let dump = render_dump(&video, &DumpWindow::default());
    let line = dump.lines().nth(1).expect("second row");
    assert_eq!(&line[..16], ".XXXXXX..XXXXXX.");
}

#[test]
fn alternate_exit_value_stops_the_loop() {
    init_logging();
    let region = Arc::new(SharedRegion::acquire_self_owned().expect("acquire"));
    let emulator = spawn_kernel(Arc::clone(&region), loop_config());

    // The region starts at zero, so the first frame runs without host input.
    let host = HostDriver::new(&region).with_poll(POLL);
    assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
    region.handshake().store_raw(CONTROL_EXIT_ALT);

    let summary = emulator.join().expect("join");
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.exit_value, Some(CONTROL_EXIT_ALT));
    assert_eq!(region.handshake().observe(), Turn::Exit);
}

#[test]
fn loop_waits_out_a_corrupt_control_byte() {
    init_logging();
    let region = Arc::new(SharedRegion::acquire_self_owned().expect("acquire"));
    region.handshake().store_raw(0x55);
    let emulator = spawn_kernel(Arc::clone(&region), loop_config());

    thread::sleep(Duration::from_millis(20));
    assert_eq!(region.input().frame_count(), 0);
    assert_eq!(region.handshake().raw(), 0x55);

    let host = HostDriver::new(&region).with_poll(POLL);
    host.submit(&idle_input());
    assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
    host.request_exit();

    let summary = emulator.join().expect("join");
    assert_eq!(summary.frames, 1);
    assert!(summary.desync_polls > 0);
}

#[test]
fn host_owned_counter_survives_the_round_trip() {
    init_logging();
    let region = Arc::new(SharedRegion::acquire_self_owned().expect("acquire"));
    region.handshake().publish_screen_ready();
    let config = LoopConfig {
        frame_counter: FrameCounterOwner::Host,
        ..loop_config()
    };
    let emulator = spawn_kernel(Arc::clone(&region), config);

    let host = HostDriver::new(&region)
        .with_poll(POLL)
        .writing_frame_count(true);
    for frame in [10u32, 20, 30] {
        assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
        let mut record = idle_input();
        record.frame_count = frame;
        host.submit(&record);
    }
    assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
    assert_eq!(host.frame_count(), 30);
    host.request_exit();
    assert_eq!(emulator.join().expect("join").frames, 3);
}

#[test]
fn checkpoints_fire_on_the_interval() {
    init_logging();
    let region = Arc::new(SharedRegion::acquire_self_owned().expect("acquire"));
    region.handshake().publish_screen_ready();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let emulator = {
        let region = Arc::clone(&region);
        let seen = Arc::clone(&seen);
        thread::spawn(move || {
            let config = LoopConfig {
                checkpoint_interval: NonZeroU32::new(3),
                ..loop_config()
            };
            let mut kernel = PatternKernel::default();
            FrameLoop::new(&region, config)
                .with_checkpoint(|frame, region| {
                    // Still the emulation side's turn while the callback runs.
                    assert_eq!(region.handshake().observe(), Turn::InputReady);
                    seen.lock().push(frame);
                })
                .run(&mut kernel)
                .expect("frame loop")
        })
    };

    let host = HostDriver::new(&region).with_poll(POLL);
    for _ in 0..10 {
        assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
        host.submit(&idle_input());
    }
    assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
    host.request_exit();

    assert_eq!(emulator.join().expect("join").frames, 10);
    assert_eq!(*seen.lock(), vec![3, 6, 9]);
}

#[test]
fn separate_mappings_of_one_file_talk() {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("frames.shm");

    let host_region = SharedRegion::bind_mapped(map_file(&path)).expect("host bind");
    host_region.handshake().publish_screen_ready();

    let emulator = {
        let path = path.clone();
        thread::spawn(move || {
            let region = SharedRegion::bind_mapped(map_file(&path)).expect("loop bind");
            let mut kernel = PatternKernel::default();
            let summary = FrameLoop::new(&region, loop_config())
                .run(&mut kernel)
                .expect("frame loop");
            summary
        })
    };

    let host = HostDriver::new(&host_region).with_poll(POLL);
    for key in [b'Z', 0] {
        assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
        let mut record = idle_input();
        record.keychar = key;
        host.submit(&record);
    }
    assert_eq!(host.wait_for_screen(deadline()), WaitResult::Ok(()));
    assert_eq!(host.frame_count(), 2);
    host.request_exit();
    assert_eq!(emulator.join().expect("join").frames, 2);

    let dump = render_dump(&host_region.video().to_vec(), &DumpWindow::default());
    assert!(dump.lines().nth(1).expect("row").starts_with(".XXXXXX."));
}
