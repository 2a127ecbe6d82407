//! Tests for stack snapshots and their rendering

use super::common::{park_helper, serial};
use crate::core::banner::ReportFormatter;
use crate::services::snapshot::{Frame, StackSnapshotter, ThreadSnapshot, render_frames};
use crate::services::threads::current_ident;
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_render_frames_with_source() {
    let mut source = tempfile::NamedTempFile::new().unwrap();
    writeln!(source, "fn main() {{").unwrap();
    writeln!(source, "    do_work();").unwrap();
    writeln!(source, "}}").unwrap();

    let frames = vec![
        Frame {
            function: "demo::main".to_string(),
            file: Some(source.path().to_path_buf()),
            line: Some(2),
        },
        Frame {
            function: "libc_start".to_string(),
            file: None,
            line: None,
        },
    ];

    let text = render_frames(&frames);
    let expected = format!(
        "  File \"{}\", line 2, in demo::main\n    do_work();\n  File \"<unknown>\", line ?, in libc_start\n",
        source.path().display()
    );
    assert_eq!(text, expected);
}

#[test]
fn test_render_frames_missing_source_file() {
    let frames = vec![Frame {
        function: "gone::away".to_string(),
        file: Some(PathBuf::from("/nonexistent/src/lib.rs")),
        line: Some(10),
    }];
    assert_eq!(
        render_frames(&frames),
        "  File \"/nonexistent/src/lib.rs\", line 10, in gone::away\n"
    );
}

#[test]
fn test_snapshot_title() {
    let snapshot = ThreadSnapshot {
        ident: 4242,
        name: "MainThread".to_string(),
        frames: vec![],
    };
    assert_eq!(snapshot.title(), "Stack of MainThread (4242)");
}

#[test]
fn test_snapshot_excludes_caller() {
    let _serial = serial();
    let snapshotter = StackSnapshotter::new(ReportFormatter::new().with_width(40));
    let current = current_ident();

    let snapshots = snapshotter.snapshot(Some(current));
    assert!(snapshots.iter().all(|snapshot| snapshot.ident != current));

    let with_caller = snapshotter.snapshot(None);
    let mine = with_caller
        .iter()
        .find(|snapshot| snapshot.ident == current)
        .expect("caller is captured directly");
    assert!(!mine.frames.is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_dump_names_registered_helper() {
    let _serial = serial();
    let (helper, release, handle) = park_helper("snapshot-helper");
    let snapshotter = StackSnapshotter::new(ReportFormatter::new().with_width(40));

    let snapshots = snapshotter.snapshot(Some(current_ident()));
    let dump = snapshotter.dump(Some(current_ident()));

    release.send(()).unwrap();
    handle.join().unwrap();

    let sampled = snapshots
        .iter()
        .find(|snapshot| snapshot.ident == helper)
        .expect("helper thread sampled");
    assert_eq!(sampled.name, "snapshot-helper");
    assert!(!sampled.frames.is_empty());
    assert!(
        sampled
            .frames
            .iter()
            .all(|frame| !frame.function.contains("sampler::on_sample"))
    );
    assert!(dump.contains(&format!("Stack of snapshot-helper ({helper})")));
}

#[cfg(target_os = "linux")]
#[test]
fn test_unregistered_threads_are_unknown() {
    let _serial = serial();
    let (ident_tx, ident_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let handle = std::thread::spawn(move || {
        ident_tx.send(current_ident()).unwrap();
        let _ = release_rx.recv();
    });
    let ident = ident_rx.recv().unwrap();

    let snapshots = StackSnapshotter::new(ReportFormatter::new()).snapshot(None);

    release_tx.send(()).unwrap();
    handle.join().unwrap();

    let anonymous = snapshots
        .iter()
        .find(|snapshot| snapshot.ident == ident)
        .expect("anonymous thread sampled");
    assert_eq!(anonymous.name, "<unknown>");
}
