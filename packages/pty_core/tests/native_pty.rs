#![cfg(unix)]

use pty_core::{NativePty, PtyConfig, PtyCore, Signal};
use std::time::{Duration, Instant};

fn shell(script: &str) -> NativePty {
    NativePty::spawn(PtyConfig::new("/bin/sh").arg("-c").arg(script)).unwrap()
}

fn read_to_end(pty: &NativePty) -> String {
    let mut out = Vec::new();
    while let Some(bytes) = pty.read_blocking().unwrap() {
        out.extend_from_slice(&bytes);
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[test]
fn blocking_reads_until_exit() {
    let pty = shell("printf hello; exit 3");
    assert!(pty.pid().is_some());

    let output = read_to_end(&pty);
    assert!(output.contains("hello"), "unexpected output: {output:?}");
    assert_eq!(pty.exit_code_blocking().unwrap(), 3);
}

#[test]
fn non_blocking_exit_check_waits_for_output_drain() {
    let pty = shell("printf done");

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut output = Vec::new();
    let code = loop {
        if let Some(code) = pty.exit_code_non_blocking().unwrap() {
            // Whatever is still queued is read after the exit is observed
            while let Some(bytes) = pty.read_non_blocking().unwrap() {
                output.extend_from_slice(&bytes);
            }
            break code;
        }
        while let Some(bytes) = pty.read_non_blocking().unwrap() {
            output.extend_from_slice(&bytes);
        }
        assert!(Instant::now() < deadline, "process never exited");
        std::thread::sleep(Duration::from_millis(5));
    };

    assert_eq!(code, 0);
    assert!(String::from_utf8_lossy(&output).contains("done"));
}

#[test]
fn write_reaches_child_stdin() {
    let pty = shell("read line; printf \"got:%s\" \"$line\"");
    pty.write(b"ping\n").unwrap();

    let output = read_to_end(&pty);
    assert!(output.contains("got:ping"), "unexpected output: {output:?}");
    assert_eq!(pty.exit_code_blocking().unwrap(), 0);
}

#[test]
fn kill_terminates_child() {
    let pty = shell("sleep 30");
    pty.resize(120, 40).unwrap();
    assert!(pty.kill(Signal::Kill));

    let _ = read_to_end(&pty);
    assert_ne!(pty.exit_code_blocking().unwrap(), 0);
}

#[test]
fn sigkill_is_not_softened_to_hangup() {
    let pty = shell("trap '' HUP; echo ready; sleep 5; echo survived");

    let mut seen = Vec::new();
    while !String::from_utf8_lossy(&seen).contains("ready") {
        let bytes = pty.read_blocking().unwrap().expect("exited before ready");
        seen.extend_from_slice(&bytes);
    }

    let started = Instant::now();
    assert!(pty.kill(Signal::Kill));
    let output = read_to_end(&pty);
    let code = pty.exit_code_blocking().unwrap();

    assert!(
        started.elapsed() < Duration::from_secs(3),
        "child outlived SIGKILL for {:?}",
        started.elapsed()
    );
    assert!(!output.contains("survived"), "unexpected output: {output:?}");
    assert_ne!(code, 0);
}

#[test]
fn reaped_child_refuses_signals() {
    let pty = shell("exit 0");
    let _ = read_to_end(&pty);
    assert_eq!(pty.exit_code_blocking().unwrap(), 0);

    assert!(!pty.kill(Signal::Term));
    assert!(!pty.kill(Signal::Hangup));
    assert!(!pty.kill(Signal::Kill));
    // Still answers with the recorded status
    assert_eq!(pty.exit_code_blocking().unwrap(), 0);
    assert_eq!(pty.exit_code_non_blocking().unwrap(), Some(0));
}
