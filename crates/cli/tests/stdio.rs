//! Pipelines driven through the wrapper's own stdin and stdout.

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn sockwrap(args: &[&str], input: Vec<u8>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_sockwrap"))
        .arg("-q")
        .args(args)
        .env_remove("SOCKWRAP_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    let writer = std::thread::spawn(move || {
        stdin.write_all(&input).unwrap();
    });

    let output = child.wait_with_output().unwrap();
    writer.join().unwrap();
    output
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}

#[test]
fn test_stdin_to_stdout() {
    let data = payload(256 * 1024 + 3);
    let output = sockwrap(&["run", "-c", "tr a-z A-Z | cat"], data.clone());

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(output.stdout, data.to_ascii_uppercase());
}

#[test]
fn test_port_zero_uses_standard_streams() {
    let output = sockwrap(
        &["run", "-i", "0", "-o", "0", "-c", "cat"],
        b"no sockets here".to_vec(),
    );

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(output.stdout, b"no sockets here");
}

#[test]
fn test_named_pipe_to_stdout() {
    let output = sockwrap(
        &["run", "-c", "sh -c 'cat > #PIPE#' | tr a-z A-Z"],
        b"through the fifo".to_vec(),
    );

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(output.stdout, b"THROUGH THE FIFO");
}

#[test]
fn test_failing_source_exit_code() {
    let output = sockwrap(&["run", "-c", "false | cat"], Vec::new());

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}
