use std::{
    process::Command,
    time::{Duration, Instant},
};

use assert_fs::{prelude::*, TempDir};

const DEFAULT_SHIFT: &str = "\
Welcome to Magic Airlines.  Our active clerk is Jonah Hill
ticket with id 1 taken
ticket with id 2 taken
Ticket with Channing Tatum completed.  Thanks for choosing to fly with Magic Airlines
Ticket with Matt Maconahaney completed.  Thanks for choosing to fly with Magic Airlines
";

fn counter() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ticket-counter"))
}

#[test]
fn no_arguments_runs_the_default_shift() {
    let before = Instant::now();
    let out = counter().output().unwrap();

    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap(), DEFAULT_SHIFT);
    assert!(before.elapsed() >= Duration::from_millis(900));
}

#[test]
fn simulated_clock_prints_the_same() {
    let out = counter().arg("--simulated").output().unwrap();

    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap(), DEFAULT_SHIFT);
}

#[test]
fn custom_queue() {
    let out = counter()
        .args(["--simulated", "--clerk", "Ada", "--ticket", "9:Grace Hopper"])
        .output()
        .unwrap();

    assert!(out.status.success());
    assert_eq!(
        String::from_utf8(out.stdout).unwrap(),
        "Welcome to Magic Airlines.  Our active clerk is Ada\n\
         ticket with id 9 taken\n\
         Ticket with Grace Hopper completed.  Thanks for choosing to fly with Magic Airlines\n"
    );
}

#[test]
fn bad_ticket_is_rejected() {
    let out = counter().args(["--ticket", "Grace"]).output().unwrap();

    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn output_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("shift.txt");

    let out = counter()
        .args(["--simulated", "--output"])
        .arg(file.path())
        .output()
        .unwrap();

    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    assert_eq!(std::fs::read_to_string(file.path()).unwrap(), DEFAULT_SHIFT);
}
