use std::{fs, process::Command};

fn gpkg_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gpkg"))
}

#[test]
fn help_and_version_exit_cleanly() {
    for flag in ["--help", "-h", "--version", "-v"] {
        let output = gpkg_cmd().arg(flag).output().unwrap();
        assert!(output.status.success(), "{flag} failed");
        assert!(!output.stdout.is_empty());
    }
}

#[test]
fn bad_arguments_exit_with_one() {
    for args in [&[][..], &["--input"][..], &["--bogus"][..], &["--input", "a"][..]] {
        let output = gpkg_cmd().args(args).output().unwrap();
        assert_eq!(output.status.code(), Some(1), "{args:?}");
        assert!(!output.stderr.is_empty());
    }
}

#[test]
fn builds_an_archive() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a.txt"), "hi").unwrap();
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("a.gpkg");

    let output = gpkg_cmd()
        .arg("--input")
        .arg(input.path())
        .arg("--output")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let mut container = gpkg::archive::ArchiveContainer::open(&path).unwrap();
    assert_eq!(container.read("a.txt").unwrap(), b"hi");
}

#[test]
fn missing_input_directory_fails() {
    let out = tempfile::tempdir().unwrap();
    let output = gpkg_cmd()
        .arg("--input")
        .arg(out.path().join("nope"))
        .arg("--output")
        .arg(out.path().join("a.gpkg"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(!out.path().join("a.gpkg").exists());
}
