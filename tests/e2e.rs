use std::process::Command;

fn run(fixture: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_loyalty-eng"))
        .arg(&path)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn valid_commands() {
    let (stdout, stderr, success) = run("valid.csv");

    assert!(success);
    assert!(stderr.is_empty());

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "mason,points,bags,kyc");
    // mason 1: 50 credited for the lift, 40 spent on one trowel
    assert_eq!(lines[1], "1,10,10,none");
    // mason 2: joining bonus after verification
    assert_eq!(lines[2], "2,100,0,verified");
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized row type"));
    assert!(stderr.contains("missing 'bags'"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "mason,points,bags,kyc");
    assert_eq!(lines[1], "1,50,10,none");
}
