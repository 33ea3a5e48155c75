//! End-to-end tests for the four-point calibration loop over a scripted
//! transport.

use clap::Parser;

use deltacal::{
    grid::FOUR_POINT,
    session::{Outcome, Session},
    settings::{Cli, Config},
    transport::MockTransport,
};

/// Resolve a config from command-line tokens, always with a mock port.
fn config(args: &[&str]) -> Config {
    let mut full = vec!["deltacal", "-p", "mock", "--strategy", "four-point"];
    full.extend_from_slice(args);
    Config::resolve(Cli::parse_from(full))
}

/// Queue one stock-firmware four-point pass: the leveling banner followed
/// by two taps per location, in layout order (Z, X, Y towers, center).
fn push_pass(transport: &mut MockTransport, heights: [f64; 4]) {
    transport.push_line("G29 Auto Bed Leveling");
    for (&(x, y), z) in FOUR_POINT.points.iter().zip(heights) {
        for _ in 0..2 {
            transport.push_line(format!("Bed X: {x:.3} Y: {y:.3} Z: {z:.3}"));
        }
    }
}

#[test]
fn test_two_pass_convergence() {
    let config = config(&[]);
    let mut transport = MockTransport::new();

    // Setup acknowledgements: M92, M665 L, M666, M665 R.
    transport.push_lines(&["ok"; 4]);
    // First pass: X tower 0.02 low, Y tower 0.04 low relative to Z.
    push_pass(&mut transport, [10.02, 10.0, 9.98, 10.0]);
    transport.push_lines(&["ok"; 2]);
    // Second pass: level bed, everything inside tolerance.
    push_pass(&mut transport, [10.0, 10.0, 10.0, 10.0]);

    let mut session = Session::new(transport, &config);
    session.initialize().unwrap();
    let outcome = session.run().unwrap();

    let state = match outcome {
        Outcome::Converged(state) => state,
        other => panic!("expected convergence, got {other:?}"),
    };
    assert_eq!(state.x, -0.02);
    assert_eq!(state.y, -0.04);
    assert_eq!(state.z, 0.0);
    assert_eq!(state.r, 63.5);
    assert_eq!(state.l, 123.0);
    assert_eq!(state.run_count, 2);

    assert_eq!(
        session.printer().transport().sent(),
        [
            "M92 X57.14 Y57.14 Z57.14",
            "M665 L123",
            "M666 X0 Y0 Z0",
            "M665 R63.5",
            "G28",
            "G29 P2 V4",
            "M666 X-0.02 Y-0.04 Z0",
            "M665 R63.5",
            "G28",
            "G29 P2 V4",
        ]
    );
    assert_eq!(session.printer().transport().remaining(), 0);
}

#[test]
fn test_marlin_session_choreography() {
    let config = config(&["--firmware", "marlin"]);
    let mut transport = MockTransport::new();

    // Setup acknowledgements: M92, M665 L, M206, M421 C, M666, M665 R.
    transport.push_lines(&["ok"; 6]);
    // No leveling banner: each G30 answers with a single Bed line.
    for &(x, y) in FOUR_POINT.points {
        for _ in 0..2 {
            transport.push_line(format!("Bed X: {x:.3} Y: {y:.3} Z: 10.000"));
        }
    }

    let mut session = Session::new(transport, &config);
    session.initialize().unwrap();
    let outcome = session.run().unwrap();

    let state = match outcome {
        Outcome::Converged(state) => state,
        other => panic!("expected convergence, got {other:?}"),
    };
    assert_eq!(state.run_count, 1);
    assert_eq!(state.r, 63.5);

    // Marlin init clears home offsets and the stored mesh; acquisition
    // moves to each location and taps twice.
    assert_eq!(
        session.printer().transport().sent(),
        [
            "M92 X57.14 Y57.14 Z57.14",
            "M665 L123",
            "M206 X0 Y0 Z0",
            "M421 C",
            "M666 X0 Y0 Z0",
            "M665 R63.5",
            "G28",
            "G1 Z15 F6000",
            "G1 X0 Y50",
            "G30",
            "G30",
            "G1 X-43.3 Y-25",
            "G30",
            "G30",
            "G1 X43.3 Y-25",
            "G30",
            "G30",
            "G1 X0 Y0",
            "G30",
            "G30",
        ]
    );
    assert_eq!(session.printer().transport().remaining(), 0);
}

#[test]
fn test_bed_temperature_held_across_passes() {
    let config = config(&["--bed-temp", "60"]);
    let mut transport = MockTransport::new();

    // Setup acknowledgements: M140, M92, M665 L, M666, M665 R.
    transport.push_lines(&["ok"; 5]);
    // The mid-pass keep-warm M140 is fire-and-forget, no line queued.
    push_pass(&mut transport, [10.0, 10.0, 10.0, 10.0]);

    let mut session = Session::new(transport, &config);
    session.initialize().unwrap();
    let outcome = session.run().unwrap();

    assert!(matches!(outcome, Outcome::Converged(_)));
    let sent = session.printer().transport().sent();
    assert_eq!(sent[0], "M140 S60");
    assert_eq!(sent[5], "M140 S60");
    assert_eq!(session.printer().transport().remaining(), 0);
}

#[test]
fn test_error_limit_aborts_later_pass() {
    let config = config(&[]);
    let mut transport = MockTransport::new();

    transport.push_lines(&["ok"; 4]);
    push_pass(&mut transport, [10.02, 10.0, 9.98, 10.0]);
    transport.push_lines(&["ok"; 2]);
    // A 2 mm jump between passes means the probe or bed is faulty.
    push_pass(&mut transport, [12.0, 10.0, 10.0, 10.0]);

    let mut session = Session::new(transport, &config);
    session.initialize().unwrap();
    let outcome = session.run().unwrap();

    assert_eq!(
        outcome,
        Outcome::ErrorLimitExceeded {
            magnitude: 2.0,
            limit: 1.0,
            run: 2,
        }
    );
}

#[test]
fn test_first_pass_exempt_from_error_limit() {
    let config = config(&["--max-runs", "2"]);
    let mut transport = MockTransport::new();

    transport.push_lines(&["ok"; 4]);
    // Errors well past the limit are tolerated on the first pass only.
    push_pass(&mut transport, [12.0, 10.0, 10.0, 10.0]);
    transport.push_lines(&["ok"; 2]);
    push_pass(&mut transport, [10.0, 10.0, 10.0, 10.0]);

    let mut session = Session::new(transport, &config);
    session.initialize().unwrap();
    let outcome = session.run().unwrap();

    assert!(matches!(outcome, Outcome::Converged(_)));
}

#[test]
fn test_run_budget_exhausted() {
    let config = config(&["--max-runs", "3"]);
    let mut transport = MockTransport::new();

    transport.push_lines(&["ok"; 4]);
    for _ in 0..3 {
        // The Y tower never quite recovers, so no pass converges.
        push_pass(&mut transport, [10.0, 10.0, 9.96, 10.0]);
        transport.push_lines(&["ok"; 2]);
    }

    let mut session = Session::new(transport, &config);
    session.initialize().unwrap();
    let outcome = session.run().unwrap();

    assert_eq!(outcome, Outcome::MaxRunsExceeded { max_runs: 3 });
    assert_eq!(session.state().run_count, 4);
    // Full gain on the first pass, half gain once the budget is half spent.
    assert_eq!(session.state().y, -0.08);

    let sent = session.printer().transport().sent();
    assert_eq!(sent.iter().filter(|c| c.starts_with("G29")).count(), 3);
    assert_eq!(session.printer().transport().remaining(), 0);
}

#[test]
fn test_eeprom_load_and_store() {
    let config = config(&["--load-eeprom", "--write-eeprom"]);
    let mut transport = MockTransport::new();

    // M503 S0 settings dump.
    transport.push_line("echo: stepper driver settings");
    transport.push_line("M666 X-0.1 Y-0.2 Z-0.3");
    transport.push_line("M665 L123.00 R63.2");
    // Setup acknowledgements: M92, M665 L, M666, M665 R.
    transport.push_lines(&["ok"; 4]);
    push_pass(&mut transport, [10.0, 10.0, 10.0, 10.0]);
    transport.push_line("Settings Stored");

    let mut session = Session::new(transport, &config);
    session.initialize().unwrap();
    let outcome = session.run().unwrap();

    let state = match outcome {
        Outcome::Converged(state) => state,
        other => panic!("expected convergence, got {other:?}"),
    };
    assert_eq!(state.x, -0.1);
    assert_eq!(state.r, 63.2);

    let sent = session.printer().transport().sent();
    assert_eq!(sent[0], "M503 S0");
    assert_eq!(sent[3], "M666 X-0.1 Y-0.2 Z-0.3");
    assert_eq!(sent[4], "M665 R63.2");
    assert_eq!(sent.last().map(String::as_str), Some("M500"));
}
