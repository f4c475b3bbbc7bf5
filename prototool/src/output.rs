use std::io::Write;

use prototool_config::{Failure, Severity};

/// What a command run produced, before exit-code mapping.
pub enum Outcome {
    Clean,
    Failures,
}

impl From<Outcome> for std::process::ExitCode {
    fn from(outcome: Outcome) -> std::process::ExitCode {
        match outcome {
            Outcome::Clean => std::process::ExitCode::SUCCESS,
            Outcome::Failures => std::process::ExitCode::from(1),
        }
    }
}

/// Prints failures one per line in the chosen format and reports whether any
/// of them were errors (warnings alone stay exit 0).
pub fn print_failures(failures: &[Failure], json: bool) -> Outcome {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for failure in failures {
        if json {
            match serde_json::to_string(failure) {
                Ok(line) => {
                    let _ = writeln!(out, "{line}");
                }
                Err(err) => log::debug!("failed to serialize failure: {err}"),
            }
        } else {
            let _ = writeln!(out, "{failure}");
        }
    }
    if failures
        .iter()
        .any(|failure| failure.severity == Severity::Error)
    {
        Outcome::Failures
    } else {
        Outcome::Clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prototool_config::Failure;

    #[test]
    fn warnings_do_not_fail_the_run() {
        let failures = vec![Failure::new("a.proto", 1, 1, "renamed")
            .with_severity(Severity::Warning)];
        assert!(matches!(print_failures(&failures, false), Outcome::Clean));
    }

    #[test]
    fn errors_fail_the_run() {
        let failures = vec![Failure::new("a.proto", 1, 1, "boom")];
        assert!(matches!(print_failures(&failures, true), Outcome::Failures));
    }
}
