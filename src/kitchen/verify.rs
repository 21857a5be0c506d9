// src/kitchen/verify.rs

//! Test step assertions

use crate::error::{Error, Result};
use crate::kitchen::plan::PlannedTest;
use crate::kitchen::runner::StepOutput;

/// Longest slice of output quoted back in a failure
const MAX_QUOTED_OUTPUT: usize = 2000;

/// Check a finished test step against its expectations
///
/// The exit status is checked by the caller; this covers the expected text
/// (a substring of stdout plus stderr) and the expected paths.
pub fn verify_test(step: usize, test: &PlannedTest, output: &StepOutput) -> Result<()> {
    if let Some(expected) = &test.expect_output {
        let combined = output.combined();
        if !combined.contains(expected.as_str()) {
            return Err(Error::VerificationFailed {
                step,
                expected: format!("output containing {:?}", expected),
                actual: quote(&combined),
            });
        }
    }

    for path in &test.expect_paths {
        if !path.exists() {
            return Err(Error::VerificationFailed {
                step,
                expected: path.display().to_string(),
                actual: "missing".to_string(),
            });
        }
    }

    Ok(())
}

fn quote(output: &str) -> String {
    let trimmed = output.trim_end();
    if trimmed.len() <= MAX_QUOTED_OUTPUT {
        return format!("{:?}", trimmed);
    }
    let mut start = trimmed.len() - MAX_QUOTED_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{:?}", &trimmed[start..])
}
