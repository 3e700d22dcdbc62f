use anyhow::{anyhow, bail, Context, Result};
use glob::glob;
use std::result::Result as StdResult;

use std::fs;
use std::path::Path;
use std::process::Command;

const INTERPRETER: &str = "../target/release/almaz";

/// Runs every `tests/*.alm` script and compares its stdout with the `.out` file next to it.
/// A script without a `.out` file is expected to fail
fn main() -> Result<()> {
    build_interpreter().context("compiling interpreter")?;

    let scripts: Vec<_> = glob("tests/*.alm")?.collect::<StdResult<_, _>>()?;
    let mut failures = 0;
    for script in &scripts {
        match check_script(script) {
            Ok(()) => println!("{}: passed", script.display()),
            Err(e) => {
                failures += 1;
                println!("{}: failed\n{:#}", script.display(), e);
            }
        }
    }

    println!("{} of {} scripts passed", scripts.len() - failures, scripts.len());
    if failures > 0 {
        bail!("{} scripts failed", failures);
    }
    Ok(())
}

fn check_script(script: &Path) -> Result<()> {
    let output = Command::new(INTERPRETER)
        .arg(script)
        .output()
        .context(format!("running script {}", script.display()))?;
    let stdout = String::from_utf8(output.stdout)?;

    let expected_path = script.with_extension("out");
    if !expected_path.exists() {
        if output.status.success() {
            bail!("expected the script to fail, actual output:\n{}", stdout);
        }
        return Ok(());
    }

    let expected = fs::read_to_string(&expected_path)
        .context(format!("loading expected output: {}", expected_path.display()))?;
    if !output.status.success() {
        bail!(
            "exited with {}, stderr:\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    if stdout != expected {
        bail!("actual output:\n{}", stdout);
    }
    Ok(())
}

fn build_interpreter() -> Result<()> {
    let st = Command::new("cargo")
        .args(["build", "--release", "-p", "almaz"])
        .status()?;
    if st.success() {
        Ok(())
    } else {
        Err(anyhow!("compiling the interpreter failed"))
    }
}
