use std::env;
use std::fs::canonicalize;
use std::process::{Command, Stdio};

type DynError = Box<dyn std::error::Error>;

fn main() {
    if let Err(e) = try_main() {
        eprintln!("{}", e);
        std::process::exit(-1);
    }
}

fn try_main() -> Result<(), DynError> {
    let task = env::args().nth(1);
    match task.as_deref() {
        Some("build") => host_cargo("build")?,
        Some("run") => host_cargo("run")?,
        Some("test") => test()?,
        _ => print_help(),
    }
    Ok(())
}

fn print_help() {
    eprintln!(
        "Tasks:

build           Builds kernels with nightly toolchain and host-code with given arguments
run             Runs host-code with given arguments (e.g. --bin dense_sample -- --check)
test            Runs the library tests of field-sampler and host-code (no kernel build)
"
    )
}

// Builds the kernels first, host-code embeds the PTX at compile time
fn host_cargo(subcommand: &str) -> Result<(), DynError> {
    build_kernels()?;

    let args: Vec<String> = env::args().collect();
    let mut command = Command::new("cargo")
        .current_dir(canonicalize("./host-code")?)
        .arg(subcommand)
        .args(args.into_iter().skip(2))
        .stdout(Stdio::inherit())
        .spawn()?;

    let output = command.wait()?;
    if !output.success() {
        Err(format!("cargo {subcommand} of host-code failed"))?;
    };

    Ok(())
}

fn test() -> Result<(), DynError> {
    let mut command = Command::new("cargo")
        .args(test_args(env::args().skip(2)))
        .spawn()?;
    if !command.wait()?.success() {
        Err("Testing field-sampler and host-code failed")?;
    }
    Ok(())
}

// Library tests only: the dense_sample binary embeds the PTX, the libraries
// never launch a kernel
fn test_args(extra: impl IntoIterator<Item = String>) -> Vec<String> {
    ["test", "--package", "field-sampler", "--package", "field-sampler-host", "--lib"]
        .into_iter()
        .map(String::from)
        .chain(extra)
        .collect()
}

fn build_kernels() -> Result<(), DynError> {
    let capability = cuda_device_capability()?;

    let mut command = Command::new("cargo")
        .current_dir(canonicalize("./kernels")?)
        .arg("+nightly")
        .arg("rustc")
        .arg("--release")
        .arg("--")
        .arg("-C")
        .arg(format!("target-cpu=sm_{capability}"))
        .arg("-Zmir-enable-passes=-JumpThreading")
        .stdout(Stdio::piped())
        .spawn()?;

    let output = command.wait()?;
    if !output.success() {
        Err("Building kernels for device failed")?;
    }
    Ok(())
}

fn cuda_device_capability() -> Result<i32, DynError> {
    let capability = Command::new("nvidia-smi")
        .args(["--query-gpu=compute_cap", "--format=csv,noheader"])
        .output()?;
    let capability = String::from_utf8(capability.stdout)?
        .lines()
        .next()
        .ok_or("nvidia-smi reported no GPU")?
        .trim_end()
        .parse::<f64>()?;
    Ok((capability * 10.).round() as i32)
}
