//! Build script: embeds the git hash and checks GPU toolkits for whisper backends.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");

    // whisper-rs-sys fails late and cryptically when a toolkit is missing,
    // so fail early with the install hint instead.
    let checks: [(&str, &str, &[&str], &str); 3] = [
        (
            "cuda",
            "nvcc",
            &["--version"],
            "https://developer.nvidia.com/cuda-downloads",
        ),
        (
            "vulkan",
            "vulkaninfo",
            &["--summary"],
            "https://vulkan.lunarg.com/",
        ),
        ("hipblas", "rocminfo", &[], "https://rocm.docs.amd.com/"),
    ];

    for (feature, tool, args, hint) in checks {
        let env_key = format!("CARGO_FEATURE_{}", feature.to_uppercase());
        if std::env::var_os(env_key).is_none() {
            continue;
        }
        if Command::new(tool).args(args).output().is_err() {
            panic!(
                "`{tool}` not found: the `{feature}` feature needs its toolkit.\n\
                 Install: {hint}\n\
                 Or build without it: cargo build --release"
            );
        }
        println!("cargo::warning={feature} toolkit detected");
    }
}
