use std::env;
use std::process::Command;

/// Short commit hash, preferring the GASVM_GIT_SHA override used by packaged builds.
fn commit_sha() -> Option<String> {
    if let Ok(sha) = env::var("GASVM_GIT_SHA") {
        let sha = sha.trim().to_string();
        return if sha.is_empty() { None } else { Some(sha) };
    }

    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    println!("cargo:rerun-if-env-changed=GASVM_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    if let Some(sha) = commit_sha() {
        println!("cargo:rustc-env=GASVM_GIT_SHA={}", sha);
    }
}
