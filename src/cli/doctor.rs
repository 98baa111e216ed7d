//! Environment readiness check.

use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;

use crate::driver::chromium::find_chromium;

/// Check Chromium availability, output directory, and available memory.
pub async fn run() -> Result<()> {
    println!("Ilanharvest Doctor");
    println!("==================");
    println!();

    // OS and architecture
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Check Chromium
    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Google Chrome or Chromium, or set ILANHARVEST_CHROMIUM_PATH."
        ),
    }

    // Check that the working directory takes writes (the CSV lands here
    // by default)
    match probe_writable() {
        Ok(dir) => println!("[OK] Output directory {} is writable", dir.display()),
        Err(e) => println!("[!!] Output directory is not writable: {e}"),
    }

    // Check available memory
    let mem_mb = get_available_memory_mb();
    match mem_mb {
        Some(mb) => {
            if mb >= 512 {
                println!("[OK] Available memory: {mb}MB (>= 512MB required for the browser)");
            } else {
                println!("[!!] Available memory: {mb}MB (< 512MB, Chromium may struggle)");
            }
        }
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    let ready = chromium_path.is_some();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
        println!("  Install Google Chrome or Chromium and re-run `ilanharvest doctor`.");
    }

    Ok(())
}

/// Try writing (and removing) a probe file in the working directory.
fn probe_writable() -> Result<PathBuf> {
    let dir = std::env::current_dir()?;
    let probe = dir.join(".ilanharvest-doctor-probe");
    std::fs::write(&probe, b"probe")?;
    std::fs::remove_file(&probe)?;
    Ok(dir)
}

/// Get available memory in MB (platform-specific).
fn get_available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        for line in s.lines() {
            if line.starts_with("Mem:") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 7 {
                    return parts[6].parse().ok();
                }
            }
        }
        None
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
