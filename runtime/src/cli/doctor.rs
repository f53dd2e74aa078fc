//! Environment readiness check.

use crate::config::Config;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use std::process::Command;

/// One line of the doctor report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub label: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Configuration checks that need no browser or network.
pub fn config_checks(config: &Config) -> Vec<Check> {
    vec![
        Check {
            label: "secret",
            ok: config.secret.is_some(),
            detail: if config.secret.is_some() {
                "QUIZCHAIN_SECRET is set".to_string()
            } else {
                "QUIZCHAIN_SECRET is not set; every solve request will be rejected".to_string()
            },
        },
        Check {
            label: "inference",
            ok: config.llm.token.is_some(),
            detail: if config.llm.token.is_some() {
                format!("model {} via {}", config.llm.model, config.llm.base_url)
            } else {
                "no inference token; pages will be visited but never answered".to_string()
            },
        },
    ]
}

/// Check Chromium availability, configuration, and available memory.
pub async fn run(config: &Config) -> Result<()> {
    println!("Quizchain Doctor");
    println!("================");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium_path = find_chromium(config.chromium_path.as_deref());
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Set QUIZCHAIN_CHROMIUM_PATH or install Chrome."),
    }

    let checks = config_checks(config);
    for check in &checks {
        let sym = if check.ok { "OK" } else { "!!" };
        println!("[{sym}] {}: {}", check.label, check.detail);
    }

    match get_available_memory_mb() {
        Some(mb) if mb >= 512 => println!("[OK] Available memory: {mb}MB"),
        Some(mb) => println!("[!!] Available memory: {mb}MB (< 512MB, Chromium may struggle)"),
        None => println!("[??] Could not determine available memory"),
    }

    println!(
        "     Time budget: {}s per chain",
        config.time_budget.as_secs()
    );

    println!();
    if chromium_path.is_some() && checks.iter().all(|c| c.ok) {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
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
