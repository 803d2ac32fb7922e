// framereel probe
// Checks a recording and prints what is inside the container

use anyhow::{bail, Context, Result};
use framereel::probe::inspect_file;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let json = args.iter().any(|a| a == "--json");
    let files: Vec<&String> = args.iter().skip(1).filter(|a| !a.starts_with("--")).collect();
    if files.is_empty() {
        eprintln!("Usage: framereel-probe <file>... [--json]");
        std::process::exit(1);
    }

    let mut failures = 0;
    for file in files {
        let info = match inspect_file(file).with_context(|| format!("Failed to inspect {}", file)) {
            Ok(info) => info,
            Err(e) => {
                eprintln!("{:#}", e);
                failures += 1;
                continue;
            }
        };

        if json {
            println!("{}", serde_json::to_string(&info)?);
            continue;
        }

        println!("{}", file);
        println!("  format:    {}", info.format);
        println!("  canvas:    {}x{}", info.width, info.height);
        println!("  frames:    {}", info.frame_count);
        if let Some(declared) = info.declared_frames {
            println!("  declared:  {}", declared);
        }
        if let Some(entries) = info.index_entries {
            println!("  index:     {} entries", entries);
        }
        println!(
            "  timing:    {} us/frame ({:.2} fps, {:.3}s)",
            info.frame_interval_us,
            info.nominal_fps(),
            info.duration_secs()
        );
        if let Some(loops) = info.loop_count {
            let loops = if loops == 0 { "forever".to_string() } else { loops.to_string() };
            println!("  loop:      {}", loops);
        }
        println!("  size:      {} bytes", info.file_size);
        println!("  finalized: {}", if info.finalized { "yes" } else { "NO" });

        if !info.finalized {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} file(s) failed validation", failures);
    }
    Ok(())
}
