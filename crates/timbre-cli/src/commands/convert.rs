use anyhow::Result;
use std::path::Path;
use timbre_etl::convert::convert_videos;

pub fn run_convert(input: &Path, output: &Path, ffmpeg: &Path) -> Result<()> {
    let report = convert_videos(input, output, ffmpeg)?;

    println!("\n✓ Converted {} files", report.converted.len());
    if !report.failed.is_empty() {
        println!("✗ Failed {} files:", report.failed.len());
        for (path, reason) in &report.failed {
            println!("    {}: {}", path.display(), reason);
        }
    }

    Ok(())
}
