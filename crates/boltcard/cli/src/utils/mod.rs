//! Utility functions for the Bolt Card CLI

pub mod display;

use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Print `content`, or write it to `output` when a path is given
pub fn write_output(content: &str, output: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            writeln!(file, "{content}")?;
            println!(
                "{}",
                display::success(&format!("Written to {}", path.display()))
            );
        }
        None => println!("{content}"),
    }
    Ok(())
}
