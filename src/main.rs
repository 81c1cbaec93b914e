//! Main entry point for the rezip CLI application.
//!
//! This binary provides a command-line interface for listing, extracting,
//! creating and updating ZIP archives, including ones protected with the
//! legacy ZipCrypto cipher.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};

use rezip::{Cli, ZipArchive};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the list, extract,
/// create or add handler.
fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.create {
        return create_archive(&cli);
    }
    if cli.add {
        return add_to_archive(&cli);
    }

    let mut archive = ZipArchive::open(Path::new(&cli.file))
        .with_context(|| format!("failed to open {}", cli.file))?;
    archive.set_password(cli.password.as_deref());

    if cli.list || cli.verbose {
        return list_files(&archive, cli.verbose);
    }
    extract_files(&mut archive, &cli)
}

/// Create a new archive from the FILES arguments.
fn create_archive(cli: &Cli) -> Result<()> {
    if cli.files.is_empty() {
        bail!("nothing to add: pass files or directories after the archive name");
    }

    let mut archive = ZipArchive::new();
    archive.set_password(cli.password.as_deref());

    for file in &cli.files {
        let path = Path::new(file);
        if !cli.is_quiet() {
            println!("  adding: {}", file);
        }
        archive
            .add_path(path, "")
            .with_context(|| format!("failed to add {}", file))?;
    }

    archive.save_to_file(Path::new(&cli.file))?;
    if !cli.is_quiet() {
        println!("created {} ({} entries)", cli.file, archive.len());
    }
    Ok(())
}

/// Add the FILES arguments to an existing archive.
fn add_to_archive(cli: &Cli) -> Result<()> {
    let mut archive = ZipArchive::open(Path::new(&cli.file))
        .with_context(|| format!("failed to open {}", cli.file))?;
    archive.set_password(cli.password.as_deref());

    for file in &cli.files {
        if !cli.is_quiet() {
            println!("  adding: {}", file);
        }
        archive
            .add_path(Path::new(file), "")
            .with_context(|| format!("failed to add {}", file))?;
    }

    archive.save_to_file(Path::new(&cli.file))?;
    Ok(())
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files(archive: &ZipArchive, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        let path = entry.path();
        if verbose {
            let (year, month, day, hour, minute, _second) = entry.modified().parts();

            let ratio = compression_ratio(
                u64::from(entry.compressed_size()),
                u64::from(entry.uncompressed_size()),
            );
            let marker = if entry.is_encrypted() { "*" } else { " " };

            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02} {}{}",
                entry.uncompressed_size(),
                entry.compressed_size(),
                ratio,
                year,
                month,
                day,
                hour,
                minute,
                marker,
                path
            );

            if !path.ends_with('/') {
                total_uncompressed += u64::from(entry.uncompressed_size());
                total_compressed += u64::from(entry.compressed_size());
                file_count += 1;
            }
        } else {
            println!("{}", path);
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = compression_ratio(total_compressed, total_uncompressed);
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );
    }

    Ok(())
}

/// Extract files matching the CLI filters.
fn extract_files(archive: &mut ZipArchive, cli: &Cli) -> Result<()> {
    // Apply filters to determine which files to extract:
    // 1. Skip directory entries (created automatically as needed)
    // 2. If specific files are requested, only include matching entries
    // 3. Exclude files matching the exclusion patterns
    let selected: Vec<(String, bool)> = archive
        .entries()
        .iter()
        .map(|e| (e.path(), e.is_encrypted()))
        .filter(|(p, _)| !p.ends_with('/'))
        .filter(|(p, _)| cli.files.is_empty() || cli.files.iter().any(|f| filter_matches(f, p)))
        .filter(|(p, _)| {
            !cli.exclude
                .iter()
                .any(|x| p.contains(x.as_str()) || glob_match(x, p))
        })
        .collect();

    for (path, encrypted) in selected {
        let output_path = output_path_for(&path, cli);

        if output_path.exists() {
            if cli.never_overwrite {
                if !cli.is_quiet() {
                    eprintln!("Skipping: {} (file exists)", path);
                }
                continue;
            }
            if !cli.overwrite {
                if !cli.is_quiet() {
                    eprintln!("Skipping: {} (use -o to overwrite)", path);
                }
                continue;
            }
        }

        if encrypted && cli.password.is_none() {
            bail!("{} is encrypted: pass -P PASSWORD", path);
        }

        if !cli.is_quiet() {
            println!("  extracting: {}", path);
        }

        let data = archive
            .read_entry(&path)
            .with_context(|| format!("failed to read {}", path))?;
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&output_path, data)?;
    }

    Ok(())
}

/// Resolve where an entry should land, honoring `-d` and `-j`.
fn output_path_for(stored: &str, cli: &Cli) -> PathBuf {
    let file_name = if cli.junk_paths {
        // Junk paths: use only the base filename, ignore directory structure
        Path::new(stored)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| stored.to_string())
    } else {
        stored.to_string()
    };

    match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    }
}

/// Match a positional FILES argument against a stored path: glob when the
/// argument has wildcards, otherwise exact match on path or basename.
fn filter_matches(arg: &str, path: &str) -> bool {
    if has_glob_chars(arg) {
        return glob_match(arg, path);
    }
    let basename = Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    path == arg || basename == arg
}

/// Percentage-saved column for the verbose listing.
fn compression_ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed).min(100))
    } else {
        "  0%".to_string()
    }
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    /// Recursive helper using simple backtracking for `*`.
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                // Try matching zero characters (skip the star)
                // OR matching one character (keep the star for more)
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        assert!(glob_match("*.txt", "readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(!glob_match("*.txt", "readme.md"));
        assert!(glob_match("src/*", "src/main.rs"));
    }

    #[test]
    fn filter_exact_and_basename() {
        assert!(filter_matches("readme.txt", "docs/readme.txt"));
        assert!(filter_matches("docs/readme.txt", "docs/readme.txt"));
        assert!(!filter_matches("readme.txt", "docs/other.txt"));
    }
}
