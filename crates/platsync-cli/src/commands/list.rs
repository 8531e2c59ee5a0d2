use crate::common::GlobalOpts;
use crate::errors::SyncError;
use colored::Colorize;
use platsync_manifest::{Manifest, ManifestEntry};
use std::path::PathBuf;

pub fn list_platforms(
    opts: &GlobalOpts,
    manifest_path: Option<PathBuf>,
    id: Option<String>,
) -> Result<(), SyncError> {
    let config = opts.load_config()?;
    let path = manifest_path.unwrap_or(config.manifest_path);
    let manifest = Manifest::load_from_path(&path)?;

    if let Some(id) = id {
        let entry = manifest
            .get(&id)
            .ok_or_else(|| SyncError::UnknownPlatform(id.clone()))?;
        show_entry(entry, opts.verbosity_level());
        return Ok(());
    }

    if manifest.is_empty() {
        println!("No platforms published yet ({}).", path.display());
        return Ok(());
    }

    println!("{}", "Platforms:".bold().green());
    for entry in manifest.iter() {
        println!(
            "  {:<20} {:<10} {:<7} {} release(s)",
            entry.id.bold().blue(),
            entry.version,
            entry.language.to_string().dimmed(),
            entry.versions.len()
        );
    }
    Ok(())
}

fn show_entry(entry: &ManifestEntry, verbosity: u8) {
    println!("{} {}", entry.name.bold().blue(), format!("({})", entry.id).dimmed());
    println!("  {}: {}", "version".cyan(), entry.version);
    println!("  {}: {}", "language".cyan(), entry.language);
    println!("  {}: {}", "author".cyan(), entry.author);
    println!("  {}: {}", "requires auth".cyan(), entry.requires_auth);
    println!("  {}: {}", "max threads".cyan(), entry.max_threads);
    if verbosity > 0 {
        println!("  {}: {}", "description".cyan(), entry.description);
    }

    println!("  {}:", "versions".cyan());
    for (version, supported) in entry.versions.iter() {
        let marker = if version == entry.version.as_ref() {
            " (current)".green().to_string()
        } else {
            String::new()
        };
        println!("    {} -> supportedVersion {}{}", version, supported, marker);
    }
}
