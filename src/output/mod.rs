use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::resolver::ResolvedTranscript;

/// Formatted transcript, one line per utterance or caption cue
pub fn format_as_text(resolved: &ResolvedTranscript) -> String {
    resolved.transcript.formatted_transcript.clone()
}

/// Full result including the raw transcript and any stored audio reference
pub fn format_as_json(resolved: &ResolvedTranscript) -> Result<String> {
    Ok(serde_json::to_string_pretty(resolved)?)
}

fn render(resolved: &ResolvedTranscript, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(resolved)),
        OutputFormat::Json => format_as_json(resolved),
    }
}

/// Save resolved transcript to file
pub fn save_to_file(resolved: &ResolvedTranscript, path: &Path, format: OutputFormat) -> Result<()> {
    fs_err::write(path, render(resolved, format)?)?;
    Ok(())
}

/// Print resolved transcript to console
pub fn print_to_console(resolved: &ResolvedTranscript, format: OutputFormat) -> Result<()> {
    println!("{}", render(resolved, format)?);
    Ok(())
}
