use tokio::process::Command;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = ((bytes_f.log10() / THRESHOLD.log10()).floor() as usize).min(UNITS.len() - 1);
    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Short human form of an elapsed time, e.g. `1m 30s`
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Map a bare language (`en`, `chinese`) to the regional code the speech
/// service expects. Codes that already carry a region pass through.
pub fn normalize_language_code(lang: &str) -> String {
    let normalized = match lang.trim().to_lowercase().as_str() {
        "en" | "english" => "en-US",
        "es" | "spanish" => "es-ES",
        "fr" | "french" => "fr-FR",
        "de" | "german" => "de-DE",
        "it" | "italian" => "it-IT",
        "pt" | "portuguese" => "pt-BR",
        "ja" | "japanese" => "ja-JP",
        "ko" | "korean" => "ko-KR",
        "zh" | "chinese" => "zh-CN",
        "ar" | "arabic" => "ar-SA",
        "hi" | "hindi" => "hi-IN",
        "ru" | "russian" => "ru-RU",
        _ => return lang.trim().to_string(),
    };

    normalized.to_string()
}

/// External tools the audio fallback shells out to that are missing from PATH
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("yt-dlp").await {
        missing.push("yt-dlp - required to download audio for transcription".to_string());
    }

    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required to convert audio to 16 kHz mono WAV".to_string());
    }

    missing
}

pub async fn check_command_available(command: &str) -> bool {
    // ffmpeg only understands -version
    let flag = if command == "ffmpeg" { "-version" } else { "--version" };

    Command::new(command)
        .arg(flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(32 * 1024 * 1024), "32.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
        assert_eq!(format_duration(-2.0), "0s");
    }

    #[test]
    fn test_normalize_language_code() {
        assert_eq!(normalize_language_code("en"), "en-US");
        assert_eq!(normalize_language_code("Chinese"), "zh-CN");
        assert_eq!(normalize_language_code(" zh "), "zh-CN");
        assert_eq!(normalize_language_code("zh-TW"), "zh-TW");
        assert_eq!(normalize_language_code("pt-PT"), "pt-PT");
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        assert!(!check_command_available("definitely-not-a-real-binary-3f9a").await);
    }
}
