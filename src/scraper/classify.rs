//! Decides whether a listing entry points straight at a downloadable file.

use url::Url;

/// Extensions treated as files rather than article pages.
pub const FILE_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "svg",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // archives
    "zip", "rar", "tar", "gz", "7z",
    // audio
    "mp3", "wav", "ogg", "flac",
    // video
    "mp4", "avi", "mkv", "mov", "wmv",
    // saved web archives
    "mht",
];

/// True when the URL path ends in a known file extension (case-insensitive).
pub fn is_terminal_file(url: Option<&str>) -> bool {
    let Some(url) = url else { return false };

    match extension(url) {
        Some(ext) => FILE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Substring after the final `.` of the URL path.
/// Query and fragment are ignored; unparseable input is treated as a bare path.
fn extension(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    path.rsplit_once('.').map(|(_, ext)| ext.to_string())
}
