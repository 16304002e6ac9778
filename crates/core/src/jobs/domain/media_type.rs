use std::path::Path;

/// Minimum bytes needed to tell formats apart.
pub const SNIFF_MIN_BYTES: usize = 12;
const MATROSKA_DOCTYPE_WINDOW: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Video,
}

/// A container format recognised from its leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SniffedMedia {
    pub class: MediaClass,
    /// Canonical extension, e.g. `jpg`, `tiff`, `mkv`.
    pub extension: &'static str,
}

impl SniffedMedia {
    const fn image(extension: &'static str) -> Option<Self> {
        Some(Self {
            class: MediaClass::Image,
            extension,
        })
    }

    const fn video(extension: &'static str) -> Option<Self> {
        Some(Self {
            class: MediaClass::Video,
            extension,
        })
    }
}

/// Identifies the media type from magic bytes; `None` if unknown or too short.
pub fn sniff(data: &[u8]) -> Option<SniffedMedia> {
    if data.len() < SNIFF_MIN_BYTES {
        return None;
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return SniffedMedia::image("jpg");
    }
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return SniffedMedia::image("png");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return SniffedMedia::image("gif");
    }
    if data.starts_with(b"BM") {
        return SniffedMedia::image("bmp");
    }
    if data.starts_with(b"II*\x00") || data.starts_with(b"MM\x00*") {
        return SniffedMedia::image("tiff");
    }
    if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return SniffedMedia::image("webp");
    }
    if &data[4..8] == b"ftyp" {
        return if &data[8..12] == b"qt  " {
            SniffedMedia::video("mov")
        } else {
            SniffedMedia::video("mp4")
        };
    }
    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        let window = &data[..data.len().min(MATROSKA_DOCTYPE_WINDOW)];
        let is_webm = window
            .windows(4)
            .any(|w| w.eq_ignore_ascii_case(b"webm"));
        return if is_webm {
            SniffedMedia::video("webm")
        } else {
            SniffedMedia::video("mkv")
        };
    }
    if data.starts_with(b"RIFF") && &data[8..12] == b"AVI " {
        return SniffedMedia::video("avi");
    }
    None
}

/// Lowercased extension without the dot, or `None` if there is none.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether a file's extension is consistent with its sniffed format.
pub fn extension_matches(extension: &str, sniffed: &str) -> bool {
    canonical(extension) == canonical(sniffed)
}

fn canonical(extension: &str) -> &str {
    match extension {
        "jpeg" => "jpg",
        "tif" => "tiff",
        "webm" => "mkv",
        other => other,
    }
}
