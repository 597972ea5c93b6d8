use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Image,
    Video,
    Audio,
    Document,
    Model,
    Unknown,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Image => "image",
            Domain::Video => "video",
            Domain::Audio => "audio",
            Domain::Document => "document",
            Domain::Model => "model",
            Domain::Unknown => "unknown",
        }
    }

    /// Short name of the capability serving this domain.
    pub fn capability(self) -> Option<&'static str> {
        match self {
            Domain::Unknown => None,
            known => Some(known.as_str()),
        }
    }

    pub fn is_known(self) -> bool {
        self != Domain::Unknown
    }
}

pub const DOMAIN_EXTENSIONS: &[(Domain, &[&str])] = &[
    (
        Domain::Image,
        &[
            "jpg", "jpeg", "png", "gif", "webp", "avif", "heic", "heif", "tif", "tiff", "bmp",
            "svg", "ico",
        ],
    ),
    (
        Domain::Video,
        &[
            "mp4", "mov", "mkv", "avi", "webm", "m4v", "flv", "wmv", "mpg", "mpeg",
        ],
    ),
    (
        Domain::Audio,
        &[
            "mp3", "wav", "flac", "aac", "ogg", "m4a", "opus", "wma", "aiff",
        ],
    ),
    (
        Domain::Document,
        &[
            "pdf", "doc", "docx", "odt", "rtf", "txt", "md", "html", "epub", "ppt", "pptx", "xls",
            "xlsx",
        ],
    ),
    (
        Domain::Model,
        &["obj", "fbx", "gltf", "glb", "stl", "ply", "usdz", "dae", "3ds"],
    ),
];

/// Domain for an already-lowercased extension without the dot.
pub fn domain_for_extension(extension: &str) -> Domain {
    DOMAIN_EXTENSIONS
        .iter()
        .find(|(_, extensions)| extensions.contains(&extension))
        .map(|(domain, _)| *domain)
        .unwrap_or(Domain::Unknown)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn extensions_belong_to_one_domain() {
        let mut seen = HashSet::new();
        for (_, extensions) in DOMAIN_EXTENSIONS {
            for ext in *extensions {
                assert!(seen.insert(*ext), "extension {} listed twice", ext);
                assert_eq!(*ext, ext.to_ascii_lowercase());
            }
        }
    }

    #[test]
    fn unknown_has_no_capability() {
        assert_eq!(Domain::Unknown.capability(), None);
        assert_eq!(Domain::Document.capability(), Some("document"));
        assert_eq!(domain_for_extension("zip"), Domain::Unknown);
        assert_eq!(domain_for_extension("glb"), Domain::Model);
    }
}
