use super::Category;

pub(super) struct CatalogEntry {
    pub short_name: &'static str,
    /// Package name below the scope prefix.
    pub package: &'static str,
    pub category: Category,
    pub system_requirements: &'static [&'static str],
    /// Short name of the canonical entry this one aliases.
    pub alias_of: Option<&'static str>,
}

const fn entry(
    short_name: &'static str,
    package: &'static str,
    category: Category,
    system_requirements: &'static [&'static str],
) -> CatalogEntry {
    CatalogEntry {
        short_name,
        package,
        category,
        system_requirements,
        alias_of: None,
    }
}

const fn alias(short_name: &'static str, target: &'static str) -> CatalogEntry {
    CatalogEntry {
        short_name,
        package: "",
        category: Category::Core,
        system_requirements: &[],
        alias_of: Some(target),
    }
}

// Declaration order is display order. Aliases must follow their target.
pub(super) const CATALOG: &[CatalogEntry] = &[
    entry("image", "image", Category::Core, &[]),
    alias("img", "image"),
    entry("video", "video", Category::Core, &["ffmpeg"]),
    alias("vid", "video"),
    entry("audio", "audio", Category::Core, &["ffmpeg"]),
    entry("document", "document", Category::Core, &["ghostscript"]),
    alias("doc", "document"),
    alias("pdf", "document"),
    entry("animation", "animation", Category::Advanced, &["ffmpeg", "gifsicle"]),
    alias("gif", "animation"),
    entry("subtitle", "subtitle", Category::Advanced, &["ffmpeg"]),
    entry("stream", "stream", Category::Advanced, &["ffmpeg"]),
    entry("model", "model", Category::Experimental, &["blender"]),
    alias("3d", "model"),
    entry("ai", "ai", Category::Experimental, &["python3"]),
];
