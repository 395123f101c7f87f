// Text and JSON renderings of file identifiers
// Text blocks follow a small YAML-like layout keyed by id or path

use std::path::PathBuf;

use serde::Serialize;

use super::id::{FileC4Id, PathMetadata};
use super::path_utils::{absolute_path, relative_path};

/// Which value heads a formatted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatOrder {
    /// `<id>:` with the path nested under it.
    #[default]
    Id,
    /// `<path>:` with the id nested under it.
    Path,
}

/// Options for [`FileC4Id::format`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub show_path: bool,
    pub show_metadata: bool,
    pub absolute: bool,
    pub order: FormatOrder,
}

impl FormatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, show_path: bool) -> Self {
        self.show_path = show_path;
        self
    }

    pub fn with_metadata(mut self, show_metadata: bool) -> Self {
        self.show_metadata = show_metadata;
        self
    }

    pub fn with_absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn with_order(mut self, order: FormatOrder) -> Self {
        self.order = order;
        self
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    c4id: &'a str,
    path: String,
    bytes: u64,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a PathMetadata>,
}

impl FileC4Id {
    /// The path as it should be displayed under `options`.
    pub fn display_path(&self, options: &FormatOptions) -> PathBuf {
        if options.absolute {
            absolute_path(self.path())
        } else {
            relative_path(self.path())
        }
    }

    /// Render this identifier as text.
    ///
    /// With neither path nor metadata requested, this is the bare identifier.
    /// Metadata is gathered from the filesystem here, on first use.
    pub fn format(&self, options: &FormatOptions) -> String {
        if !(options.show_path || options.show_metadata) {
            return self.id().to_string();
        }

        let path = self.display_path(options);
        let mut lines = match options.order {
            FormatOrder::Id => vec![
                format!("{}:", self.id()),
                format!("  path: \"{}\"", path.display()),
            ],
            FormatOrder::Path => vec![
                format!("{}:", path.display()),
                format!("  c4id: {}", self.id()),
            ],
        };

        if options.show_metadata {
            let meta = self.metadata();
            lines.push(format!("  name:  \"{}\"", meta.name));
            lines.push(format!("  folder:  {}", meta.folder));
            lines.push(format!("  link:  {}", meta.link));
            lines.push(format!("  bytes:  {}", self.bytes()));
        }

        lines.join("\n")
    }

    /// Render as a single-line JSON object.
    pub fn to_json(&self, options: &FormatOptions) -> Result<String, serde_json::Error> {
        let record = JsonRecord {
            c4id: self.id().as_str(),
            path: self.display_path(options).display().to_string(),
            bytes: self.bytes(),
            metadata: options.show_metadata.then(|| self.metadata()),
        };
        serde_json::to_string(&record)
    }
}
