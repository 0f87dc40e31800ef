//! XML file store: one `<codeset>` document per registry.
//!
//! ## Layout
//!
//! ```text
//! <sets_dir>/Vaccination CVX Code.xml
//! <sets_dir>/Vaccine Group.xml
//! ...
//! ```
//!
//! Each document carries the registry label, its type tag and the codes
//! sorted by value. Saving replaces the whole file through a temporary
//! sibling and a rename.
//!
//! ## Unmodelled elements
//!
//! Children of `<codeset>` or `<code>` that the model has no field for are
//! cut out of the text before deserializing and kept verbatim on the
//! registry or code. Saving writes them back as the last children of their
//! parent:
//!
//! ```text
//! <code>                                  <code>
//!     <useAge>..</useAge>                   <value>IM</value>
//!     <value>IM</value>          ->         <useAge>..</useAge>
//! </code>                                 </code>
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::types::{Code, Registry, RegistryType};
use super::RegistryStore;

/// XML declaration written at the top of every registry document.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// `<codeset>` children with a field in [`CodesetDocument`].
const CODESET_FIELDS: &[&[u8]] = &[b"label", b"type", b"code"];
/// `<code>` children with a field in [`Code`].
const CODE_FIELDS: &[&[u8]] = &[
    b"label",
    b"value",
    b"description",
    b"conceptType",
    b"codeStatus",
    b"useDate",
    b"reference",
];

/// Error type for the file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing a registry file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A registry file is not a valid codeset document.
    #[error("Cannot parse {path}: {reason}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
    /// A registry could not be serialized.
    #[error("Cannot serialize registry {registry}: {reason}")]
    Serialize {
        /// Registry involved.
        registry: RegistryType,
        /// Serializer message.
        reason: String,
    },
    /// A registry file declares a type other than the one its name implies.
    #[error("{path} declares type '{found}' but {expected} was expected")]
    TypeMismatch {
        /// File involved.
        path: PathBuf,
        /// Type implied by the file name.
        expected: RegistryType,
        /// Tag found in the document.
        found: String,
    },
}

/// Wire form of a registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "codeset")]
pub struct CodesetDocument {
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Registry type tag.
    #[serde(rename = "type")]
    pub registry_type: String,
    /// Codes in document order.
    #[serde(rename = "code", default)]
    pub codes: Vec<Code>,
    /// Unmodelled `<codeset>` children, verbatim.
    #[serde(skip)]
    pub extensions: Vec<String>,
}

/// Unmodelled elements cut out of a document.
#[derive(Debug, Default)]
struct Lifted {
    /// Children of `<codeset>`.
    codeset: Vec<String>,
    /// Children of each `<code>`, keyed by code position.
    codes: BTreeMap<usize, Vec<String>>,
    /// The document without them.
    remainder: String,
}

fn position(reader: &Reader<&[u8]>) -> usize {
    reader.buffer_position() as usize
}

/// Cut every unknown child of `<codeset>` and `<code>` out of `xml`.
fn lift_unmodelled(xml: &str) -> Result<Lifted, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut lifted = Lifted::default();
    let mut cuts: Vec<Range<usize>> = Vec::new();
    let mut depth = 0usize;
    let mut current_code: Option<usize> = None;
    let mut codes_seen = 0usize;

    loop {
        let start = position(&reader);
        let event = reader.read_event()?;
        let (element, is_empty) = match &event {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(_) => {
                if depth == 2 {
                    current_code = None;
                }
                depth = depth.saturating_sub(1);
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let level = depth + 1;
        let name = element.name();
        let known = match (level, current_code) {
            (2, _) => Some(CODESET_FIELDS),
            (3, Some(_)) => Some(CODE_FIELDS),
            _ => None,
        };
        if known.is_some_and(|fields| !fields.iter().any(|f| *f == name.as_ref())) {
            if !is_empty {
                reader.read_to_end(name)?;
            }
            let range = start..position(&reader);
            let raw = xml[range.clone()].to_string();
            match current_code {
                Some(i) if level == 3 => lifted.codes.entry(i).or_default().push(raw),
                _ => lifted.codeset.push(raw),
            }
            cuts.push(range);
            continue;
        }

        if level == 2 && name.as_ref() == b"code" {
            if !is_empty {
                current_code = Some(codes_seen);
            }
            codes_seen += 1;
        }
        if !is_empty {
            depth = level;
        }
    }

    let mut remainder = String::with_capacity(xml.len());
    let mut from = 0;
    for cut in cuts {
        remainder.push_str(&xml[from..cut.start]);
        from = cut.end;
    }
    remainder.push_str(&xml[from..]);
    lifted.remainder = remainder;
    Ok(lifted)
}

impl CodesetDocument {
    /// Build the persisted form of a registry, codes sorted by value.
    pub fn from_registry(registry: &Registry) -> Self {
        Self {
            label: registry.label().to_string(),
            registry_type: registry.registry_type().tag().to_string(),
            codes: registry.sorted_codes().into_iter().cloned().collect(),
            extensions: registry.extensions().to_vec(),
        }
    }

    /// Convert into a registry of the expected type.
    ///
    /// A blank label falls back to the type's default label.
    pub fn into_registry(self, expected: RegistryType, path: &Path) -> Result<Registry, StoreError> {
        if RegistryType::from_tag(self.registry_type.trim()) != Some(expected) {
            return Err(StoreError::TypeMismatch {
                path: path.to_path_buf(),
                expected,
                found: self.registry_type,
            });
        }
        let label = if self.label.trim().is_empty() {
            expected.label().to_string()
        } else {
            self.label
        };
        Ok(Registry::with_codes(expected, label, self.codes).with_extensions(self.extensions))
    }

    /// Parse a document from XML text, keeping unmodelled elements.
    pub fn from_xml(xml: &str, path: &Path) -> Result<Self, StoreError> {
        let parse_error = |reason: String| StoreError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let lifted = lift_unmodelled(xml).map_err(|e| parse_error(e.to_string()))?;
        let mut document: Self =
            quick_xml::de::from_str(&lifted.remainder).map_err(|e| parse_error(e.to_string()))?;

        document.extensions = lifted.codeset;
        for (i, extensions) in lifted.codes {
            if let Some(code) = document.codes.get_mut(i) {
                code.extensions = extensions;
            }
        }
        Ok(document)
    }

    fn has_extensions(&self) -> bool {
        !self.extensions.is_empty() || self.codes.iter().any(|c| !c.extensions.is_empty())
    }

    /// Put unmodelled elements back before the closing tag of their parent.
    fn restore_unmodelled(&self, body: &str) -> Result<String, quick_xml::Error> {
        let mut reader = Reader::from_str(body);
        let mut inserts: Vec<(usize, String)> = Vec::new();
        let mut codes = self.codes.iter();
        let mut depth = 0usize;

        loop {
            let start = position(&reader);
            match reader.read_event()? {
                Event::Start(_) => depth += 1,
                Event::End(e) => {
                    if depth == 1 {
                        let block: String = self.extensions.iter().map(|raw| format!("  {}\n", raw)).collect();
                        inserts.push((start, block));
                    } else if depth == 2 && e.name().as_ref() == b"code" {
                        if let Some(code) = codes.next() {
                            let block: String = code.extensions.iter().map(|raw| format!("  {}\n  ", raw)).collect();
                            inserts.push((start, block));
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let mut out = String::with_capacity(body.len() + inserts.iter().map(|(_, b)| b.len()).sum::<usize>());
        let mut from = 0;
        for (at, block) in inserts {
            out.push_str(&body[from..at]);
            out.push_str(&block);
            from = at;
        }
        out.push_str(&body[from..]);
        Ok(out)
    }

    /// Render the document as indented XML with a declaration line.
    pub fn to_xml(&self, registry: RegistryType) -> Result<String, StoreError> {
        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::with_root(&mut body, Some("codeset"))
            .map_err(|e| StoreError::Serialize { registry, reason: e.to_string() })?;
        serializer.indent(' ', 2);
        self.serialize(serializer)
            .map_err(|e| StoreError::Serialize { registry, reason: e.to_string() })?;
        if self.has_extensions() {
            body = self
                .restore_unmodelled(&body)
                .map_err(|e| StoreError::Serialize { registry, reason: e.to_string() })?;
        }

        let mut out = String::with_capacity(body.len() + XML_DECLARATION.len() + 2);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        out.push_str(&body);
        out.push('\n');
        Ok(out)
    }
}

/// Registry store backed by a directory of XML documents.
#[derive(Debug, Clone)]
pub struct XmlFileStore {
    sets_dir: PathBuf,
}

impl XmlFileStore {
    /// Create a store over `sets_dir`. The directory must already exist.
    pub fn new(sets_dir: impl Into<PathBuf>) -> Self {
        Self { sets_dir: sets_dir.into() }
    }

    /// Directory holding the registry documents.
    pub fn sets_dir(&self) -> &Path {
        &self.sets_dir
    }

    /// Path of the document for a registry.
    pub fn path_for(&self, registry_type: RegistryType) -> PathBuf {
        self.sets_dir.join(registry_type.file_name())
    }
}

impl RegistryStore for XmlFileStore {
    type Error = StoreError;

    fn load(&self, registry_type: RegistryType) -> Result<Option<Registry>, Self::Error> {
        let path = self.path_for(registry_type);
        let xml = match fs::read_to_string(&path) {
            Ok(xml) => xml,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let document = CodesetDocument::from_xml(&xml, &path)?;
        document.into_registry(registry_type, &path).map(Some)
    }

    fn save(&mut self, registry: &Registry) -> Result<(), Self::Error> {
        let registry_type = registry.registry_type();
        let path = self.path_for(registry_type);
        let xml = CodesetDocument::from_registry(registry).to_xml(registry_type)?;

        let tmp = path.with_extension("xml.tmp");
        fs::write(&tmp, xml).map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path: path.clone(), source })?;
        Ok(())
    }
}
