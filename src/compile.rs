//! Consolidated output: every registry document under one `<codebase>` root.
//!
//! Fragments are copied line by line, indented four spaces, in file-name
//! order. A fragment's XML declaration line is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::store::XML_DECLARATION;

/// File written under the base directory.
pub const COMPILED_FILE_NAME: &str = "Compiled.xml";

const INDENT: &str = "    ";

/// Error type for compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The base or sets directory does not exist.
    #[error("Can't open code set location: {0}")]
    MissingDirectory(PathBuf),
    /// Reading a fragment or writing the output failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// What [`compile_codesets`] wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    /// Output file.
    pub output: PathBuf,
    /// Fragment file names, in output order.
    pub fragments: Vec<String>,
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CompileError + '_ {
    move |source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Render the consolidated document from fragment contents.
pub fn render_compiled<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    out.push_str(XML_DECLARATION);
    out.push('\n');
    out.push_str("<codebase>\n");
    for fragment in fragments {
        for (i, line) in fragment.lines().enumerate() {
            if i == 0 && line.starts_with("<?xml") {
                continue;
            }
            out.push_str(INDENT);
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("</codebase>\n");
    out
}

/// Collate every `<base_dir>/sets/*.xml` into `<base_dir>/Compiled.xml`.
pub fn compile_codesets(base_dir: &Path) -> Result<CompileReport, CompileError> {
    if !base_dir.is_dir() {
        return Err(CompileError::MissingDirectory(base_dir.to_path_buf()));
    }
    let sets_dir = base_dir.join("sets");
    if !sets_dir.is_dir() {
        return Err(CompileError::MissingDirectory(sets_dir));
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(&sets_dir).map_err(io_error(&sets_dir))? {
        let entry = entry.map_err(io_error(&sets_dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".xml") && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();

    let mut contents = Vec::with_capacity(names.len());
    for name in &names {
        let path = sets_dir.join(name);
        debug!(file = %name, "reading fragment");
        contents.push(fs::read_to_string(&path).map_err(io_error(&path))?);
    }

    let output = base_dir.join(COMPILED_FILE_NAME);
    let compiled = render_compiled(contents.iter().map(String::as_str));
    fs::write(&output, compiled).map_err(io_error(&output))?;
    info!(output = %output.display(), fragments = names.len(), "compiled codesets");

    Ok(CompileReport {
        output,
        fragments: names,
    })
}
