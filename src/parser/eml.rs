//! Loading of the raw `.eml` input (a bare RFC 5322 message) from a file
//! or standard input.

use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};

/// Where the raw message comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `"-"` selects standard input, anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg.trim() == "-" {
            Self::Stdin
        } else {
            Self::File(PathBuf::from(arg))
        }
    }
}

/// Read the raw message bytes, unchanged.
pub fn read_input(source: &InputSource) -> Result<Vec<u8>> {
    match source {
        InputSource::Stdin => {
            let mut buf = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .map_err(|e| ConvertError::io("<stdin>", e))?;
            Ok(buf)
        }
        InputSource::File(path) => read_file(path),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConvertError::FileNotFound(path.to_path_buf())
        } else {
            ConvertError::io(path, e)
        }
    })
}

/// Transcode `data` from the `encoding` label to UTF-8 for parsing.
///
/// Without a label, or with a UTF-8 label, the bytes are borrowed as they are.
pub fn transcode<'a>(data: &'a [u8], encoding: Option<&str>) -> Result<Cow<'a, [u8]>> {
    let Some(label) = encoding else {
        return Ok(Cow::Borrowed(data));
    };
    let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConvertError::UnsupportedEncoding(label.to_string()))?;
    if encoding == encoding_rs::UTF_8 {
        return Ok(Cow::Borrowed(data));
    }
    tracing::debug!(encoding = encoding.name(), "Transcoding input to UTF-8");
    let (decoded, _, had_errors) = encoding.decode(data);
    if had_errors {
        tracing::debug!("Input contained sequences invalid in the declared encoding");
    }
    Ok(Cow::Owned(decoded.into_owned().into_bytes()))
}
