//! Tabular format detection

use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// A file format the datastore can be filled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabularFormat {
    Csv,
    Xls,
    Xlsx,
}

impl TabularFormat {
    /// Select a format from the declared content type and the file name.
    ///
    /// A recognised content type wins; generic ones (`text/plain`,
    /// `application/octet-stream`, ...) fall through to the extension.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Result<Self> {
        if let Some(format) = content_type.and_then(Self::from_content_type) {
            return Ok(format);
        }

        let extension = file_name.and_then(extension_of).unwrap_or_default();
        Self::from_extension(&extension).ok_or_else(|| Error::UnsupportedFormat {
            extension: if extension.is_empty() {
                content_type.unwrap_or("unknown").to_string()
            } else {
                extension
            },
        })
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/csv" | "application/csv" | "text/comma-separated-values" => Some(Self::Csv),
            "application/vnd.ms-excel" => Some(Self::Xls),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(Self::Xlsx)
            }
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Xls => "application/vnd.ms-excel",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

impl fmt::Display for TabularFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_ascii_uppercase())
    }
}

/// Lowercased extension of a file name or URL path, if it has one.
pub fn extension_of(name: &str) -> Option<String> {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("text/csv"), Some("data.bin"), TabularFormat::Csv)]
    #[case(Some("text/csv; charset=utf-8"), None, TabularFormat::Csv)]
    #[case(Some("application/vnd.ms-excel"), Some("data.csv"), TabularFormat::Xls)]
    #[case(Some("application/octet-stream"), Some("data.XLSX"), TabularFormat::Xlsx)]
    #[case(None, Some("report.xls"), TabularFormat::Xls)]
    #[case(None, Some("http://host/files/data.csv?download=1"), TabularFormat::Csv)]
    fn detects_format(
        #[case] content_type: Option<&str>,
        #[case] file_name: Option<&str>,
        #[case] expected: TabularFormat,
    ) {
        assert_eq!(
            TabularFormat::detect(content_type, file_name).unwrap(),
            expected
        );
    }

    #[rstest]
    #[case(None, Some("data.json"), "json")]
    #[case(Some("text/plain"), Some("notes"), "text/plain")]
    #[case(None, None, "unknown")]
    fn rejects_unsupported(
        #[case] content_type: Option<&str>,
        #[case] file_name: Option<&str>,
        #[case] reported: &str,
    ) {
        let err = TabularFormat::detect(content_type, file_name).unwrap_err();
        match err {
            Error::UnsupportedFormat { extension } => assert_eq!(extension, reported),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }
}
