//! Filestore helpers: download, upload and copy resource files

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ckanny_api::client::file_name_from_url;
use ckanny_api::{Catalog, ContentFetcher, NewResource, Resource, Upload};
use tracing::{debug, info, warn};
use url::Url;

use crate::spool::{copy_chunked, spool};
use crate::tabular::{TabularFormat, extension_of};
use crate::{Error, MissingItem, Result};

/// CKAN rejects resources without a url, even when a file is uploaded
pub const PLACEHOLDER_URL: &str = "http://example.com";

/// Where the content of a new or replaced resource comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    /// Link the resource to a remote url
    Url(String),
    /// Upload a local file
    File(PathBuf),
    /// Upload in-memory content
    Bytes { file_name: String, bytes: Vec<u8> },
}

impl ResourceSource {
    /// Treat `http(s)://` arguments as links and anything else as a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Self::Url(arg.to_string())
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// Default resource name: the file name, or the sheet `gid` of a
    /// Google Docs link.
    pub fn default_name(&self) -> Option<String> {
        match self {
            Self::Url(url) if is_google_doc(url) => query_value(url, "gid"),
            Self::Url(url) => file_name_from_url(url),
            Self::File(path) => path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string),
            Self::Bytes { file_name, .. } => Some(file_name.clone()),
        }
    }

    /// Resource format: an explicit `format=` query value, else the
    /// extension, else `csv`.
    pub fn format(&self) -> String {
        let explicit = match self {
            Self::Url(url) => query_value(url, "format"),
            _ => None,
        };

        explicit
            .or_else(|| match self {
                Self::Url(url) if is_google_doc(url) => None,
                Self::Url(url) => file_name_from_url(url).as_deref().and_then(extension_of),
                Self::File(path) => path.to_str().and_then(extension_of),
                Self::Bytes { file_name, .. } => extension_of(file_name),
            })
            .unwrap_or_else(|| "csv".to_string())
    }

    fn url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            _ => PLACEHOLDER_URL.to_string(),
        }
    }

    fn upload(&self) -> Result<Option<Upload>> {
        match self {
            Self::Url(_) => Ok(None),
            Self::File(path) => {
                let bytes = fs::read(path)?;
                let file_name = self.default_name().unwrap_or_else(|| "upload".to_string());
                Ok(Some(Upload { file_name, bytes }))
            }
            Self::Bytes { file_name, bytes } => Ok(Some(Upload {
                file_name: file_name.clone(),
                bytes: bytes.clone(),
            })),
        }
    }
}

/// Which resource an upload creates or replaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// Create a new resource in this package
    Package(String),
    /// Replace the file of this resource
    Resource(String),
}

/// Create or replace a resource from `source`. `name` defaults to the
/// source's file name.
pub fn upload_resource(
    catalog: &dyn Catalog,
    source: &ResourceSource,
    target: &UploadTarget,
    name: Option<&str>,
) -> Result<Resource> {
    match target {
        UploadTarget::Package(package_id) => create_resource(catalog, package_id, source, name),
        UploadTarget::Resource(resource_id) => update_resource(catalog, resource_id, source, name),
    }
}

/// Create a new resource in `package_id`.
pub fn create_resource(
    catalog: &dyn Catalog,
    package_id: &str,
    source: &ResourceSource,
    name: Option<&str>,
) -> Result<Resource> {
    let resource = NewResource {
        package_id: Some(package_id.to_string()),
        name: name.map(str::to_string).or_else(|| source.default_name()),
        url: source.url(),
        format: Some(source.format()),
        ..Default::default()
    };

    info!("Creating new resource in package {}...", package_id);
    catalog
        .resource_create(&resource, source.upload()?)
        .map_err(|e| match e {
            e if e.is_not_found() => Error::not_found(
                MissingItem::Package,
                format!("Package `{}` was not found.", package_id),
            ),
            e => too_large(e),
        })
}

/// Replace the file behind `resource_id`, keeping its package.
pub fn update_resource(
    catalog: &dyn Catalog,
    resource_id: &str,
    source: &ResourceSource,
    name: Option<&str>,
) -> Result<Resource> {
    let existing = catalog
        .resource_show(resource_id)
        .map_err(|e| missing_resource(resource_id, e))?;

    let resource = NewResource {
        id: Some(resource_id.to_string()),
        package_id: existing.package_id.clone(),
        name: name.map(str::to_string).or(existing.name),
        url: source.url(),
        format: Some(source.format()),
        ..Default::default()
    };

    info!("Updating resource {}...", resource_id);
    catalog
        .resource_update(&resource, source.upload()?)
        .map_err(|e| match e {
            e if e.is_not_found() => missing_resource(resource_id, e),
            e => too_large(e),
        })
}

/// A resource downloaded to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub bytes: u64,
    /// Character encoding announced by the server
    pub encoding: Option<String>,
}

/// Download `resource_id` to `destination`.
///
/// When `destination` is a directory the file is named after the download
/// URL, or `<resource_id>.<ext>` with `name_from_id`.
pub fn fetch_to_path(
    fetcher: &dyn ContentFetcher,
    resource_id: &str,
    destination: &Path,
    name_from_id: bool,
    chunk_bytes: usize,
) -> Result<FetchedFile> {
    let mut fetched = fetcher.fetch(resource_id)?;

    let path = if destination.is_dir() {
        let extension = fetched
            .file_name
            .as_deref()
            .and_then(extension_of)
            .or_else(|| {
                fetched
                    .content_type
                    .as_deref()
                    .and_then(TabularFormat::from_content_type)
                    .map(|f| f.extension().to_string())
            });

        let file_name = match (&fetched.file_name, name_from_id) {
            (Some(name), false) => name.clone(),
            _ => match extension {
                Some(ext) => format!("{}.{}", resource_id, ext),
                None => resource_id.to_string(),
            },
        };
        destination.join(file_name)
    } else {
        destination.to_path_buf()
    };

    debug!(path = %path.display(), "Writing resource");
    let mut writer = BufWriter::new(File::create(&path)?);
    let bytes = copy_chunked(&mut fetched.body, &mut writer, chunk_bytes)?;
    writer.flush()?;

    match fetched.content_length {
        Some(expected) if bytes < expected => {
            return Err(Error::Truncated {
                expected,
                received: bytes,
            });
        }
        _ => {}
    }

    Ok(FetchedFile {
        path,
        bytes,
        encoding: fetched.encoding,
    })
}

/// Copy the file of `resource_id` from `source` onto the resource with the
/// same id on `destination`.
pub fn migrate<S>(
    source: &S,
    destination: &dyn Catalog,
    resource_id: &str,
    chunk_bytes: usize,
) -> Result<Resource>
where
    S: Catalog + ContentFetcher,
{
    if same_remote(source.address(), destination.address()) {
        return Err(Error::invalid_option(format!(
            "`dest-remote` of {} is the same as `src-remote` of {}. The dest and src remotes must be different.",
            destination.address(),
            source.address()
        )));
    }

    let mut fetched = source.fetch(resource_id)?;
    let mut spooled = spool(&mut fetched.body, chunk_bytes, fetched.content_length)?;
    let mut bytes = Vec::with_capacity(spooled.len() as usize);
    spooled.reader()?.read_to_end(&mut bytes)?;

    let file_name = fetched
        .file_name
        .unwrap_or_else(|| format!("{}.csv", resource_id));
    let upload = ResourceSource::Bytes { file_name, bytes };

    let resource = update_resource(destination, resource_id, &upload, None)?;
    info!(resource_id, "Migrated resource");
    Ok(resource)
}

fn is_google_doc(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host == "docs.google.com"))
        .unwrap_or(false)
}

/// First non-empty value of the query parameter `key`
fn query_value(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn same_remote(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}

fn missing_resource(resource_id: &str, error: ckanny_api::Error) -> Error {
    if error.is_not_found() {
        Error::not_found(
            MissingItem::Resource,
            format!("Resource `{}` was not found in filestore.", resource_id),
        )
    } else {
        Error::Api(error)
    }
}

fn too_large(error: ckanny_api::Error) -> Error {
    if matches!(error, ckanny_api::Error::PayloadTooLarge { .. }) {
        warn!("File size too large. Try uploading a smaller file.");
    }
    Error::Api(error)
}
