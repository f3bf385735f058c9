//! Filestore command implementations

use std::path::Path;

use colored::Colorize;
use tracing::info;

use ckanny_api::{Catalog, ContentFetcher, Resource};
use ckanny_core::filestore::{self, FetchedFile, ResourceSource, UploadTarget};

use crate::context::default_resource_id;
use crate::error::{CliError, Result};

/// Run `fs fetch`
pub fn run_fetch(
    fetcher: &dyn ContentFetcher,
    resource_id: &str,
    destination: &Path,
    name_from_id: bool,
    chunk_bytes: usize,
) -> Result<FetchedFile> {
    let fetched =
        filestore::fetch_to_path(fetcher, resource_id, destination, name_from_id, chunk_bytes)?;

    if let Some(encoding) = &fetched.encoding {
        info!(%encoding, "File encoding");
    }
    println!(
        "{} Wrote {} bytes to {}.",
        "Success!".green().bold(),
        fetched.bytes,
        fetched.path.display().to_string().cyan()
    );
    Ok(fetched)
}

/// Run `fs upload`
///
/// Without `--package-id` the file replaces an existing resource, whose id
/// defaults to the source file name without extension.
pub fn run_upload(
    catalog: &dyn Catalog,
    source: &str,
    resource_id: Option<&str>,
    package_id: Option<&str>,
    name: Option<&str>,
) -> Result<Resource> {
    let source = ResourceSource::from_arg(source);
    let target = match (package_id, resource_id) {
        (Some(package_id), _) => UploadTarget::Package(package_id.to_string()),
        (None, Some(resource_id)) => UploadTarget::Resource(resource_id.to_string()),
        (None, None) => {
            let file_name = source.default_name().ok_or_else(|| {
                CliError::user("Cannot derive a resource id from the source. Pass --resource-id.")
            })?;
            UploadTarget::Resource(default_resource_id(Path::new(&file_name))?)
        }
    };

    let resource = filestore::upload_resource(catalog, &source, &target, name)?;
    let verb = match target {
        UploadTarget::Package(_) => "created",
        UploadTarget::Resource(_) => "updated",
    };
    println!(
        "{} Resource {} {}.",
        "Success!".green().bold(),
        resource.id.cyan(),
        verb
    );
    Ok(resource)
}

/// Run `fs migrate`
pub fn run_migrate<S>(
    source: &S,
    destination: &dyn Catalog,
    resource_id: &str,
    chunk_bytes: usize,
) -> Result<Resource>
where
    S: Catalog + ContentFetcher,
{
    let resource = filestore::migrate(source, destination, resource_id, chunk_bytes)?;
    println!(
        "{} Resource {} migrated from {} to {}.",
        "Success!".green().bold(),
        resource_id.cyan(),
        source.address(),
        destination.address()
    );
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckanny_test_utils::MockCatalog;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_writes_into_directory() {
        let catalog = MockCatalog::new();
        catalog.put_file("r1", "data.csv", "text/csv", b"a\n1\n");
        let dir = TempDir::new().unwrap();

        let fetched = run_fetch(&catalog, "r1", dir.path(), false, 1024).unwrap();

        assert_eq!(fetched.path, dir.path().join("data.csv"));
        assert_eq!(fetched.bytes, 4);
    }

    #[test]
    fn test_upload_defaults_to_resource_named_like_file() {
        let catalog = MockCatalog::new();
        let package = catalog.add_package("p");
        let resource_id = catalog.add_resource(&package, "old.csv");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!("{}.csv", resource_id));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"a\n2\n").unwrap();

        let resource = run_upload(&catalog, path.to_str().unwrap(), None, None, None).unwrap();

        assert_eq!(resource.id, resource_id);
        assert_eq!(catalog.file_bytes(&resource_id).unwrap(), b"a\n2\n".to_vec());
    }

    #[test]
    fn test_upload_into_package_creates_resource() {
        let catalog = MockCatalog::new();
        let package = catalog.add_package("p");

        let resource = run_upload(
            &catalog,
            "http://example.org/rates.csv",
            None,
            Some(&package),
            Some("Rates"),
        )
        .unwrap();

        assert_eq!(resource.package_id.as_deref(), Some(package.as_str()));
        assert_eq!(resource.name.as_deref(), Some("Rates"));
    }

    #[test]
    fn test_migrate_between_mocks() {
        let source = MockCatalog::with_address("http://a.ckan");
        source.put_file("r1", "data.csv", "text/csv", b"x\n");
        let destination = MockCatalog::with_address("http://b.ckan");
        destination.put_file("r1", "data.csv", "text/csv", b"");

        run_migrate(&source, &destination, "r1", 1024).unwrap();

        assert_eq!(destination.file_bytes("r1").unwrap(), b"x\n".to_vec());
    }
}
