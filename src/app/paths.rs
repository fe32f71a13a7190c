//! Path resolution between the catalog, array and cache tiers
//!
//! The catalog reports paths as the media server sees them (often through a
//! container mount). [`PathResolver`] translates those into array paths and
//! derives the matching cache path from a fixed table of library mappings. All
//! functions here are pure: callers do their own existence checks.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::models::MediaItem;
use crate::errors::{PathMappingError, PathResult};

/// Path mapping for one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryMapping {
    /// Library name as reported by the catalog
    pub name: String,
    /// Library root as the media server sees it, if it differs from the array root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_root: Option<PathBuf>,
    /// Library root on the array tier
    pub array_root: PathBuf,
    /// Disk-only view of the array root (e.g. `/mnt/user0` on Unraid)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_direct_root: Option<PathBuf>,
    /// Library root on the cache tier
    pub cache_root: PathBuf,
}

impl LibraryMapping {
    /// Mapping without catalog translation or direct array view
    pub fn new(
        name: impl Into<String>,
        array_root: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            catalog_root: None,
            array_root: array_root.into(),
            array_direct_root: None,
            cache_root: cache_root.into(),
        }
    }

    /// Root that array moves read from and write to
    pub fn physical_array_root(&self) -> &Path {
        self.array_direct_root.as_deref().unwrap_or(&self.array_root)
    }
}

/// Resolved cache-tier counterpart of a media file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheTarget {
    /// Library the file belongs to
    pub library: String,
    /// Physical location on the array tier
    pub array_path: PathBuf,
    /// Location on the cache tier
    pub cache_path: PathBuf,
}

/// Maps catalog paths to array paths and array paths to cache targets
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    libraries: Vec<LibraryMapping>,
}

impl PathResolver {
    /// Create a resolver over a fixed mapping table
    pub fn new(libraries: Vec<LibraryMapping>) -> Self {
        Self { libraries }
    }

    /// The mapping table
    pub fn libraries(&self) -> &[LibraryMapping] {
        &self.libraries
    }

    /// Translate a catalog-reported path into an array path
    ///
    /// Paths already under an array root are returned unchanged.
    pub fn to_array_path(&self, catalog_path: &Path) -> PathResult<PathBuf> {
        let from_catalog = self.longest_match(catalog_path, |lib| lib.catalog_root.as_deref());
        if let Some((library, relative)) = from_catalog {
            return Ok(library.array_root.join(relative));
        }

        let on_array = self
            .longest_match(catalog_path, |lib| Some(lib.array_root.as_path()))
            .or_else(|| self.longest_match(catalog_path, |lib| lib.array_direct_root.as_deref()));
        if on_array.is_some() {
            return Ok(catalog_path.to_path_buf());
        }

        Err(PathMappingError::Unmapped {
            path: catalog_path.to_path_buf(),
        })
    }

    /// Resolve an array path into its cache target
    pub fn resolve(&self, array_path: &Path) -> PathResult<CacheTarget> {
        let (library, relative) = self
            .longest_match(array_path, |lib| Some(lib.array_root.as_path()))
            .or_else(|| self.longest_match(array_path, |lib| lib.array_direct_root.as_deref()))
            .ok_or_else(|| PathMappingError::Unmapped {
                path: array_path.to_path_buf(),
            })?;

        Self::target(library, relative, array_path)
    }

    /// Resolve a cache path back into its cache target
    pub fn resolve_cache_path(&self, cache_path: &Path) -> PathResult<CacheTarget> {
        let (library, relative) = self
            .longest_match(cache_path, |lib| Some(lib.cache_root.as_path()))
            .ok_or_else(|| PathMappingError::Unmapped {
                path: cache_path.to_path_buf(),
            })?;

        Self::target(library, relative, cache_path)
    }

    /// Cache target of a catalog item
    pub fn target_for(&self, item: &MediaItem) -> PathResult<CacheTarget> {
        let array_path = self.to_array_path(&item.path)?;
        self.resolve(&array_path)
    }

    /// Library whose cache root contains `path`
    pub fn library_for_cache_path(&self, path: &Path) -> Option<&LibraryMapping> {
        self.longest_match(path, |lib| Some(lib.cache_root.as_path()))
            .map(|(library, _)| library)
    }

    fn target(library: &LibraryMapping, relative: &Path, original: &Path) -> PathResult<CacheTarget> {
        if relative.as_os_str().is_empty() {
            return Err(PathMappingError::NotAFile {
                path: original.to_path_buf(),
            });
        }

        Ok(CacheTarget {
            library: library.name.clone(),
            array_path: library.physical_array_root().join(relative),
            cache_path: library.cache_root.join(relative),
        })
    }

    /// Library with the most specific root containing `path`, plus the relative rest
    ///
    /// Matching is per path component, so `/media/tv` never matches `/media/tvshows`.
    fn longest_match<'a, 'p, F>(&'a self, path: &'p Path, root_of: F) -> Option<(&'a LibraryMapping, &'p Path)>
    where
        F: Fn(&'a LibraryMapping) -> Option<&'a Path>,
    {
        self.libraries
            .iter()
            .filter_map(|library| {
                let root = root_of(library)?;
                let relative = path.strip_prefix(root).ok()?;
                Some((library, root.components().count(), relative))
            })
            .max_by_key(|(_, depth, _)| *depth)
            .map(|(library, _, relative)| (library, relative))
    }
}

/// Destination of a file that travels next to `primary_destination`
pub fn sibling_destination(primary_destination: &Path, companion: &Path) -> Option<PathBuf> {
    let parent = primary_destination.parent()?;
    let name = companion.file_name()?;
    Some(parent.join(name))
}
