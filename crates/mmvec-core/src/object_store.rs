//! Object stores used to read async job results.
//!
//! `FsObjectStore` maps `s3://bucket/key` to `<root>/bucket/key`, which fits a
//! locally mounted bucket. `MemoryObjectStore` backs the fake model and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::location::ObjectLocation;
use crate::traits::ObjectStore;

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, location: &ObjectLocation) -> Result<PathBuf> {
        let mut path = self.root.join(&location.bucket);
        for part in location.key.split('/').filter(|p| !p.is_empty()) {
            if part == ".." || part == "." {
                return Err(Error::InvalidLocation(location.uri()));
            }
            path.push(part);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let path = self.path_for(location)?;
        tracing::debug!(uri = %location, path = %path.display(), "reading object");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(location.uri())),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<ObjectLocation, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, location: ObjectLocation, bytes: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).insert(location, bytes.into());
    }

    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
            .ok_or_else(|| Error::NotFound(location.uri()))
    }
}
