//! Pattern Search
//!
//! Enumerates every index shard of a store with cursor scans and collects the
//! ids whose payload matches.
//!
//! ## Strategy
//! - Index shard keys are discovered by SCAN over `{store}/idx/bucket/*`;
//!   shard ids are hash-derived and sparse, so there is no id range to walk
//! - Glob search filters fields on the backend (HSCAN MATCH)
//! - Regexp search pulls every field and matches client-side
//!
//! Results are a best-effort snapshot: a scan racing with writers may report
//! an entry twice or miss one. No ordering is guaranteed.

use regex::bytes::Regex;

use crate::backend::Backend;
use crate::bucket::BucketAllocator;
use crate::error::{BucketError, Result};
use crate::record::RecordId;

pub struct PatternSearch<'a, B: Backend + ?Sized> {
    backend: &'a B,
    layout: &'a BucketAllocator,
    scan_count: usize,
}

impl<'a, B: Backend + ?Sized> PatternSearch<'a, B> {
    pub fn new(backend: &'a B, layout: &'a BucketAllocator, scan_count: usize) -> Self {
        Self {
            backend,
            layout,
            scan_count,
        }
    }

    /// Ids whose payload matches a glob; an empty pattern matches everything
    pub fn search(&self, pattern: &[u8]) -> Result<Vec<RecordId>> {
        let filter = if pattern.is_empty() { None } else { Some(pattern) };

        let mut ids = Vec::new();
        self.for_each_index_entry(filter, |_, value| {
            ids.push(RecordId::from_bytes(value)?);
            Ok(())
        })?;

        tracing::debug!(
            "Glob search {:?} in {:?} matched {} records",
            String::from_utf8_lossy(pattern),
            self.layout.name(),
            ids.len()
        );
        Ok(ids)
    }

    /// One id list per pattern, each evaluated independently
    pub fn regexp_search<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<Vec<RecordId>>> {
        let regexes = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref())
                    .map_err(|e| BucketError::InvalidPattern(format!("{:?}: {}", p.as_ref(), e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut results = vec![Vec::new(); regexes.len()];
        if regexes.is_empty() {
            return Ok(results);
        }

        self.for_each_index_entry(None, |field, value| {
            let mut id = None;
            for (regex, hits) in regexes.iter().zip(results.iter_mut()) {
                if regex.is_match(field) {
                    let matched = match id {
                        Some(parsed) => parsed,
                        None => {
                            let parsed = RecordId::from_bytes(value)?;
                            id = Some(parsed);
                            parsed
                        }
                    };
                    hits.push(matched);
                }
            }
            Ok(())
        })?;

        tracing::debug!(
            "Regexp search with {} patterns in {:?} matched {:?} records",
            regexes.len(),
            self.layout.name(),
            results.iter().map(Vec::len).collect::<Vec<_>>()
        );
        Ok(results)
    }

    /// Visit every index shard key of the store
    pub fn for_each_index_shard(&self, mut visit: impl FnMut(&str) -> Result<()>) -> Result<()> {
        let mut cursor = 0;
        loop {
            let page = self
                .backend
                .scan(cursor, self.layout.index_scan_pattern(), self.scan_count)?;
            for key in &page.items {
                visit(key)?;
            }
            cursor = page.cursor;
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    /// Visit every `(payload, id)` entry, optionally glob-filtered on payload
    fn for_each_index_entry(
        &self,
        filter: Option<&[u8]>,
        mut visit: impl FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()> {
        self.for_each_index_shard(|key| {
            let mut cursor = 0;
            loop {
                let page = self.backend.hscan(key, cursor, filter, self.scan_count)?;
                for (field, value) in &page.items {
                    visit(field, value)?;
                }
                cursor = page.cursor;
                if cursor == 0 {
                    return Ok(());
                }
            }
        })
    }
}
