//! Asset registry: one fetch and one local name per distinct absolute URL.

use crate::fetch::{AssetSource, FetchError};
use crate::model::AssetReference;
use crate::ordered::OrderedMap;
use crate::sniff::sniff;
use reqwest::Url;
use std::collections::HashSet;
use tracing::{debug, info};

const LOCAL_NAME_PREFIX: &str = "asset_";

/// Absolute URL -> [AssetReference] registry for the whole run.
///
/// Local names are `asset_{n}{ext}` with `n` counting successful registrations from 0 in
/// first-encounter order. A failed fetch allocates no index, and the URL is remembered so a
/// later reference fails without another retry loop.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    assets: OrderedMap<String, AssetReference>,
    failed: HashSet<String>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local name for `absolute_url`, fetching and sniffing it on first encounter.
    pub fn resolve_or_register(
        &mut self,
        absolute_url: &str,
        source: &mut dyn AssetSource,
    ) -> Result<String, FetchError> {
        if let Some(existing) = self.assets.get(absolute_url) {
            debug!(url = %absolute_url, local = %existing.local_name, "asset already registered");
            return Ok(existing.local_name.clone());
        }
        if !is_fetchable(absolute_url) {
            return Err(FetchError::UnsupportedScheme {
                url: absolute_url.to_string(),
            });
        }
        if self.failed.contains(absolute_url) {
            return Err(FetchError::PreviouslyFailed {
                url: absolute_url.to_string(),
            });
        }
        let bytes = match source.fetch_asset(absolute_url) {
            Ok(b) => b,
            Err(e) => {
                self.failed.insert(absolute_url.to_string());
                return Err(e);
            }
        };
        let sniffed = sniff(&bytes);
        let local_name = format!(
            "{}{}{}",
            LOCAL_NAME_PREFIX,
            self.assets.len(),
            sniffed.extension
        );
        info!(
            url = %absolute_url,
            local = %local_name,
            media_type = sniffed.media_type,
            bytes = bytes.len(),
            "registered asset"
        );
        self.assets.insert_if_absent(
            absolute_url.to_string(),
            AssetReference {
                absolute_url: absolute_url.to_string(),
                local_name: local_name.clone(),
                media_type: sniffed.media_type,
                bytes,
            },
        );
        Ok(local_name)
    }

    pub fn get(&self, absolute_url: &str) -> Option<&AssetReference> {
        self.assets.get(absolute_url)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// All assets in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &AssetReference> {
        self.assets.values()
    }

    /// Assets registered at or after position `mark` (a previous [len](Self::len)).
    pub fn registered_since(&self, mark: usize) -> impl Iterator<Item = &AssetReference> {
        self.assets.values().skip(mark)
    }
}

fn is_fetchable(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
