//! Reupload pipeline: canonicalize, extract, transfer, record.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::application::services::{UrlCanonicalizer, sniff_media_kind};
use crate::domain::entities::{Fingerprint, Manifest, MediaReference, RemoteAsset, StoredFile};
use crate::domain::errors::{DestinationError, ReuploadError};
use crate::domain::ports::{AssetFetcher, Destination, Extractor};

/// Largest asset accepted by default (500 MiB).
pub const DEFAULT_MAX_MEDIA_SIZE: u64 = 500 * 1024 * 1024;

type FingerprintLocks = Mutex<HashMap<Fingerprint, Weak<tokio::sync::Mutex<()>>>>;

/// Copies media behind a source link into a destination, once per fingerprint.
pub struct Reuploader {
    canonicalizer: UrlCanonicalizer,
    extractors: Vec<Arc<dyn Extractor>>,
    destination: Arc<dyn Destination>,
    fetcher: Arc<dyn AssetFetcher>,
    public_url: String,
    max_media_size: u64,
    in_flight: FingerprintLocks,
}

impl Reuploader {
    /// Creates a reuploader with no extractors and default limits.
    #[must_use]
    pub fn new(
        destination: Arc<dyn Destination>,
        fetcher: Arc<dyn AssetFetcher>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            canonicalizer: UrlCanonicalizer::default(),
            extractors: Vec::new(),
            destination,
            fetcher,
            public_url: public_url.into(),
            max_media_size: DEFAULT_MAX_MEDIA_SIZE,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Appends an extractor. Order decides fallback priority.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Appends several extractors in order.
    #[must_use]
    pub fn with_extractors(mut self, extractors: impl IntoIterator<Item = Arc<dyn Extractor>>) -> Self {
        self.extractors.extend(extractors);
        self
    }

    /// Sets the maximum accepted asset size in bytes.
    #[must_use]
    pub const fn with_max_media_size(mut self, bytes: u64) -> Self {
        self.max_media_size = bytes;
        self
    }

    /// Replaces the URL canonicalizer.
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: UrlCanonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Returns the destination handle.
    #[must_use]
    pub fn destination(&self) -> &Arc<dyn Destination> {
        &self.destination
    }

    /// Returns whether any configured extractor claims the URL.
    #[must_use]
    pub fn is_supported(&self, source_url: &str) -> bool {
        self.canonicalizer
            .canonicalize(source_url)
            .is_ok_and(|canonical| self.extractors.iter().any(|e| e.is_supported(&canonical)))
    }

    /// Reuploads the media behind a source link and returns its permalinks.
    ///
    /// A manifest already stored for the link's fingerprint short-circuits
    /// extraction. Concurrent calls for the same fingerprint share one
    /// extraction.
    ///
    /// # Errors
    /// Returns a `ReuploadError` describing the first fatal failure.
    #[instrument(skip(self), fields(fingerprint = tracing::field::Empty))]
    pub async fn reupload(&self, source_url: &str) -> Result<Vec<String>, ReuploadError> {
        let reference = self.canonicalizer.reference(source_url)?;
        let fingerprint = reference.fingerprint();
        tracing::Span::current().record("fingerprint", tracing::field::display(fingerprint));

        if let Some(manifest) = self.cached_manifest(fingerprint).await? {
            debug!("Manifest hit");
            return Ok(self.permalinks(&manifest.files));
        }

        let lock = self.fingerprint_lock(fingerprint);
        let _held = lock.lock().await;

        if let Some(manifest) = self.cached_manifest(fingerprint).await? {
            debug!("Manifest written by concurrent reupload");
            return Ok(self.permalinks(&manifest.files));
        }

        let assets = self.extract(reference.canonical_url()).await?;
        let files = self.transfer_all(&reference, &assets).await?;

        let manifest = Manifest::new(reference.canonical_url(), files);
        let json = manifest
            .to_json()
            .map_err(|e| DestinationError::storage(format!("encoding manifest: {e}")))?;
        self.destination
            .upload(&fingerprint.manifest_name(), json.into())
            .await?;

        info!(
            canonical_url = %reference.canonical_url(),
            files = manifest.files.len(),
            "Reupload complete"
        );

        Ok(self.permalinks(&manifest.files))
    }

    async fn cached_manifest(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Manifest>, ReuploadError> {
        let name = fingerprint.manifest_name();
        match self.destination.download(&name).await {
            Ok(bytes) => Manifest::from_json(&bytes).map(Some).map_err(|e| {
                ReuploadError::ManifestCorrupt {
                    name,
                    message: e.to_string(),
                }
            }),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn fingerprint_lock(&self, fingerprint: &Fingerprint) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = self.in_flight.lock();
        table.retain(|_, lock| lock.strong_count() > 0);

        if let Some(lock) = table.get(fingerprint).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        table.insert(fingerprint.clone(), Arc::downgrade(&lock));
        lock
    }

    #[instrument(skip(self))]
    async fn extract(&self, canonical_url: &str) -> Result<Vec<RemoteAsset>, ReuploadError> {
        let mut causes = Vec::new();

        for extractor in self.extractors.iter().filter(|e| e.is_supported(canonical_url)) {
            match extractor.extract(canonical_url).await {
                Ok(assets) => {
                    debug!(extractor = %extractor, assets = assets.len(), "Extracted");
                    return Ok(assets);
                }
                Err(e) => {
                    warn!(extractor = %extractor, error = %e, "Extractor failed, trying next");
                    causes.push(e);
                }
            }
        }

        if causes.is_empty() {
            Err(ReuploadError::NoExtractorMatched {
                url: canonical_url.to_string(),
            })
        } else {
            Err(ReuploadError::ExtractionFailed {
                url: canonical_url.to_string(),
                causes,
            })
        }
    }

    async fn transfer_all(
        &self,
        reference: &MediaReference,
        assets: &[RemoteAsset],
    ) -> Result<Vec<String>, ReuploadError> {
        let total = assets.len();
        let mut files = Vec::with_capacity(total);

        for (index, asset) in assets.iter().enumerate() {
            let stem = reference.fingerprint().asset_stem(index, total);
            match self.transfer(asset, &stem).await {
                Ok(name) => files.push(name),
                Err(e) if total == 1 => return Err(e),
                Err(e) => warn!(index = index + 1, url = %asset.url(), error = %e, "Skipping asset"),
            }
        }

        if files.is_empty() {
            return Err(ReuploadError::NoAssetsStored {
                url: reference.canonical_url().to_string(),
                attempted: total,
            });
        }
        Ok(files)
    }

    async fn transfer(&self, asset: &RemoteAsset, stem: &str) -> Result<String, ReuploadError> {
        let bytes = self
            .fetcher
            .fetch(asset.url(), self.max_media_size)
            .await
            .map_err(|e| ReuploadError::from_fetch(asset.url(), e))?;

        let kind = sniff_media_kind(&bytes).map_err(|reason| ReuploadError::TransferRejected {
            url: asset.url().to_string(),
            reason,
        })?;

        let file = StoredFile::new(stem, kind, bytes);
        debug!(
            name = file.name(),
            content_type = file.content_type(),
            size = file.bytes().len(),
            "Uploading asset"
        );
        self.destination
            .upload(file.name(), file.bytes().clone())
            .await?;

        Ok(file.name().to_string())
    }

    fn permalinks(&self, files: &[String]) -> Vec<String> {
        let base = self.public_url.trim_end_matches('/');
        files.iter().map(|name| format!("{base}/{name}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::content_sniffer::samples::{GIF, HTML, MP4, PNG};
    use crate::domain::errors::RejectReason;
    use crate::domain::ports::mocks::{MemoryDestination, MockExtractor, MockFetcher};
    use std::sync::atomic::Ordering;

    const SOURCE: &str = "https://x.com/someone/status/1?s=20";
    const CANONICAL: &str = "https://x.com/someone/status/1";
    const PUBLIC: &str = "https://cdn.example.com/media/";

    fn fp() -> Fingerprint {
        Fingerprint::of(CANONICAL)
    }

    fn reuploader(
        destination: Arc<MemoryDestination>,
        fetcher: MockFetcher,
        extractors: Vec<Arc<dyn Extractor>>,
    ) -> Reuploader {
        Reuploader::new(destination, Arc::new(fetcher), PUBLIC).with_extractors(extractors)
    }

    #[tokio::test]
    async fn test_single_asset_is_stored_with_manifest() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new().with_body("https://cdn.x/a", PNG);
        let extractor = Arc::new(MockExtractor::returning("x", "https://x.com/", &["https://cdn.x/a"]));
        let uploader = reuploader(destination.clone(), fetcher, vec![extractor]);

        let links = uploader.reupload(SOURCE).await.unwrap();

        let name = format!("{}.png", fp());
        assert_eq!(links, vec![format!("https://cdn.example.com/media/{name}")]);
        assert_eq!(destination.get(&name).unwrap().as_ref(), PNG);

        let manifest = Manifest::from_json(&destination.get(&fp().manifest_name()).unwrap()).unwrap();
        assert_eq!(manifest.source_url, CANONICAL);
        assert_eq!(manifest.files, vec![name]);
    }

    #[tokio::test]
    async fn test_cached_manifest_bypasses_extractors() {
        let destination = Arc::new(MemoryDestination::new());
        let manifest = Manifest::new(CANONICAL, vec!["cached.mp4".to_string()]);
        destination.insert(&fp().manifest_name(), manifest.to_json().unwrap());

        let extractor = MockExtractor::returning("x", "https://x.com/", &["https://cdn.x/a"]);
        let calls = extractor.calls();
        let uploader = reuploader(destination.clone(), MockFetcher::new(), vec![Arc::new(extractor)]);

        let links = uploader.reupload(SOURCE).await.unwrap();

        assert_eq!(links, vec!["https://cdn.example.com/media/cached.mp4"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(destination.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new().with_body("https://cdn.x/a", MP4);
        let extractor = MockExtractor::returning("x", "https://x.com/", &["https://cdn.x/a"]);
        let calls = extractor.calls();
        let uploader = reuploader(destination.clone(), fetcher, vec![Arc::new(extractor)]);

        let first = uploader.reupload(SOURCE).await.unwrap();
        let writes = destination.upload_count();
        let second = uploader
            .reupload("https://x.com/someone/status/1#fragment")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(destination.upload_count(), writes);
    }

    #[tokio::test]
    async fn test_no_extractor_match_writes_nothing() {
        let destination = Arc::new(MemoryDestination::new());
        let extractor = Arc::new(MockExtractor::returning("tt", "https://tiktok.com/", &["u"]));
        let uploader = reuploader(destination.clone(), MockFetcher::new(), vec![extractor]);

        let result = uploader.reupload(SOURCE).await;

        assert!(matches!(result, Err(ReuploadError::NoExtractorMatched { .. })));
        assert_eq!(destination.upload_count(), 0);
        assert!(!uploader.is_supported(SOURCE));
    }

    #[tokio::test]
    async fn test_fallback_to_next_extractor() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new().with_body("https://cdn.x/b", GIF);
        let broken = MockExtractor::failing("first", "https://x.com/");
        let broken_calls = broken.calls();
        let working = Arc::new(MockExtractor::returning("second", "https://x.com/", &["https://cdn.x/b"]));
        let uploader = reuploader(destination, fetcher, vec![Arc::new(broken), working]);

        let links = uploader.reupload(SOURCE).await.unwrap();

        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
        assert!(links[0].ends_with(".gif"));
    }

    #[tokio::test]
    async fn test_all_extractors_failing_aggregates_causes() {
        let destination = Arc::new(MemoryDestination::new());
        let extractors: Vec<Arc<dyn Extractor>> = vec![
            Arc::new(MockExtractor::failing("first", "https://x.com/")),
            Arc::new(MockExtractor::failing("second", "https://x.com/")),
        ];
        let uploader = reuploader(destination.clone(), MockFetcher::new(), extractors);

        let result = uploader.reupload(SOURCE).await;

        match result {
            Err(ReuploadError::ExtractionFailed { causes, .. }) => assert_eq!(causes.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(destination.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_asset_is_rejected() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new().with_body("https://cdn.x/a", MP4);
        let extractor = Arc::new(MockExtractor::returning("x", "https://x.com/", &["https://cdn.x/a"]));
        let uploader = reuploader(destination.clone(), fetcher, vec![extractor]).with_max_media_size(8);

        let result = uploader.reupload(SOURCE).await;

        assert!(matches!(
            result,
            Err(ReuploadError::TransferRejected {
                reason: RejectReason::TooLarge { limit: 8, .. },
                ..
            })
        ));
        assert!(destination.names().is_empty());
    }

    #[tokio::test]
    async fn test_sniffed_type_overrides_remote_name() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new().with_body("https://cdn.x/clip.mp4", PNG);
        let extractor = Arc::new(MockExtractor::returning(
            "x",
            "https://x.com/",
            &["https://cdn.x/clip.mp4"],
        ));
        let uploader = reuploader(destination.clone(), fetcher, vec![extractor]);

        let links = uploader.reupload(SOURCE).await.unwrap();

        assert!(links[0].ends_with(&format!("{}.png", fp())));
    }

    #[tokio::test]
    async fn test_single_unsupported_asset_aborts() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new().with_body("https://cdn.x/a", HTML);
        let extractor = Arc::new(MockExtractor::returning("x", "https://x.com/", &["https://cdn.x/a"]));
        let uploader = reuploader(destination.clone(), fetcher, vec![extractor]);

        let result = uploader.reupload(SOURCE).await;

        assert!(matches!(
            result,
            Err(ReuploadError::TransferRejected {
                reason: RejectReason::UnsupportedContentType { .. },
                ..
            })
        ));
        assert!(destination.names().is_empty());
    }

    #[tokio::test]
    async fn test_picker_skips_failed_asset_and_keeps_indices() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new()
            .with_body("https://cdn.x/1", PNG)
            .with_body("https://cdn.x/3", GIF);
        let extractor = Arc::new(MockExtractor::returning(
            "x",
            "https://x.com/",
            &["https://cdn.x/1", "https://cdn.x/2", "https://cdn.x/3"],
        ));
        let uploader = reuploader(destination.clone(), fetcher, vec![extractor]);

        let links = uploader.reupload(SOURCE).await.unwrap();

        let expected = vec![format!("{}-1.png", fp()), format!("{}-3.gif", fp())];
        assert_eq!(
            links,
            expected
                .iter()
                .map(|n| format!("https://cdn.example.com/media/{n}"))
                .collect::<Vec<_>>()
        );
        let manifest = Manifest::from_json(&destination.get(&fp().manifest_name()).unwrap()).unwrap();
        assert_eq!(manifest.files, expected);
    }

    #[tokio::test]
    async fn test_picker_with_upload_failure_is_partial() {
        let destination = Arc::new(MemoryDestination::failing_uploads("-1."));
        let fetcher = MockFetcher::new()
            .with_body("https://cdn.x/1", PNG)
            .with_body("https://cdn.x/2", PNG);
        let extractor = Arc::new(MockExtractor::returning(
            "x",
            "https://x.com/",
            &["https://cdn.x/1", "https://cdn.x/2"],
        ));
        let uploader = reuploader(destination.clone(), fetcher, vec![extractor]);

        let links = uploader.reupload(SOURCE).await.unwrap();

        assert_eq!(links.len(), 1);
        assert!(links[0].ends_with(&format!("{}-2.png", fp())));
    }

    #[tokio::test]
    async fn test_picker_with_no_successes_fails_without_manifest() {
        let destination = Arc::new(MemoryDestination::new());
        let extractor = Arc::new(MockExtractor::returning(
            "x",
            "https://x.com/",
            &["https://cdn.x/1", "https://cdn.x/2"],
        ));
        let uploader = reuploader(destination.clone(), MockFetcher::new(), vec![extractor]);

        let result = uploader.reupload(SOURCE).await;

        assert!(matches!(
            result,
            Err(ReuploadError::NoAssetsStored { attempted: 2, .. })
        ));
        assert!(destination.get(&fp().manifest_name()).is_none());
    }

    #[tokio::test]
    async fn test_empty_extraction_fails_without_manifest() {
        let destination = Arc::new(MemoryDestination::new());
        let extractor = Arc::new(MockExtractor::returning("x", "https://x.com/", &[]));
        let uploader = reuploader(destination.clone(), MockFetcher::new(), vec![extractor]);

        let result = uploader.reupload(SOURCE).await;

        assert!(matches!(
            result,
            Err(ReuploadError::NoAssetsStored { attempted: 0, .. })
        ));
        assert_eq!(destination.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_fatal() {
        let destination = Arc::new(MemoryDestination::new());
        destination.insert(&fp().manifest_name(), "{not json");
        let extractor = MockExtractor::returning("x", "https://x.com/", &["https://cdn.x/a"]);
        let calls = extractor.calls();
        let uploader = reuploader(destination, MockFetcher::new(), vec![Arc::new(extractor)]);

        let result = uploader.reupload(SOURCE).await;

        assert!(matches!(result, Err(ReuploadError::ManifestCorrupt { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_extraction() {
        let destination = Arc::new(MemoryDestination::new());
        let fetcher = MockFetcher::new().with_body("https://cdn.x/a", PNG);
        let extractor = MockExtractor::returning("x", "https://x.com/", &["https://cdn.x/a"]);
        let calls = extractor.calls();
        let uploader = reuploader(destination, fetcher, vec![Arc::new(extractor)]);

        let (a, b) = tokio::join!(
            uploader.reupload(SOURCE),
            uploader.reupload("https://x.com/someone/status/1?t=9")
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_is_supported_uses_canonical_url() {
        let destination = Arc::new(MemoryDestination::new());
        let extractor = Arc::new(MockExtractor::returning("x", "https://x.com/", &[]));
        let uploader = reuploader(destination, MockFetcher::new(), vec![extractor]);

        assert!(uploader.is_supported(SOURCE));
        assert!(!uploader.is_supported("not a url"));
    }
}
