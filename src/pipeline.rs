//! The validation pipeline: worker pool, result aggregator, and the
//! orchestrator that owns every lifecycle boundary.
//!
//! Data flows discovery -> batches -> workers -> results -> aggregator over
//! bounded channels, so a slow stage throttles its producers instead of
//! buffering without limit. Shutdown is strictly ordered: close the batches
//! channel, wait for the workers, close the results channel, wait for the
//! aggregator. That ordering is what guarantees every resource yields exactly
//! one result and no task outlives the run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::cache::SchemaCache;
use crate::discovery;
use crate::error::{Result, ValidationError};
use crate::output::Output;
use crate::registry::Registry;
use crate::resolver::{self, Resolution};
use crate::resource::{self, Resource, Signature};
use crate::schema::Violation;

/// Outcome for exactly one resource (or one failed input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Document satisfies its schema
    Valid,
    /// Document violates its schema
    Invalid { violations: Vec<Violation> },
    /// Processing failed (parse error, registry failure, missing schema)
    Error { message: String },
    /// Resource was deliberately not validated
    Skipped { reason: String },
    /// Document carries no kind, so there is nothing to validate against
    Empty,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Input the resource came from (file path or "stdin").
    pub source: String,
    /// Signature, when extraction succeeded.
    pub signature: Option<Signature>,
    pub status: Status,
}

impl CheckResult {
    pub fn valid(resource: &Resource, signature: Signature) -> Self {
        Self {
            source: resource.source.clone(),
            signature: Some(signature),
            status: Status::Valid,
        }
    }

    pub fn invalid(resource: &Resource, signature: Signature, violations: Vec<Violation>) -> Self {
        Self {
            source: resource.source.clone(),
            signature: Some(signature),
            status: Status::Invalid { violations },
        }
    }

    pub fn skipped(resource: &Resource, signature: Signature, reason: &str) -> Self {
        Self {
            source: resource.source.clone(),
            signature: Some(signature),
            status: Status::Skipped {
                reason: reason.to_string(),
            },
        }
    }

    pub fn empty(resource: &Resource) -> Self {
        Self {
            source: resource.source.clone(),
            signature: None,
            status: Status::Empty,
        }
    }

    /// An error result attributed to a whole input, produced before the
    /// worker pool is reached (unreadable file, unparsable stream).
    pub fn input_error(source: &str, err: &ValidationError) -> Self {
        Self {
            source: source.to_string(),
            signature: None,
            status: Status::Error {
                message: err.to_string(),
            },
        }
    }

    fn resource_error(resource: &Resource, signature: Option<Signature>, message: String) -> Self {
        Self {
            source: resource.source.clone(),
            signature,
            status: Status::Error { message },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, Status::Error { .. })
    }
}

/// Everything a worker needs besides its channels. Read-only for the run,
/// except for the cache which has its own synchronized contract.
#[derive(Clone)]
pub struct WorkerContext {
    pub registries: Arc<Vec<Box<dyn Registry>>>,
    pub k8s_version: String,
    pub cache: Option<Arc<SchemaCache>>,
    pub skip: Arc<dyn Fn(&Signature) -> bool + Send + Sync>,
    pub ignore_missing_schemas: bool,
}

/// Process one resource through signature extraction, skip filtering, schema
/// resolution (cache-first), and engine evaluation. Always produces exactly
/// one result.
pub async fn check_resource(ctx: &WorkerContext, resource: &Resource) -> CheckResult {
    let signature = match resource.signature() {
        Ok(sig) => sig,
        Err(e) => return CheckResult::resource_error(resource, None, e.to_string()),
    };

    if signature.kind.is_empty() {
        return CheckResult::empty(resource);
    }

    if (ctx.skip)(&signature) {
        return CheckResult::skipped(resource, signature, "kind is skipped");
    }

    let cache_key = SchemaCache::key(&signature.kind, &signature.version, &ctx.k8s_version);
    let mut resolution = match &ctx.cache {
        Some(cache) => cache.get(&cache_key).await,
        None => None,
    };

    if resolution.is_none() {
        let resolved = match resolver::resolve(
            &ctx.registries,
            &signature.kind,
            &signature.version,
            &ctx.k8s_version,
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(e) => return CheckResult::resource_error(resource, Some(signature), e.to_string()),
        };

        // Confirmed absence is cached too, so a kind with no schema does not
        // re-trigger fetches for every document of that kind.
        if let Some(cache) = &ctx.cache {
            cache.set(cache_key, resolved.clone()).await;
        }
        resolution = Some(resolved);
    }

    let schema = match resolution {
        Some(Resolution::Found(schema)) => schema,
        Some(Resolution::NotFound) | None => {
            if ctx.ignore_missing_schemas {
                return CheckResult::skipped(resource, signature, "no schema available");
            }
            let err = ValidationError::MissingSchema {
                kind: signature.kind.clone(),
            };
            return CheckResult::resource_error(resource, Some(signature), err.to_string());
        }
    };

    let violations = schema.validate(&resource.document);
    if violations.is_empty() {
        CheckResult::valid(resource, signature)
    } else {
        CheckResult::invalid(resource, signature, violations)
    }
}

/// Worker loop: claim whole batches off the shared channel, process their
/// resources in document order, emit one result each. Exits when the batches
/// channel closes.
pub async fn run_worker(
    batches: Arc<Mutex<mpsc::Receiver<Vec<Resource>>>>,
    results: mpsc::Sender<CheckResult>,
    ctx: WorkerContext,
) {
    loop {
        // Hold the lock only while claiming; validation runs unlocked so the
        // other workers can claim concurrently.
        let batch = { batches.lock().await.recv().await };
        let Some(batch) = batch else { break };

        for res in &batch {
            let result = check_resource(&ctx, res).await;
            if results.send(result).await.is_err() {
                // Aggregator is gone; nothing left to report to.
                return;
            }
        }
    }
}

/// Aggregator loop: drain results until every sender is dropped, forward each
/// to the output (best-effort), reduce into the all-success flag, then flush.
pub async fn run_aggregator(mut results: mpsc::Receiver<CheckResult>, mut output: Output) -> bool {
    let mut success = true;

    while let Some(result) = results.recv().await {
        if result.is_error() {
            success = false;
        }
        if let Err(e) = output.write(&result) {
            warn!("failed writing result for {}: {e}", result.source);
        }
    }

    if let Err(e) = output.flush() {
        warn!("failed flushing output: {e}");
    }

    success
}

/// Pipeline-level configuration, fixed for one run.
pub struct RunConfig {
    /// Inputs to validate; ignored in stdin mode.
    pub files: Vec<PathBuf>,
    /// Read a single batch from standard input instead of files.
    pub use_stdin: bool,
    pub workers: usize,
    pub k8s_version: String,
    pub skip_kinds: HashSet<String>,
    pub ignore_missing_schemas: bool,
    pub cache_enabled: bool,
}

/// Run the whole pipeline to completion and return the overall outcome:
/// `true` iff no result was an error.
pub async fn run(
    config: RunConfig,
    registries: Vec<Box<dyn Registry>>,
    output: Output,
) -> Result<bool> {
    let workers = config.workers.max(1);
    info!(workers, stdin = config.use_stdin, "starting validation pipeline");

    // Aggregator starts first so it is ready before anyone produces.
    let (results_tx, results_rx) = mpsc::channel::<CheckResult>(workers * 4);
    let aggregator = tokio::spawn(run_aggregator(results_rx, output));

    let (batches_tx, batches_rx) = mpsc::channel::<Vec<Resource>>(workers);
    let batches_rx = Arc::new(Mutex::new(batches_rx));

    let skip_kinds = config.skip_kinds;
    let ctx = WorkerContext {
        registries: Arc::new(registries),
        k8s_version: config.k8s_version,
        cache: config.cache_enabled.then(|| Arc::new(SchemaCache::new())),
        skip: Arc::new(move |sig: &Signature| skip_kinds.contains(&sig.kind)),
        ignore_missing_schemas: config.ignore_missing_schemas,
    };

    let worker_handles: Vec<_> = (0..workers)
        .map(|_| {
            tokio::spawn(run_worker(
                Arc::clone(&batches_rx),
                results_tx.clone(),
                ctx.clone(),
            ))
        })
        .collect();

    if config.use_stdin {
        stream_stdin(&batches_tx, &results_tx).await;
    } else {
        // Discovery producer: expands directories into file paths, reporting
        // unreadable inputs as error results. Closes the files channel when
        // exhausted.
        let (files_tx, mut files_rx) = mpsc::channel::<PathBuf>(workers * 4);
        let discovery_handle = tokio::spawn(discovery::discover_inputs(
            config.files,
            files_tx,
            results_tx.clone(),
        ));

        while let Some(path) = files_rx.recv().await {
            stream_file(&path, &batches_tx, &results_tx).await;
        }

        discovery_handle
            .await
            .map_err(|e| ValidationError::Concurrency(e.to_string()))?;
    }

    // Ordered shutdown: no batch producer remains, so workers drain and exit.
    drop(batches_tx);
    for handle in worker_handles {
        handle
            .await
            .map_err(|e| ValidationError::Concurrency(e.to_string()))?;
    }

    // All result producers are gone only now; the aggregator can finish.
    drop(results_tx);
    let success = aggregator
        .await
        .map_err(|e| ValidationError::Concurrency(e.to_string()))?;

    info!(success, "validation pipeline finished");
    Ok(success)
}

/// Read standard input once and push it as a single batch.
async fn stream_stdin(
    batches: &mpsc::Sender<Vec<Resource>>,
    results: &mpsc::Sender<CheckResult>,
) {
    let mut contents = String::new();
    if let Err(e) = tokio::io::stdin().read_to_string(&mut contents).await {
        let _ = results
            .send(CheckResult::input_error("stdin", &ValidationError::Io(e)))
            .await;
        return;
    }

    match resource::from_stream("stdin", &contents) {
        Ok(batch) => {
            let _ = batches.send(batch).await;
        }
        Err(e) => {
            let _ = results.send(CheckResult::input_error("stdin", &e)).await;
        }
    }
}

/// Read and parse one file into a batch. A failure becomes one error result
/// and the caller moves on to the next file.
async fn stream_file(
    path: &std::path::Path,
    batches: &mpsc::Sender<Vec<Resource>>,
    results: &mpsc::Sender<CheckResult>,
) {
    let name = path.display().to_string();

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            let _ = results
                .send(CheckResult::input_error(&name, &ValidationError::Io(e)))
                .await;
            return;
        }
    };

    match resource::from_stream(&name, &contents) {
        Ok(batch) => {
            let _ = batches.send(batch).await;
        }
        Err(e) => {
            let _ = results.send(CheckResult::input_error(&name, &e)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::RegistryError;

    const OBJECT_SCHEMA: &[u8] =
        br#"{"type": "object", "required": ["kind", "apiVersion", "metadata"]}"#;

    struct CountingRegistry {
        calls: AtomicUsize,
        payload: Option<Vec<u8>>,
    }

    impl CountingRegistry {
        fn with_schema() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                payload: Some(OBJECT_SCHEMA.to_vec()),
            })
        }

        fn without_schema() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                payload: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Registry for Arc<CountingRegistry> {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(
            &self,
            _kind: &str,
            _version: &str,
            _k8s_version: &str,
        ) -> std::result::Result<Vec<u8>, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.payload {
                Some(bytes) => Ok(bytes.clone()),
                None => Err(RegistryError::NotFound {
                    location: "counting".to_string(),
                }),
            }
        }
    }

    fn test_resource(kind: &str) -> Resource {
        let document = if kind.is_empty() {
            json!(null)
        } else {
            json!({"kind": kind, "apiVersion": "v1", "metadata": {"name": "x"}})
        };
        Resource {
            source: "test.yaml".to_string(),
            index: 0,
            document,
        }
    }

    fn test_ctx(registry: Arc<CountingRegistry>, cache: bool) -> WorkerContext {
        WorkerContext {
            registries: Arc::new(vec![Box::new(registry) as Box<dyn Registry>]),
            k8s_version: "master".to_string(),
            cache: cache.then(|| Arc::new(SchemaCache::new())),
            skip: Arc::new(|_| false),
            ignore_missing_schemas: false,
        }
    }

    #[tokio::test]
    async fn test_empty_kind_yields_empty() {
        let registry = CountingRegistry::with_schema();
        let ctx = test_ctx(Arc::clone(&registry), true);

        let result = check_resource(&ctx, &test_resource("")).await;
        assert_eq!(result.status, Status::Empty);
        // No schema lookup is ever attempted for untyped documents.
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_skip_predicate_short_circuits() {
        let registry = CountingRegistry::with_schema();
        let mut ctx = test_ctx(Arc::clone(&registry), true);
        ctx.skip = Arc::new(|sig: &Signature| sig.kind == "Secret");

        let result = check_resource(&ctx, &test_resource("Secret")).await;
        assert!(matches!(result.status, Status::Skipped { .. }));
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_document() {
        let registry = CountingRegistry::with_schema();
        let ctx = test_ctx(registry, true);

        let result = check_resource(&ctx, &test_resource("Pod")).await;
        assert_eq!(result.status, Status::Valid);
        assert_eq!(result.signature.as_ref().unwrap().kind, "Pod");
    }

    #[tokio::test]
    async fn test_invalid_document() {
        let registry = CountingRegistry::with_schema();
        let ctx = test_ctx(registry, true);

        let resource = Resource {
            source: "test.yaml".to_string(),
            index: 0,
            document: json!({"kind": "Pod"}),
        };
        let result = check_resource(&ctx, &resource).await;
        assert!(matches!(result.status, Status::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_missing_schema_is_error_by_default() {
        let registry = CountingRegistry::without_schema();
        let ctx = test_ctx(registry, true);

        let result = check_resource(&ctx, &test_resource("CronTab")).await;
        match &result.status {
            Status::Error { message } => assert!(message.contains("CronTab")),
            other => panic!("Expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_schema_skipped_when_ignored() {
        let registry = CountingRegistry::without_schema();
        let mut ctx = test_ctx(registry, true);
        ctx.ignore_missing_schemas = true;

        let result = check_resource(&ctx, &test_resource("CronTab")).await;
        assert!(matches!(result.status, Status::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_cache_prevents_repeat_fetches() {
        let registry = CountingRegistry::with_schema();
        let ctx = test_ctx(Arc::clone(&registry), true);

        for _ in 0..3 {
            let result = check_resource(&ctx, &test_resource("Pod")).await;
            assert_eq!(result.status, Status::Valid);
        }
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_absence_is_cached() {
        let registry = CountingRegistry::without_schema();
        let mut ctx = test_ctx(Arc::clone(&registry), true);
        ctx.ignore_missing_schemas = true;

        for _ in 0..3 {
            check_resource(&ctx, &test_resource("CronTab")).await;
        }
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_resolves_every_time() {
        let registry = CountingRegistry::with_schema();
        let ctx = test_ctx(Arc::clone(&registry), false);

        for _ in 0..3 {
            let result = check_resource(&ctx, &test_resource("Pod")).await;
            assert_eq!(result.status, Status::Valid);
        }
        assert_eq!(registry.calls(), 3);
    }

    #[tokio::test]
    async fn test_worker_emits_one_result_per_resource() {
        let registry = CountingRegistry::with_schema();
        let ctx = test_ctx(registry, true);

        let (batches_tx, batches_rx) = mpsc::channel(4);
        let (results_tx, mut results_rx) = mpsc::channel(16);
        let batches_rx = Arc::new(Mutex::new(batches_rx));

        let worker = tokio::spawn(run_worker(batches_rx, results_tx, ctx));

        let batch = vec![
            test_resource("Pod"),
            test_resource(""),
            test_resource("Service"),
        ];
        batches_tx.send(batch).await.unwrap();
        drop(batches_tx);
        worker.await.unwrap();

        let mut statuses = Vec::new();
        while let Some(result) = results_rx.recv().await {
            statuses.push(result.status);
        }
        // One result per resource, in document order within the batch.
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[0], Status::Valid);
        assert_eq!(statuses[1], Status::Empty);
        assert_eq!(statuses[2], Status::Valid);
    }

    #[tokio::test]
    async fn test_untyped_then_unknown_kind_keeps_order() {
        let registry = CountingRegistry::without_schema();
        let ctx = test_ctx(registry, true);

        let (batches_tx, batches_rx) = mpsc::channel(4);
        let (results_tx, mut results_rx) = mpsc::channel(16);
        let worker = tokio::spawn(run_worker(
            Arc::new(Mutex::new(batches_rx)),
            results_tx,
            ctx,
        ));

        batches_tx
            .send(vec![test_resource(""), test_resource("CronTab")])
            .await
            .unwrap();
        drop(batches_tx);
        worker.await.unwrap();

        let first = results_rx.recv().await.unwrap();
        let second = results_rx.recv().await.unwrap();
        assert!(results_rx.recv().await.is_none());

        assert_eq!(first.status, Status::Empty);
        assert!(second.is_error());
    }

    #[tokio::test]
    async fn test_aggregator_reduces_success_flag() {
        let (tx, rx) = mpsc::channel(8);
        let output = Output::quiet();
        let aggregator = tokio::spawn(run_aggregator(rx, output));

        let resource = test_resource("Pod");
        let sig = resource.signature().unwrap();
        tx.send(CheckResult::valid(&resource, sig.clone()))
            .await
            .unwrap();
        tx.send(CheckResult::skipped(&resource, sig, "kind is skipped"))
            .await
            .unwrap();
        drop(tx);

        assert!(aggregator.await.unwrap());

        let (tx, rx) = mpsc::channel(8);
        let aggregator = tokio::spawn(run_aggregator(rx, Output::quiet()));
        tx.send(CheckResult::input_error(
            "bad.yaml",
            &ValidationError::Config("boom".to_string()),
        ))
        .await
        .unwrap();
        drop(tx);

        assert!(!aggregator.await.unwrap());
    }
}
