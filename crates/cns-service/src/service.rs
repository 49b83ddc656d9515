use std::fmt;
use std::sync::Arc;

use cns_crypto::{Codec, EncryptionKey};
use cns_resilience::{CircuitState, Classifier, Operation, Pipeline, Request, ResilienceConfig, ResilienceError};
use cns_store::{ObjectPort, StoreError};
use cns_wal::{Event, EventKind, EventStream, TransactionLog, WalError};
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{LogStage, ServiceError, ServiceResult};

/// Lifecycle phase of an [`ObjectService`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Constructed; the log has not been replayed yet. Requests are refused.
    Recovering,
    /// Setup finished; requests are served.
    Serving,
    /// Torn down; requests are refused.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Recovering => "recovering",
            Self::Serving => "serving",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Encrypted key-value service over a storage port.
///
/// Values are encrypted before they reach the port and decrypted on the way
/// out, so the port and the transaction log only ever hold ciphertext.
/// Every port call made while serving goes through a per-operation resilience
/// pipeline built once at construction.
pub struct ObjectService {
    codec: Codec,
    port: Arc<dyn ObjectPort>,
    log: Option<Arc<dyn TransactionLog>>,
    get_pipeline: Pipeline<String, StoreError>,
    put_pipeline: Pipeline<(), StoreError>,
    delete_pipeline: Pipeline<(), StoreError>,
    phase: RwLock<Phase>,
}

impl ObjectService {
    pub fn builder(key: EncryptionKey, port: Arc<dyn ObjectPort>) -> ObjectServiceBuilder {
        ObjectServiceBuilder {
            key,
            port,
            log: None,
            resilience: ResilienceConfig::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Serving
    }

    /// Breaker state of the get, put and delete pipelines, in that order.
    pub fn breaker_states(&self) -> [(&'static str, Option<CircuitState>); 3] {
        [
            ("get", self.get_pipeline.breaker().map(|b| b.state())),
            ("put", self.put_pipeline.breaker().map(|b| b.state())),
            ("delete", self.delete_pipeline.breaker().map(|b| b.state())),
        ]
    }

    /// Rebuild port state from the transaction log, then start serving.
    ///
    /// Events are applied strictly in log order, straight to the port: they
    /// already hold encoded values and skip the resilience pipeline. Any read
    /// fault aborts setup and leaves the service refusing requests.
    pub async fn setup(&self) -> ServiceResult<()> {
        match self.phase() {
            Phase::Serving => return Ok(()),
            Phase::Closed => return Err(ServiceError::Closed),
            Phase::Recovering => {}
        }

        let Some(log) = &self.log else {
            info!("no transaction log configured; serving empty store");
            *self.phase.write() = Phase::Serving;
            return Ok(());
        };

        let applied = self.replay(log.read_events()).await?;
        info!(events = applied, "transaction log replayed");
        *self.phase.write() = Phase::Serving;
        Ok(())
    }

    async fn replay(&self, stream: EventStream) -> ServiceResult<u64> {
        let EventStream {
            mut events,
            mut errors,
        } = stream;
        let mut events_open = true;
        let mut errors_open = true;
        let mut applied = 0u64;

        loop {
            tokio::select! {
                biased;
                err = errors.recv(), if errors_open => match err {
                    Some(err) => {
                        error!(error = %err, applied, "transaction log replay failed");
                        return Err(ServiceError::log(LogStage::Replay, err));
                    }
                    None => errors_open = false,
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.apply(event).await?;
                        applied += 1;
                    }
                    None => events_open = false,
                },
                else => break,
            }
        }
        Ok(applied)
    }

    async fn apply(&self, event: Event) -> ServiceResult<()> {
        debug!(sequence = event.sequence, kind = %event.kind, key = %event.key, "replaying event");
        let result = match (event.kind, event.value) {
            (EventKind::Put, Some(value)) => self.port.put(&event.key, &value).await,
            (EventKind::Put, None) => {
                return Err(ServiceError::log(
                    LogStage::Replay,
                    WalError::MalformedEvent {
                        sequence: event.sequence,
                        message: "put without a value".into(),
                    },
                ));
            }
            (EventKind::Delete, _) => self.port.delete(&event.key).await,
        };
        result.map_err(|e| ServiceError::from(ResilienceError::Operation(e)))
    }

    /// Fetch and decrypt the value stored under `key`.
    pub async fn get(&self, ctx: &CancellationToken, key: &str) -> ServiceResult<String> {
        self.ensure_serving()?;
        validate_key(key)?;

        let port = Arc::clone(&self.port);
        let owned = key.to_owned();
        let op: Operation<String, StoreError> = Arc::new(move || {
            let port = Arc::clone(&port);
            let key = owned.clone();
            async move { port.get(&key).await }.boxed()
        });

        let token = self
            .get_pipeline
            .call(Request::new(key, b"", op).with_cancel(ctx.clone()))
            .await?;
        self.codec.decode(&token).map_err(|e| {
            warn!(key, error = %e, "stored value failed to decrypt");
            ServiceError::Decryption(e)
        })
    }

    /// Encrypt `value`, store it under `key`, then record the put.
    pub async fn put(&self, ctx: &CancellationToken, key: &str, value: &str) -> ServiceResult<()> {
        self.ensure_serving()?;
        validate_key(key)?;

        let encoded = self.codec.encode(value).map_err(ServiceError::Encryption)?;

        let port = Arc::clone(&self.port);
        let owned_key = key.to_owned();
        let owned_value = encoded.clone();
        let op: Operation<(), StoreError> = Arc::new(move || {
            let port = Arc::clone(&port);
            let key = owned_key.clone();
            let value = owned_value.clone();
            async move { port.put(&key, &value).await }.boxed()
        });

        self.put_pipeline
            .call(Request::new(key, value.as_bytes(), op).with_cancel(ctx.clone()))
            .await?;

        if let Some(log) = &self.log {
            log.write_put(key, &encoded)
                .map_err(|e| ServiceError::log(LogStage::Append, e))?;
        }
        Ok(())
    }

    /// Remove `key`, then record the delete. Deleting an absent key succeeds.
    pub async fn delete(&self, ctx: &CancellationToken, key: &str) -> ServiceResult<()> {
        self.ensure_serving()?;
        validate_key(key)?;

        let port = Arc::clone(&self.port);
        let owned = key.to_owned();
        let op: Operation<(), StoreError> = Arc::new(move || {
            let port = Arc::clone(&port);
            let key = owned.clone();
            async move { port.delete(&key).await }.boxed()
        });

        self.delete_pipeline
            .call(Request::new(key, b"", op).with_cancel(ctx.clone()))
            .await?;

        if let Some(log) = &self.log {
            log.write_delete(key)
                .map_err(|e| ServiceError::log(LogStage::Append, e))?;
        }
        Ok(())
    }

    /// Stop serving and close the transaction log.
    ///
    /// A close failure is fatal (see [`ServiceError::is_fatal`]): earlier
    /// writes may not be durable. The caller decides how to terminate.
    pub fn teardown(&self) -> ServiceResult<()> {
        {
            let mut phase = self.phase.write();
            if *phase == Phase::Closed {
                return Ok(());
            }
            *phase = Phase::Closed;
        }

        if let Some(log) = &self.log {
            log.close().map_err(|e| {
                error!(error = %e, "failed to close transaction log");
                ServiceError::log(LogStage::Close, e)
            })?;
            info!("transaction log closed");
        }
        Ok(())
    }

    fn ensure_serving(&self) -> ServiceResult<()> {
        match self.phase() {
            Phase::Serving => Ok(()),
            Phase::Recovering => Err(ServiceError::NotReady),
            Phase::Closed => Err(ServiceError::Closed),
        }
    }
}

impl fmt::Debug for ObjectService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectService")
            .field("phase", &self.phase())
            .field("log", &self.log.is_some())
            .field("pipeline", &self.get_pipeline.stages())
            .finish()
    }
}

fn validate_key(key: &str) -> ServiceResult<()> {
    if key.is_empty() {
        return Err(ServiceError::Validation("key must not be empty".into()));
    }
    Ok(())
}

/// Assembles an [`ObjectService`].
pub struct ObjectServiceBuilder {
    key: EncryptionKey,
    port: Arc<dyn ObjectPort>,
    log: Option<Arc<dyn TransactionLog>>,
    resilience: ResilienceConfig,
}

impl ObjectServiceBuilder {
    /// Record mutations to `log` and replay it during setup.
    pub fn log(mut self, log: Arc<dyn TransactionLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn resilience(mut self, config: ResilienceConfig) -> Self {
        self.resilience = config;
        self
    }

    pub fn build(self) -> ServiceResult<ObjectService> {
        self.resilience.validate()?;

        let transient: Classifier<StoreError> = Arc::new(StoreError::is_transient);
        let service = ObjectService {
            codec: Codec::new(&self.key),
            port: self.port,
            log: self.log,
            get_pipeline: Pipeline::standard("get", &self.resilience, Arc::clone(&transient)),
            put_pipeline: Pipeline::standard("put", &self.resilience, Arc::clone(&transient)),
            delete_pipeline: Pipeline::standard("delete", &self.resilience, transient),
            phase: RwLock::new(Phase::Recovering),
        };
        debug!(?service, "object service built");
        Ok(service)
    }
}
