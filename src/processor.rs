//! The command processor: the transactional boundary between commands and
//! events.
//!
//! Every command is validated against the current aggregate state, rebuilt
//! by folding the product's Event Stream. An accepted command becomes
//! exactly one event appended under optimistic concurrency control. The
//! processor keeps no state of its own across requests; everything mutable
//! lives in the store.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::domain::command::{
    CreateProduct, HeadCheck, ProductCommand, SetActive, UpdateAttributes, UpdateImages,
    UpdatePrice,
};
use crate::domain::event::{
    ActiveStateSet, AttribsUpdated, DecodeError, HeadCheckPerformed, ImagesUpdated, PriceUpdated,
    ProductCreated, ProductEvent,
};
use crate::domain::product::{reduce, Product};
use crate::store::{ConcurrencyMode, EventStore, SequenceNumber, StoreError};

/// All possible error types returned by [`Processor::process`].
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The command addressed a product that has no Event Stream yet.
    #[error("no product {sku} in namespace {namespace}")]
    NoSuchProduct {
        /// Namespace the command addressed.
        namespace: String,
        /// SKU the command addressed.
        sku: String,
    },

    /// The command carried a non-positive price.
    #[error("invalid price: {0}")]
    InvalidPrice(f32),

    /// A required command field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The product's Event Stream could not be folded back into a state.
    #[error("failed to rehydrate product from its event stream: {0}")]
    Rehydrate(#[source] DecodeError),

    /// The store rejected the write. Sequence-expectation failures are the
    /// optimistic-concurrency conflicts; the processor surfaces them
    /// without retrying.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Capability performing the side-effectful head check against a product's
/// canonical URL, yielding the outcome and a diagnostic string.
///
/// Injected into the [`Processor`] so tests and deployments can substitute
/// the real check.
#[async_trait]
pub trait HeadChecker: Send + Sync {
    /// Runs the check for the given product.
    async fn check(&self, namespace: &str, sku: &str) -> (bool, String);
}

/// In-process stand-in for the external head check, failing roughly a
/// quarter of the time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomHeadChecker;

#[async_trait]
impl HeadChecker for RandomHeadChecker {
    async fn check(&self, _namespace: &str, sku: &str) -> (bool, String) {
        let success = rand::thread_rng().gen_bool(0.75);
        let info = if success {
            format!("HEAD {sku} responded")
        } else {
            format!("HEAD {sku} did not respond")
        };

        (success, info)
    }
}

fn system_clock() -> i64 {
    // The nanosecond range of i64 runs out in 2262.
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Validates commands against the current product state and turns the
/// accepted ones into stored events.
#[derive(Clone)]
pub struct Processor {
    store: Arc<dyn EventStore>,
    head_checker: Arc<dyn HeadChecker>,
    clock: fn() -> i64,
}

impl Processor {
    /// Creates a processor over the given store and head-check capability,
    /// stamping events with the system clock.
    pub fn new(store: Arc<dyn EventStore>, head_checker: Arc<dyn HeadChecker>) -> Self {
        Self {
            store,
            head_checker,
            clock: system_clock,
        }
    }

    /// Replaces the event timestamp clock. Nanoseconds since the Unix epoch.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Dispatches the command to its handler and returns the sequence
    /// number assigned to the resulting event.
    ///
    /// Commands are not deduplicated: two identical commands produce two
    /// identical events. The history is the ledger.
    pub async fn process(&self, command: ProductCommand) -> Result<SequenceNumber, ProcessError> {
        let command_type = command.command_type();
        let namespace = command.meta().namespace.clone();
        let sku = command.meta().sku.clone();

        let result = match command {
            ProductCommand::Create(cmd) => self.create_product(cmd).await,
            ProductCommand::UpdateAttributes(cmd) => self.update_attributes(cmd).await,
            ProductCommand::UpdateImages(cmd) => self.update_images(cmd).await,
            ProductCommand::UpdatePrice(cmd) => self.update_price(cmd).await,
            ProductCommand::HeadCheck(cmd) => self.head_check(cmd).await,
            ProductCommand::SetActive(cmd) => self.set_active(cmd).await,
        };

        match &result {
            Ok(seq_num) => tracing::info!(
                command = command_type,
                %namespace,
                %sku,
                seq_num = *seq_num,
                "command accepted"
            ),
            Err(error) => tracing::warn!(
                command = command_type,
                %namespace,
                %sku,
                %error,
                "command rejected"
            ),
        }

        result
    }

    /// Rebuilds the current product state from its Event Stream. A missing
    /// stream, a missing namespace, or an empty stream all mean the product
    /// does not exist.
    async fn load(&self, namespace: &str, sku: &str) -> Result<Product, ProcessError> {
        let events = match self.store.event_range(namespace, sku, 0, -1).await {
            Ok(events) => events,
            Err(StoreError::StreamDoesNotExist(_) | StoreError::NamespaceNotFound(_)) => {
                Vec::new()
            },
            Err(error) => return Err(error.into()),
        };

        if events.is_empty() {
            return Err(ProcessError::NoSuchProduct {
                namespace: namespace.to_owned(),
                sku: sku.to_owned(),
            });
        }

        reduce(Product::default(), &events).map_err(ProcessError::Rehydrate)
    }

    async fn append(
        &self,
        namespace: &str,
        sku: &str,
        mode: ConcurrencyMode,
        event: ProductEvent,
    ) -> Result<SequenceNumber, ProcessError> {
        let envelope = event.into_envelope((self.clock)());

        Ok(self.store.write_event(namespace, sku, mode, envelope).await?)
    }

    async fn create_product(&self, cmd: CreateProduct) -> Result<SequenceNumber, ProcessError> {
        if cmd.product.namespace.is_empty() {
            return Err(ProcessError::MissingField("product.ns"));
        }
        if cmd.product.title.is_empty() {
            return Err(ProcessError::MissingField("product.title"));
        }
        if cmd.product.price <= 0.0 {
            return Err(ProcessError::InvalidPrice(cmd.product.price));
        }

        let event = ProductEvent::Created(ProductCreated {
            namespace: cmd.meta.namespace.clone(),
            sku: cmd.meta.sku.clone(),
            source: cmd.source,
            product: cmd.product,
        });

        self.append(
            &cmd.meta.namespace,
            &cmd.meta.sku,
            ConcurrencyMode::NewStream,
            event,
        )
        .await
    }

    async fn update_attributes(
        &self,
        cmd: UpdateAttributes,
    ) -> Result<SequenceNumber, ProcessError> {
        let current = self.load(&cmd.meta.namespace, &cmd.meta.sku).await?;

        let event = ProductEvent::AttribsUpdated(AttribsUpdated {
            namespace: cmd.meta.namespace.clone(),
            sku: cmd.meta.sku.clone(),
            title: cmd.title,
            description: cmd.description,
            url: cmd.url,
        });

        self.append(
            &cmd.meta.namespace,
            &cmd.meta.sku,
            ConcurrencyMode::ExpectingSeqNum(current.sequence_num),
            event,
        )
        .await
    }

    async fn update_images(&self, cmd: UpdateImages) -> Result<SequenceNumber, ProcessError> {
        let current = self.load(&cmd.meta.namespace, &cmd.meta.sku).await?;

        let event = ProductEvent::ImagesUpdated(ImagesUpdated {
            namespace: cmd.meta.namespace.clone(),
            sku: cmd.meta.sku.clone(),
            images: cmd.images,
            primary_img_idx: cmd.primary_img_idx,
        });

        self.append(
            &cmd.meta.namespace,
            &cmd.meta.sku,
            ConcurrencyMode::ExpectingSeqNum(current.sequence_num),
            event,
        )
        .await
    }

    async fn update_price(&self, cmd: UpdatePrice) -> Result<SequenceNumber, ProcessError> {
        let current = self.load(&cmd.meta.namespace, &cmd.meta.sku).await?;

        if cmd.price <= 0.0 {
            return Err(ProcessError::InvalidPrice(cmd.price));
        }

        let event = ProductEvent::PriceUpdated(PriceUpdated {
            namespace: cmd.meta.namespace.clone(),
            sku: cmd.meta.sku.clone(),
            price: cmd.price,
        });

        self.append(
            &cmd.meta.namespace,
            &cmd.meta.sku,
            ConcurrencyMode::ExpectingSeqNum(current.sequence_num),
            event,
        )
        .await
    }

    async fn head_check(&self, cmd: HeadCheck) -> Result<SequenceNumber, ProcessError> {
        let current = self.load(&cmd.meta.namespace, &cmd.meta.sku).await?;

        let (success, info) = self
            .head_checker
            .check(&cmd.meta.namespace, &cmd.meta.sku)
            .await;

        let event = ProductEvent::HeadCheckPerformed(HeadCheckPerformed {
            namespace: cmd.meta.namespace.clone(),
            sku: cmd.meta.sku.clone(),
            reason: cmd.reason,
            success,
            info,
        });

        self.append(
            &cmd.meta.namespace,
            &cmd.meta.sku,
            ConcurrencyMode::ExpectingSeqNum(current.sequence_num),
            event,
        )
        .await
    }

    async fn set_active(&self, cmd: SetActive) -> Result<SequenceNumber, ProcessError> {
        let current = self.load(&cmd.meta.namespace, &cmd.meta.sku).await?;

        // Redundant state changes are still recorded: the command history
        // is preserved, the signal is only logged.
        if current.is_active == cmd.active {
            tracing::info!(
                namespace = %cmd.meta.namespace,
                sku = %cmd.meta.sku,
                active = cmd.active,
                "redundant active-state command"
            );
        }

        let event = ProductEvent::ActiveStateSet(ActiveStateSet {
            namespace: cmd.meta.namespace.clone(),
            sku: cmd.meta.sku.clone(),
            active: cmd.active,
        });

        self.append(
            &cmd.meta.namespace,
            &cmd.meta.sku,
            ConcurrencyMode::ExpectingSeqNum(current.sequence_num),
            event,
        )
        .await
    }
}
