//! Contains the definition of the [`EventStore`] interface, the
//! [`EventEnvelope`] value stored in it, and the [`memory`] module with the
//! [`InMemoryStore`] implementation backed by a [`std::collections::HashMap`].
//!
//! An Event Store holds ordered, append-only Event Streams addressed by
//! `(namespace, stream id)`. Appends go through a [`ConcurrencyMode`]
//! admission policy, which is how optimistic concurrency control is
//! implemented on top of the store.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::InMemoryStore;

/// Position of an [`EventEnvelope`] inside its Event Stream.
///
/// Sequence numbers are dense and zero-based: the envelopes of a stream
/// always carry `0, 1, 2, ..` in storage order. The value `-1` is used in
/// [`StoreError::SequenceExpectationFailed`] to report a stream that holds
/// no events yet.
pub type SequenceNumber = i64;

/// A Domain Event as persisted in an Event Stream.
///
/// The payload in `data` is opaque to the store: it is an already-serialized
/// event body, discriminated by the `event_type` tag. Once stored, an
/// envelope is never mutated; reads return independent copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Position in the Event Stream, assigned by the store on append.
    /// Whatever value the caller provides is overwritten.
    #[serde(rename = "n")]
    pub seq_num: SequenceNumber,

    /// Nanoseconds since the Unix epoch, provided by the producer.
    #[serde(rename = "ts")]
    pub timestamp: i64,

    /// Stable tag discriminating the event variant carried in `data`.
    #[serde(rename = "et")]
    pub event_type: String,

    /// Serialized event body.
    #[serde(rename = "d")]
    pub data: Vec<u8>,
}

/// Admission policy evaluated by the store before appending to a stream.
///
/// The policy is checked once, against the state of the stream as it was
/// before any element of the write is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Append unconditionally, creating the stream if missing.
    Any,

    /// Append only if the stream does not exist yet; the stream is created.
    NewStream,

    /// Append only if the stream already exists.
    ExistingStream,

    /// Append only if the last sequence number of the stream matches the
    /// expected value. Fails on a missing stream, and fails with
    /// `actual = -1` on a stream that holds no events.
    ExpectingSeqNum(SequenceNumber),
}

/// All possible error types returned by [`EventStore`] operations.
///
/// Every variant keeps its discriminating data inspectable, so callers can
/// match on the failure kind instead of parsing messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Returned by a [`ConcurrencyMode::NewStream`] write when the target
    /// stream already exists.
    #[error("stream ({0}) already exists")]
    StreamAlreadyExists(String),

    /// Returned when the target stream is required to exist and does not.
    #[error("stream ({0}) does not exist")]
    StreamDoesNotExist(String),

    /// Returned by a [`ConcurrencyMode::ExpectingSeqNum`] write when the
    /// stream head does not match the expected sequence number.
    /// `actual == -1` means the stream holds no events.
    #[error(
        "stream ({stream_id}) expected last sequence {expected}, actual last sequence {actual}"
    )]
    SequenceExpectationFailed {
        /// Identifier of the stream the write targeted.
        stream_id: String,
        /// The sequence number the writer observed before the write.
        expected: SequenceNumber,
        /// The sequence number at the head of the stream at write time.
        actual: SequenceNumber,
    },

    /// Returned by reads addressing a namespace that was never written to.
    #[error("namespace ({0}) not found")]
    NamespaceNotFound(String),

    /// Returned by [`EventStore::event`] when no envelope carries the
    /// requested sequence number.
    #[error("event sequence {seq_num} not found in stream {stream_id}, namespace {namespace}")]
    EventNotFound {
        /// Namespace the lookup addressed.
        namespace: String,
        /// Stream the lookup addressed.
        stream_id: String,
        /// The sequence number that was not found.
        seq_num: SequenceNumber,
    },
}

/// Interface of an ordered, namespaced, append-only Event Store.
///
/// All operations are linearizable with respect to each other. Writes are
/// all-or-nothing: no reader or writer ever observes a partially-applied
/// batch. Implementations assign sequence numbers themselves; callers cannot
/// choose them.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Returns the set of known namespaces, in unspecified order.
    async fn namespaces(&self) -> Vec<String>;

    /// Returns the stream ids within a namespace, in unspecified order.
    /// An unknown namespace yields an empty list, not an error.
    async fn streams(&self, namespace: &str) -> Vec<String>;

    /// Whether at least one stream was ever written into the namespace.
    async fn namespace_exists(&self, namespace: &str) -> bool;

    /// Whether the stream exists within the namespace.
    async fn stream_exists(&self, namespace: &str, stream_id: &str) -> bool;

    /// Appends a single envelope to a stream, returning its assigned
    /// sequence number. Convenience over [`EventStore::write_batch`].
    async fn write_event(
        &self,
        namespace: &str,
        stream_id: &str,
        mode: ConcurrencyMode,
        envelope: EventEnvelope,
    ) -> Result<SequenceNumber, StoreError>;

    /// Appends a batch of envelopes atomically, returning the last assigned
    /// sequence number.
    ///
    /// The admission policy is evaluated once, against the stream state
    /// before the batch; either every envelope is appended or none is.
    /// A successful write into an unknown namespace creates it. An admitted
    /// empty batch still creates a missing stream, and returns the current
    /// head sequence (`-1` when the stream holds no events).
    async fn write_batch(
        &self,
        namespace: &str,
        stream_id: &str,
        mode: ConcurrencyMode,
        envelopes: Vec<EventEnvelope>,
    ) -> Result<SequenceNumber, StoreError>;

    /// Returns the envelope carrying the given sequence number.
    async fn event(
        &self,
        namespace: &str,
        stream_id: &str,
        seq_num: SequenceNumber,
    ) -> Result<EventEnvelope, StoreError>;

    /// Returns the inclusive slice `[start..=end]` of a stream.
    ///
    /// A negative `start` is clamped to `0`. When `end` is negative, lower
    /// than `start`, or past the end of the stream, the slice extends to the
    /// end of the stream. A `start` past the end of the stream yields an
    /// empty list. Addressing a missing stream or namespace is an error.
    async fn event_range(
        &self,
        namespace: &str,
        stream_id: &str,
        start: SequenceNumber,
        end: SequenceNumber,
    ) -> Result<Vec<EventEnvelope>, StoreError>;
}
