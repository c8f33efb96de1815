//! In-memory implementation of the [`EventStore`] interface, backed by a
//! thread-safe [`std::collections::HashMap`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::store::{ConcurrencyMode, EventEnvelope, EventStore, SequenceNumber, StoreError};

#[derive(Debug, Default)]
struct Backend {
    // namespace -> stream id -> ordered envelopes
    namespaces: HashMap<String, HashMap<String, Vec<EventEnvelope>>>,
}

/// In-memory [`EventStore`], with namespaces created implicitly on first
/// write.
///
/// A single coarse lock guards the whole namespace map, making every
/// operation linearizable with respect to all others. Cloning the store
/// yields a handle to the same backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    backend: Arc<RwLock<Backend>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn admit(
    stream: Option<&[EventEnvelope]>,
    stream_id: &str,
    mode: ConcurrencyMode,
) -> Result<(), StoreError> {
    match (stream, mode) {
        (Some(_), ConcurrencyMode::Any | ConcurrencyMode::ExistingStream) => Ok(()),
        (Some(_), ConcurrencyMode::NewStream) => {
            Err(StoreError::StreamAlreadyExists(stream_id.to_owned()))
        },
        (Some(stream), ConcurrencyMode::ExpectingSeqNum(expected)) => match stream.last() {
            None => Err(StoreError::SequenceExpectationFailed {
                stream_id: stream_id.to_owned(),
                expected,
                actual: -1,
            }),
            Some(last) if last.seq_num != expected => Err(StoreError::SequenceExpectationFailed {
                stream_id: stream_id.to_owned(),
                expected,
                actual: last.seq_num,
            }),
            Some(_) => Ok(()),
        },
        (None, ConcurrencyMode::Any | ConcurrencyMode::NewStream) => Ok(()),
        (None, ConcurrencyMode::ExistingStream | ConcurrencyMode::ExpectingSeqNum(_)) => {
            Err(StoreError::StreamDoesNotExist(stream_id.to_owned()))
        },
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn namespaces(&self) -> Vec<String> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        backend.namespaces.keys().cloned().collect()
    }

    async fn streams(&self, namespace: &str) -> Vec<String> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        backend
            .namespaces
            .get(namespace)
            .map(|streams| streams.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn namespace_exists(&self, namespace: &str) -> bool {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        backend.namespaces.contains_key(namespace)
    }

    async fn stream_exists(&self, namespace: &str, stream_id: &str) -> bool {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        backend
            .namespaces
            .get(namespace)
            .is_some_and(|streams| streams.contains_key(stream_id))
    }

    async fn write_event(
        &self,
        namespace: &str,
        stream_id: &str,
        mode: ConcurrencyMode,
        envelope: EventEnvelope,
    ) -> Result<SequenceNumber, StoreError> {
        self.write_batch(namespace, stream_id, mode, vec![envelope])
            .await
    }

    async fn write_batch(
        &self,
        namespace: &str,
        stream_id: &str,
        mode: ConcurrencyMode,
        envelopes: Vec<EventEnvelope>,
    ) -> Result<SequenceNumber, StoreError> {
        let mut backend = self
            .backend
            .write()
            .expect("acquire write lock on event store backend");

        // Admission is checked once, against the stream state before the
        // batch. With the stream map still untouched at this point, a
        // rejected batch leaves no trace, and namespaces are only created
        // by admitted writes.
        let stream = backend
            .namespaces
            .get(namespace)
            .and_then(|streams| streams.get(stream_id))
            .map(Vec::as_slice);

        admit(stream, stream_id, mode)?;

        let stream = backend
            .namespaces
            .entry(namespace.to_owned())
            .or_default()
            .entry(stream_id.to_owned())
            .or_default();

        let mut last_assigned = stream.len() as SequenceNumber - 1;

        for mut envelope in envelopes {
            envelope.seq_num = stream.len() as SequenceNumber;
            last_assigned = envelope.seq_num;
            stream.push(envelope);
        }

        Ok(last_assigned)
    }

    async fn event(
        &self,
        namespace: &str,
        stream_id: &str,
        seq_num: SequenceNumber,
    ) -> Result<EventEnvelope, StoreError> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        let streams = backend
            .namespaces
            .get(namespace)
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.to_owned()))?;

        let stream = streams
            .get(stream_id)
            .ok_or_else(|| StoreError::StreamDoesNotExist(stream_id.to_owned()))?;

        stream
            .iter()
            .find(|envelope| envelope.seq_num == seq_num)
            .cloned()
            .ok_or_else(|| StoreError::EventNotFound {
                namespace: namespace.to_owned(),
                stream_id: stream_id.to_owned(),
                seq_num,
            })
    }

    async fn event_range(
        &self,
        namespace: &str,
        stream_id: &str,
        start: SequenceNumber,
        end: SequenceNumber,
    ) -> Result<Vec<EventEnvelope>, StoreError> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        let streams = backend
            .namespaces
            .get(namespace)
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.to_owned()))?;

        let stream = streams
            .get(stream_id)
            .ok_or_else(|| StoreError::StreamDoesNotExist(stream_id.to_owned()))?;

        let len = stream.len() as SequenceNumber;
        let start = start.max(0);

        if start >= len {
            return Ok(Vec::new());
        }

        // Out-of-bounds, negative, or inverted upper bounds all read to the
        // end of the stream.
        let end = if end < 0 || end < start || end >= len {
            len
        } else {
            end + 1
        };

        Ok(stream[start as usize..end as usize].to_vec())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use tokio::sync::Barrier;

    use super::*;

    const NS: &str = "Nike";
    const STREAM: &str = "SHOE001";

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope {
            // Deliberately bogus: the store must overwrite it on append.
            seq_num: 99,
            timestamp: 1,
            event_type: event_type.to_owned(),
            data: b"{}".to_vec(),
        }
    }

    #[tokio::test]
    async fn appends_assign_dense_sequence_numbers() {
        let store = InMemoryStore::new();

        for expected in 0..3 {
            let assigned = store
                .write_event(NS, STREAM, ConcurrencyMode::Any, envelope("test-1"))
                .await
                .expect("append should not fail");

            assert_eq!(expected, assigned);
        }

        let events = store
            .event_range(NS, STREAM, 0, -1)
            .await
            .expect("stream should exist");

        assert_eq!(3, events.len());
        for (position, event) in events.iter().enumerate() {
            assert_eq!(position as SequenceNumber, event.seq_num);
        }
    }

    #[tokio::test]
    async fn write_batch_appends_all_or_nothing() {
        let store = InMemoryStore::new();

        store
            .write_event(NS, STREAM, ConcurrencyMode::NewStream, envelope("test-1"))
            .await
            .expect("stream creation should not fail");

        let last = store
            .write_batch(
                NS,
                STREAM,
                ConcurrencyMode::ExpectingSeqNum(0),
                vec![envelope("test-1"), envelope("test-1")],
            )
            .await
            .expect("batch with matching expectation should be admitted");

        assert_eq!(2, last);

        let result = store
            .write_batch(
                NS,
                STREAM,
                ConcurrencyMode::ExpectingSeqNum(0),
                vec![envelope("test-1"), envelope("test-1")],
            )
            .await;

        assert_eq!(
            Err(StoreError::SequenceExpectationFailed {
                stream_id: STREAM.to_owned(),
                expected: 0,
                actual: 2,
            }),
            result
        );

        let events = store
            .event_range(NS, STREAM, 0, -1)
            .await
            .expect("stream should exist");

        assert_eq!(3, events.len());
    }

    #[tokio::test]
    async fn new_stream_mode_fails_on_existing_stream() {
        let store = InMemoryStore::new();

        store
            .write_event(NS, STREAM, ConcurrencyMode::NewStream, envelope("test-1"))
            .await
            .expect("stream creation should not fail");

        let result = store
            .write_event(NS, STREAM, ConcurrencyMode::NewStream, envelope("test-1"))
            .await;

        assert_eq!(Err(StoreError::StreamAlreadyExists(STREAM.to_owned())), result);
    }

    #[tokio::test]
    async fn existing_stream_mode_fails_on_missing_stream() {
        let store = InMemoryStore::new();

        let result = store
            .write_event(NS, STREAM, ConcurrencyMode::ExistingStream, envelope("test-1"))
            .await;

        assert_eq!(Err(StoreError::StreamDoesNotExist(STREAM.to_owned())), result);
    }

    #[tokio::test]
    async fn expecting_seq_num_admits_only_a_matching_head() {
        let store = InMemoryStore::new();

        store
            .write_event(NS, STREAM, ConcurrencyMode::NewStream, envelope("test-1"))
            .await
            .expect("stream creation should not fail");

        let assigned = store
            .write_event(
                NS,
                STREAM,
                ConcurrencyMode::ExpectingSeqNum(0),
                envelope("test-1"),
            )
            .await
            .expect("matching expectation should be admitted");

        assert_eq!(1, assigned);

        let result = store
            .write_event(
                NS,
                STREAM,
                ConcurrencyMode::ExpectingSeqNum(0),
                envelope("test-1"),
            )
            .await;

        assert_eq!(
            Err(StoreError::SequenceExpectationFailed {
                stream_id: STREAM.to_owned(),
                expected: 0,
                actual: 1,
            }),
            result
        );
    }

    #[tokio::test]
    async fn expecting_seq_num_fails_on_missing_stream() {
        let store = InMemoryStore::new();

        let result = store
            .write_event(
                NS,
                STREAM,
                ConcurrencyMode::ExpectingSeqNum(0),
                envelope("test-1"),
            )
            .await;

        assert_eq!(Err(StoreError::StreamDoesNotExist(STREAM.to_owned())), result);
    }

    #[tokio::test]
    async fn expecting_seq_num_on_empty_stream_reports_no_events() {
        let store = InMemoryStore::new();

        // An admitted empty batch creates the stream without any events.
        let head = store
            .write_batch(NS, STREAM, ConcurrencyMode::NewStream, Vec::new())
            .await
            .expect("empty batch should be admitted");

        assert_eq!(-1, head);
        assert!(store.stream_exists(NS, STREAM).await);

        let result = store
            .write_event(
                NS,
                STREAM,
                ConcurrencyMode::ExpectingSeqNum(0),
                envelope("test-1"),
            )
            .await;

        assert_eq!(
            Err(StoreError::SequenceExpectationFailed {
                stream_id: STREAM.to_owned(),
                expected: 0,
                actual: -1,
            }),
            result
        );
    }

    #[tokio::test]
    async fn empty_range_on_empty_stream_is_not_an_error() {
        let store = InMemoryStore::new();

        store
            .write_batch(NS, STREAM, ConcurrencyMode::NewStream, Vec::new())
            .await
            .expect("empty batch should be admitted");

        let events = store
            .event_range(NS, STREAM, 0, -1)
            .await
            .expect("existing stream should be readable");

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn event_range_clamps_and_slices_inclusively() {
        let store = InMemoryStore::new();

        let batch = (0..5).map(|_| envelope("test-1")).collect();
        store
            .write_batch(NS, STREAM, ConcurrencyMode::Any, batch)
            .await
            .expect("append should not fail");

        let seqs = |events: Vec<EventEnvelope>| {
            events.into_iter().map(|e| e.seq_num).collect::<Vec<_>>()
        };

        let inclusive = store.event_range(NS, STREAM, 1, 3).await.unwrap();
        assert_eq!(vec![1, 2, 3], seqs(inclusive));

        let clamped_start = store.event_range(NS, STREAM, -5, 2).await.unwrap();
        assert_eq!(vec![0, 1, 2], seqs(clamped_start));

        let open_end = store.event_range(NS, STREAM, 2, -1).await.unwrap();
        assert_eq!(vec![2, 3, 4], seqs(open_end));

        let inverted_end = store.event_range(NS, STREAM, 3, 1).await.unwrap();
        assert_eq!(vec![3, 4], seqs(inverted_end));

        let past_end = store.event_range(NS, STREAM, 0, 99).await.unwrap();
        assert_eq!(vec![0, 1, 2, 3, 4], seqs(past_end));

        let start_past_end = store.event_range(NS, STREAM, 7, 9).await.unwrap();
        assert!(start_past_end.is_empty());
    }

    #[tokio::test]
    async fn reads_on_unknown_targets_fail() {
        let store = InMemoryStore::new();

        store
            .write_event(NS, STREAM, ConcurrencyMode::Any, envelope("test-1"))
            .await
            .expect("append should not fail");

        assert_eq!(
            Err(StoreError::NamespaceNotFound("Adidas".to_owned())),
            store.event_range("Adidas", STREAM, 0, -1).await,
        );

        assert_eq!(
            Err(StoreError::StreamDoesNotExist("SHOE999".to_owned())),
            store.event_range(NS, "SHOE999", 0, -1).await,
        );

        assert_eq!(
            Err(StoreError::EventNotFound {
                namespace: NS.to_owned(),
                stream_id: STREAM.to_owned(),
                seq_num: 42,
            }),
            store.event(NS, STREAM, 42).await,
        );
    }

    #[tokio::test]
    async fn event_returns_the_exact_sequence_number() {
        let store = InMemoryStore::new();

        store
            .write_batch(
                NS,
                STREAM,
                ConcurrencyMode::Any,
                vec![envelope("test-1"), envelope("test-2")],
            )
            .await
            .expect("append should not fail");

        let event = store
            .event(NS, STREAM, 1)
            .await
            .expect("event should be found");

        assert_eq!(1, event.seq_num);
        assert_eq!("test-2", event.event_type);
    }

    #[tokio::test]
    async fn namespaces_are_created_by_the_first_write() {
        let store = InMemoryStore::new();

        assert!(!store.namespace_exists(NS).await);
        assert!(store.streams(NS).await.is_empty());

        store
            .write_event(NS, STREAM, ConcurrencyMode::Any, envelope("test-1"))
            .await
            .expect("append should not fail");

        assert!(store.namespace_exists(NS).await);
        assert!(store.stream_exists(NS, STREAM).await);
        assert_eq!(vec![NS.to_owned()], store.namespaces().await);
        assert_eq!(vec![STREAM.to_owned()], store.streams(NS).await);
    }

    #[tokio::test]
    async fn rejected_writes_do_not_create_streams() {
        let store = InMemoryStore::new();

        let result = store
            .write_event(NS, STREAM, ConcurrencyMode::ExistingStream, envelope("test-1"))
            .await;

        assert!(result.is_err());
        assert!(!store.namespace_exists(NS).await);
        assert!(!store.stream_exists(NS, STREAM).await);
    }

    #[tokio::test]
    async fn returned_envelopes_are_independent_copies() {
        let store = InMemoryStore::new();

        store
            .write_event(NS, STREAM, ConcurrencyMode::Any, envelope("test-1"))
            .await
            .expect("append should not fail");

        let mut events = store.event_range(NS, STREAM, 0, -1).await.unwrap();
        events[0].event_type = "mutated".to_owned();
        events[0].data = b"mutated".to_vec();

        let unchanged = store.event(NS, STREAM, 0).await.unwrap();
        assert_eq!("test-1", unchanged.event_type);
        assert_eq!(b"{}".to_vec(), unchanged.data);
    }

    #[tokio::test]
    async fn concurrent_appends_remain_dense() {
        let store = Arc::new(InMemoryStore::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..4 {
                    store
                        .write_event(NS, STREAM, ConcurrencyMode::Any, envelope("test-1"))
                        .await
                        .expect("append should not fail");
                }
            }));
        }

        for handle in handles {
            handle.await.expect("writer task should not panic");
        }

        let events = store.event_range(NS, STREAM, 0, -1).await.unwrap();
        assert_eq!(64, events.len());
        for (position, event) in events.iter().enumerate() {
            assert_eq!(position as SequenceNumber, event.seq_num);
        }
    }

    #[tokio::test]
    async fn racing_expectation_writes_admit_a_single_winner() {
        let store = Arc::new(InMemoryStore::new());

        store
            .write_event(NS, STREAM, ConcurrencyMode::NewStream, envelope("test-1"))
            .await
            .expect("stream creation should not fail");

        // Both writers observe the head before either appends, so exactly
        // one of them can win the expectation check.
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                let head = store
                    .event_range(NS, STREAM, 0, -1)
                    .await
                    .expect("stream should exist")
                    .last()
                    .map(|event| event.seq_num)
                    .expect("stream should not be empty");

                barrier.wait().await;

                store
                    .write_event(
                        NS,
                        STREAM,
                        ConcurrencyMode::ExpectingSeqNum(head),
                        envelope("test-1"),
                    )
                    .await
            }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.expect("writer task should not panic"));
        }

        let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(1, winners);

        let loser = outcomes
            .into_iter()
            .find(Result::is_err)
            .expect("one writer should lose the race");

        assert_eq!(
            Err(StoreError::SequenceExpectationFailed {
                stream_id: STREAM.to_owned(),
                expected: 0,
                actual: 1,
            }),
            loser
        );
    }
}
