use std::sync::Arc;

use kin_resolver::{CidResolver, Resolution};
use kin_store::ObjectStoreClient;
use kin_types::{ContentId, Did};
use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::paths::{namespace_prefix, other_party, LogicalPath, Namespace};
use crate::record::RelationshipRecord;
use crate::saga::{AcceptProgress, AcceptReceipt, AcceptStep, WrittenRecord};
use crate::state::{RelationshipState, SymmetryReport};

/// Friend-request state machine over an object store.
///
/// The store holds no state of its own: every operation reads and writes the
/// path convention through the injected client, and every "does this exist
/// / what is its current version" question goes through the
/// [`CidResolver`]. Operations on different pairs run fully in parallel;
/// operations on the same pair are not serialized (last writer wins).
pub struct RelationshipStore<C: ?Sized> {
    client: Arc<C>,
    resolver: CidResolver<C>,
    config: Arc<GraphConfig>,
}

impl<C: ?Sized> Clone for RelationshipStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            resolver: self.resolver.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C: ObjectStoreClient + ?Sized> RelationshipStore<C> {
    /// Build a store over `client` with a validated configuration.
    pub fn new(client: Arc<C>, config: GraphConfig) -> GraphResult<Self> {
        config.validate()?;
        Ok(Self {
            resolver: CidResolver::new(Arc::clone(&client)),
            client,
            config: Arc::new(config),
        })
    }

    /// Build a store with the default configuration.
    pub fn with_defaults(client: Arc<C>) -> Self {
        Self {
            resolver: CidResolver::new(Arc::clone(&client)),
            client,
            config: Arc::new(GraphConfig::default()),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CidResolver<C> {
        &self.resolver
    }

    /// Storage key of a logical path under the configured root.
    pub fn key(&self, path: &LogicalPath) -> String {
        path.render(&self.config.root)
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    /// Participants with a request pending for `user`.
    pub async fn list_pending(&self, user: &str) -> GraphResult<Vec<Did>> {
        let user = parse_did("user", user)?;
        self.list_namespace(&user, Namespace::Pending).await
    }

    /// Participants `user` is friends with.
    pub async fn list_friends(&self, user: &str) -> GraphResult<Vec<Did>> {
        let user = parse_did("user", user)?;
        self.list_namespace(&user, Namespace::Friends).await
    }

    async fn list_namespace(&self, owner: &Did, namespace: Namespace) -> GraphResult<Vec<Did>> {
        let prefix = namespace_prefix(&self.config.root, owner, namespace);
        let entries = self.client.list(&prefix).await?;

        let mut others = Vec::with_capacity(entries.len());
        for entry in entries {
            match other_party(&prefix, &entry.key) {
                Some(other) => others.push(other),
                None => warn!(key = %entry.key, "skipping key outside the path convention"),
            }
        }
        others.sort();
        others.dedup();
        debug!(owner = %owner, %namespace, count = others.len(), "listed namespace");
        Ok(others)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Record a friend request from `requester` to `recipient`.
    ///
    /// Writes only into the recipient's `pending` namespace. Sending the same
    /// request again overwrites the same path.
    pub async fn send_request(&self, requester: &str, recipient: &str) -> GraphResult<WrittenRecord> {
        let (requester, recipient) = parse_pair(requester, recipient)?;
        let path = LogicalPath::pending(&recipient, &requester);
        let written = self.write_record(&path).await?;
        info!(requester = %requester, recipient = %recipient, path = %written.path, "friend request sent");
        Ok(written)
    }

    /// Accept the request `requester` sent to `accepter`.
    ///
    /// Reads and checks the pending record, then runs the accept saga. A
    /// failure of the first write leaves nothing behind and surfaces as the
    /// backend error; a failure after it surfaces as
    /// [`GraphError::PartialAcceptance`].
    pub async fn accept_request(&self, accepter: &str, requester: &str) -> GraphResult<AcceptReceipt> {
        let (accepter, requester) = parse_pair(accepter, requester)?;
        let path = LogicalPath::pending(&accepter, &requester);
        let key = self.key(&path);

        let content_id = self.resolve_pending(&key).await?;
        let data = self.resolver.fetch(&content_id).await?;
        RelationshipRecord::decode(&key, &data)?.verify(&path, &key)?;

        self.run_saga(AcceptProgress::new(accepter, requester)).await
    }

    /// Finish an acceptance that stopped part-way.
    ///
    /// Runs every step the marker does not list as completed. The pending
    /// record is not re-read: it may already be gone.
    pub async fn resume_acceptance(&self, progress: AcceptProgress) -> GraphResult<AcceptReceipt> {
        if progress.accepter == progress.requester {
            return Err(GraphError::InvalidInput(
                "accepter and requester must differ".into(),
            ));
        }
        info!(saga = %progress.saga_id, remaining = progress.remaining().len(), "resuming acceptance");
        self.run_saga(progress).await
    }

    async fn resolve_pending(&self, key: &str) -> GraphResult<ContentId> {
        let resolution = match self.resolver.resolve(key).await? {
            Resolution::Pending => self.resolver.resolve_with_retry(key, &self.config.retry).await?,
            other => other,
        };
        match resolution {
            Resolution::Resolved(id) => Ok(id),
            Resolution::NotFound | Resolution::Pending => Err(GraphError::NotFound {
                path: key.to_string(),
            }),
        }
    }

    async fn run_saga(&self, mut progress: AcceptProgress) -> GraphResult<AcceptReceipt> {
        let mut written = Vec::new();

        for step in progress.remaining() {
            let target = step.target(&progress.accepter, &progress.requester);
            let key = self.key(&target);
            let result = match step {
                AcceptStep::WriteAccepterFriends | AcceptStep::WriteRequesterFriends => {
                    let data = RelationshipRecord::for_path(&target).encode(&key)?;
                    match self.client.put(&key, data).await {
                        Ok(receipt) => {
                            written.push(WrittenRecord {
                                path: key,
                                content_id: receipt.content_id,
                            });
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                AcceptStep::DeletePending => match self.client.delete(&key).await {
                    Ok(receipt) => {
                        if !receipt.success {
                            debug!(path = %key, "pending record already gone");
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
            };

            if let Err(source) = result {
                if progress.completed.is_empty() {
                    return Err(GraphError::Backend(source));
                }
                warn!(saga = %progress.saga_id, %step, error = %source, "acceptance partially applied");
                return Err(GraphError::PartialAcceptance {
                    progress: Box::new(progress),
                    source,
                });
            }
            debug!(saga = %progress.saga_id, %step, "saga step done");
            progress.mark(step);
        }

        info!(
            saga = %progress.saga_id,
            accepter = %progress.accepter,
            requester = %progress.requester,
            "friend request accepted"
        );
        Ok(AcceptReceipt { progress, written })
    }

    async fn write_record(&self, path: &LogicalPath) -> GraphResult<WrittenRecord> {
        let key = self.key(path);
        let data = RelationshipRecord::for_path(path).encode(&key)?;
        let receipt = self.client.put(&key, data).await?;
        Ok(WrittenRecord {
            path: key,
            content_id: receipt.content_id,
        })
    }

    // -----------------------------------------------------------------------
    // Derived views
    // -----------------------------------------------------------------------

    async fn exists(&self, path: &LogicalPath) -> GraphResult<bool> {
        Ok(self.resolver.resolve(&self.key(path)).await?.exists())
    }

    /// Derive the relationship between `a` and `b` from the stored records.
    pub async fn relationship_state(&self, a: &str, b: &str) -> GraphResult<RelationshipState> {
        let (a, b) = parse_pair(a, b)?;

        let a_lists_b = self.exists(&LogicalPath::friends(&a, &b)).await?;
        let b_lists_a = self.exists(&LogicalPath::friends(&b, &a)).await?;
        match (a_lists_b, b_lists_a) {
            (true, true) => return Ok(RelationshipState::Accepted),
            (true, false) => {
                return Ok(RelationshipState::HalfAccepted {
                    has_record: a,
                    missing_record: b,
                })
            }
            (false, true) => {
                return Ok(RelationshipState::HalfAccepted {
                    has_record: b,
                    missing_record: a,
                })
            }
            (false, false) => {}
        }

        let a_asked_b = self.exists(&LogicalPath::pending(&b, &a)).await?;
        let b_asked_a = self.exists(&LogicalPath::pending(&a, &b)).await?;
        Ok(match (a_asked_b, b_asked_a) {
            (true, true) => RelationshipState::MutuallyPending,
            (true, false) => RelationshipState::Pending {
                requester: a,
                recipient: b,
            },
            (false, true) => RelationshipState::Pending {
                requester: b,
                recipient: a,
            },
            (false, false) => RelationshipState::Absent,
        })
    }

    /// Check that every friend of `user` lists `user` back, and that no
    /// request from an existing friend is still pending.
    pub async fn audit_symmetry(&self, user: &str) -> GraphResult<SymmetryReport> {
        let user = parse_did("user", user)?;
        let friends = self.list_namespace(&user, Namespace::Friends).await?;
        let pending = self.list_namespace(&user, Namespace::Pending).await?;

        let mut missing_reciprocal = Vec::new();
        for friend in &friends {
            if !self.exists(&LogicalPath::friends(friend, &user)).await? {
                missing_reciprocal.push(friend.clone());
            }
        }
        let stale_pending: Vec<Did> = pending
            .into_iter()
            .filter(|p| friends.binary_search(p).is_ok())
            .collect();

        let report = SymmetryReport {
            user,
            friends_checked: friends.len(),
            missing_reciprocal,
            stale_pending,
        };
        if !report.is_consistent() {
            warn!(
                user = %report.user,
                missing = report.missing_reciprocal.len(),
                stale = report.stale_pending.len(),
                "asymmetric relationships found"
            );
        }
        Ok(report)
    }
}

fn parse_did(role: &str, value: &str) -> GraphResult<Did> {
    Did::parse(value).map_err(|e| GraphError::InvalidInput(format!("{role}: {e}")))
}

/// Parse two distinct identities.
fn parse_pair(first: &str, second: &str) -> GraphResult<(Did, Did)> {
    let first = parse_did("first participant", first)?;
    let second = parse_did("second participant", second)?;
    if first == second {
        return Err(GraphError::InvalidInput(format!(
            "a participant cannot relate to itself: {first}"
        )));
    }
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use kin_resolver::RetryPolicy;
    use kin_store::{FaultKind, InMemoryObjectStore, PropagationLag, StoreError, StoreOp};
    use tokio::time::Instant;

    use super::*;

    const ALICE: &str = "did:x:alice";
    const BOB: &str = "did:x:bob";
    const CAROL: &str = "did:x:carol";
    const DAVE: &str = "did:x:dave";

    fn setup_with(lag: PropagationLag) -> (Arc<InMemoryObjectStore>, RelationshipStore<InMemoryObjectStore>) {
        let backend = Arc::new(InMemoryObjectStore::new().with_propagation_lag(lag));
        let store = RelationshipStore::with_defaults(Arc::clone(&backend));
        (backend, store)
    }

    fn setup() -> (Arc<InMemoryObjectStore>, RelationshipStore<InMemoryObjectStore>) {
        setup_with(PropagationLag::Immediate)
    }

    fn did(s: &str) -> Did {
        Did::parse(s).unwrap()
    }

    fn friends_key(owner: &str, other: &str) -> String {
        LogicalPath::friends(&did(owner), &did(other)).render("friendships")
    }

    fn pending_key(owner: &str, other: &str) -> String {
        LogicalPath::pending(&did(owner), &did(other)).render("friendships")
    }

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn request_then_accept() {
        let (_, store) = setup();

        store.send_request(ALICE, BOB).await.unwrap();
        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![ALICE]);
        assert!(store.list_pending(ALICE).await.unwrap().is_empty());

        store.accept_request(BOB, ALICE).await.unwrap();
        assert_eq!(store.list_friends(BOB).await.unwrap(), vec![ALICE]);
        assert_eq!(store.list_friends(ALICE).await.unwrap(), vec![BOB]);
        assert!(store.list_pending(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accept_without_request_is_not_found() {
        let (backend, store) = setup();

        let err = store.accept_request(CAROL, DAVE).await.unwrap_err();
        assert!(
            matches!(err, GraphError::NotFound { ref path } if path == &pending_key(CAROL, DAVE)),
            "expected NotFound, got: {err}"
        );
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn accepting_twice_is_not_found() {
        let (_, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        store.accept_request(BOB, ALICE).await.unwrap();

        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        assert!(matches!(err, GraphError::NotFound { .. }));
    }

    // -----------------------------------------------------------------------
    // send_request
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn send_writes_the_pending_record() {
        let (backend, store) = setup();
        let written = store.send_request(ALICE, BOB).await.unwrap();

        assert_eq!(written.path, "friendships/did:x:bob/pending/did:x:alice.json");
        assert!(written.content_id.is_some());
        assert_eq!(
            backend.peek(&written.path).unwrap(),
            Bytes::from_static(br#"{"users":["did:x:bob","did:x:alice"],"status":"pending"}"#)
        );
        // The requester's namespace is untouched.
        assert_eq!(backend.paths(), vec![written.path]);
    }

    #[tokio::test]
    async fn send_is_idempotent() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        store.send_request(ALICE, BOB).await.unwrap();

        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![ALICE]);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn send_to_self_is_rejected_without_writes() {
        let (backend, store) = setup();
        let err = store.send_request(ALICE, ALICE).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput(_)));
        assert_eq!(backend.write_count(), 0);
        assert!(backend.operations().is_empty());
    }

    #[tokio::test]
    async fn send_with_missing_identity_is_rejected() {
        let (backend, store) = setup();
        assert!(matches!(
            store.send_request("", BOB).await,
            Err(GraphError::InvalidInput(_))
        ));
        assert!(matches!(
            store.send_request(ALICE, "").await,
            Err(GraphError::InvalidInput(_))
        ));
        assert!(matches!(
            store.send_request("did:x:a/b", BOB).await,
            Err(GraphError::InvalidInput(_))
        ));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn requests_from_different_senders_coexist() {
        let (_, store) = setup();
        store.send_request(CAROL, BOB).await.unwrap();
        store.send_request(ALICE, BOB).await.unwrap();

        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![ALICE, CAROL]);

        store.accept_request(BOB, CAROL).await.unwrap();
        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![ALICE]);
        assert_eq!(store.list_friends(BOB).await.unwrap(), vec![CAROL]);
    }

    #[tokio::test]
    async fn send_propagates_backend_errors() {
        let (backend, store) = setup();
        backend.inject_fault(StoreOp::Put, pending_key(BOB, ALICE), FaultKind::Unauthorized);

        let err = store.send_request(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, GraphError::Backend(StoreError::Unauthorized(_))));
        assert!(store.list_pending(BOB).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn empty_namespaces_list_nothing() {
        let (_, store) = setup();
        assert!(store.list_pending(ALICE).await.unwrap().is_empty());
        assert!(store.list_friends(ALICE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_uses_the_filename_not_the_body() {
        let (backend, store) = setup();
        // Body names someone else entirely; the filename wins.
        backend
            .put(
                &pending_key(BOB, ALICE),
                Bytes::from_static(br#"{"users":["x","y"],"status":"pending"}"#),
            )
            .await
            .unwrap();
        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![ALICE]);
    }

    #[tokio::test]
    async fn listing_skips_keys_outside_the_convention() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        backend
            .put("friendships/did:x:bob/pending/notes.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        backend
            .put("friendships/did:x:bob/pending/old/did:x:carol.json", Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![ALICE]);
    }

    #[tokio::test]
    async fn listing_does_not_leak_across_owners_with_shared_prefix() {
        let (_, store) = setup();
        store.send_request(ALICE, "did:x:bo").await.unwrap();
        store.send_request(CAROL, BOB).await.unwrap();

        assert_eq!(store.list_pending("did:x:bo").await.unwrap(), vec![ALICE]);
        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![CAROL]);
    }

    #[tokio::test]
    async fn list_propagates_transport_errors() {
        let (backend, store) = setup();
        backend.inject_fault(StoreOp::List, "friendships/did:x:bob/friends/", FaultKind::Transport);
        let err = store.list_friends(BOB).await.unwrap_err();
        assert!(matches!(err, GraphError::Backend(StoreError::Transport(_))));
    }

    #[tokio::test]
    async fn list_rejects_empty_user() {
        let (_, store) = setup();
        assert!(matches!(
            store.list_friends("").await,
            Err(GraphError::InvalidInput(_))
        ));
    }

    // -----------------------------------------------------------------------
    // accept_request
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn accept_writes_both_records_then_deletes_pending() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        backend.clear_operations();

        let receipt = store.accept_request(BOB, ALICE).await.unwrap();
        assert!(receipt.progress.is_complete());
        assert_eq!(receipt.written.len(), 2);

        let writes: Vec<(StoreOp, String)> = backend
            .operations()
            .into_iter()
            .filter(|r| r.op.is_write())
            .map(|r| (r.op, r.target))
            .collect();
        assert_eq!(
            writes,
            vec![
                (StoreOp::Put, friends_key(BOB, ALICE)),
                (StoreOp::Put, friends_key(ALICE, BOB)),
                (StoreOp::Delete, pending_key(BOB, ALICE)),
            ]
        );
        assert_eq!(
            backend.peek(&friends_key(ALICE, BOB)).unwrap(),
            Bytes::from_static(br#"{"users":["did:x:alice","did:x:bob"],"status":"accepted"}"#)
        );
    }

    #[tokio::test]
    async fn accepted_relationships_are_symmetric() {
        let (_, store) = setup();
        let people = ["did:x:a", "did:x:b", "did:x:c", "did:x:d"];
        let pairs = [(0, 1), (0, 2), (3, 1), (2, 3)];
        for (from, to) in pairs {
            store.send_request(people[from], people[to]).await.unwrap();
            store.accept_request(people[to], people[from]).await.unwrap();
        }

        for a in people {
            for b in people.iter().filter(|b| **b != a) {
                let a_has_b = store.list_friends(a).await.unwrap().contains(&did(b));
                let b_has_a = store.list_friends(b).await.unwrap().contains(&did(a));
                assert_eq!(a_has_b, b_has_a, "asymmetry between {a} and {b}");
            }
            assert!(store.audit_symmetry(a).await.unwrap().is_consistent());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn accept_waits_out_propagation_lag() {
        let (_, store) = setup_with(PropagationLag::Polls(2));
        let written = store.send_request(ALICE, BOB).await.unwrap();
        assert!(written.content_id.is_none());

        let start = Instant::now();
        store.accept_request(BOB, ALICE).await.unwrap();
        // One plain lookup, then two retried ones with a 1s sleep between.
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(store.list_friends(ALICE).await.unwrap(), vec![BOB]);
    }

    #[tokio::test(start_paused = true)]
    async fn accept_reports_metadata_unavailable_within_budget() {
        let (backend, store) = setup_with(PropagationLag::Never);
        store.send_request(ALICE, BOB).await.unwrap();
        backend.clear_operations();

        let start = Instant::now();
        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        assert!(matches!(err, GraphError::MetadataUnavailable { attempts: 5, .. }));
        assert_eq!(start.elapsed(), RetryPolicy::default().budget());
        assert_eq!(backend.write_count(), 0);
        assert_eq!(store.list_pending(BOB).await.unwrap(), vec![ALICE]);
    }

    #[tokio::test(start_paused = true)]
    async fn accept_uses_the_configured_retry_policy() {
        let backend = Arc::new(InMemoryObjectStore::new().with_propagation_lag(PropagationLag::Never));
        let config = GraphConfig {
            retry: RetryPolicy::new(2, Duration::from_millis(50)),
            ..Default::default()
        };
        let store = RelationshipStore::new(Arc::clone(&backend), config).unwrap();
        store.send_request(ALICE, BOB).await.unwrap();

        let start = Instant::now();
        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        assert!(matches!(err, GraphError::MetadataUnavailable { attempts: 2, .. }));
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn accept_rejects_a_record_naming_someone_else() {
        let (backend, store) = setup();
        backend
            .put(
                &pending_key(BOB, ALICE),
                Bytes::from_static(br#"{"users":["did:x:bob","did:x:mallory"],"status":"pending"}"#),
            )
            .await
            .unwrap();
        backend.clear_operations();

        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        assert!(matches!(err, GraphError::RecordMismatch { .. }), "got: {err}");
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn accept_rejects_a_malformed_record() {
        let (backend, store) = setup();
        backend
            .put(&pending_key(BOB, ALICE), Bytes::from_static(b"{not json"))
            .await
            .unwrap();

        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        assert!(matches!(err, GraphError::MalformedRecord { .. }));
        assert!(store.list_friends(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accept_rejects_self_and_empty() {
        let (backend, store) = setup();
        assert!(matches!(
            store.accept_request(ALICE, ALICE).await,
            Err(GraphError::InvalidInput(_))
        ));
        assert!(matches!(
            store.accept_request("", ALICE).await,
            Err(GraphError::InvalidInput(_))
        ));
        assert!(backend.operations().is_empty());
    }

    // -----------------------------------------------------------------------
    // Saga failures and resumption
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn failure_on_first_write_is_a_clean_failure() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        backend.inject_fault(StoreOp::Put, friends_key(BOB, ALICE), FaultKind::Transport);

        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        assert!(matches!(err, GraphError::Backend(StoreError::Transport(_))));
        assert_eq!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::Pending {
                requester: did(ALICE),
                recipient: did(BOB),
            }
        );

        // Nothing to repair: accepting again works.
        store.accept_request(BOB, ALICE).await.unwrap();
        assert_eq!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::Accepted
        );
    }

    #[tokio::test]
    async fn failure_between_writes_is_partial_and_resumable() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        backend.inject_fault(StoreOp::Put, friends_key(ALICE, BOB), FaultKind::Transport);

        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        let GraphError::PartialAcceptance { progress, source } = err else {
            panic!("expected PartialAcceptance, got: {err}");
        };
        assert!(source.is_transport());
        assert_eq!(progress.completed, vec![AcceptStep::WriteAccepterFriends]);

        // The half-applied state is observable, not masked.
        assert_eq!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::HalfAccepted {
                has_record: did(BOB),
                missing_record: did(ALICE),
            }
        );
        let report = store.audit_symmetry(BOB).await.unwrap();
        assert_eq!(report.missing_reciprocal, vec![did(ALICE)]);
        assert_eq!(report.stale_pending, vec![did(ALICE)]);

        let receipt = store.resume_acceptance(*progress).await.unwrap();
        assert!(receipt.progress.is_complete());
        assert_eq!(receipt.written.len(), 1);
        assert_eq!(receipt.written[0].path, friends_key(ALICE, BOB));

        assert_eq!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::Accepted
        );
        assert!(store.audit_symmetry(BOB).await.unwrap().is_consistent());
        assert!(store.list_pending(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_on_delete_leaves_friends_symmetric() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        backend.inject_fault(StoreOp::Delete, pending_key(BOB, ALICE), FaultKind::Backend);

        let err = store.accept_request(BOB, ALICE).await.unwrap_err();
        let GraphError::PartialAcceptance { progress, .. } = err else {
            panic!("expected PartialAcceptance, got: {err}");
        };
        assert_eq!(progress.remaining(), vec![AcceptStep::DeletePending]);
        assert_eq!(store.list_friends(ALICE).await.unwrap(), vec![BOB]);
        assert_eq!(store.list_friends(BOB).await.unwrap(), vec![ALICE]);
        assert_eq!(store.audit_symmetry(BOB).await.unwrap().stale_pending, vec![did(ALICE)]);

        let receipt = store.resume_acceptance(*progress).await.unwrap();
        assert!(receipt.written.is_empty());
        assert!(store.list_pending(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resume_failure_stays_partial() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        backend.inject_fault(StoreOp::Put, friends_key(ALICE, BOB), FaultKind::Transport);
        let GraphError::PartialAcceptance { progress, .. } =
            store.accept_request(BOB, ALICE).await.unwrap_err()
        else {
            panic!("expected PartialAcceptance");
        };

        backend.inject_fault(StoreOp::Put, friends_key(ALICE, BOB), FaultKind::Transport);
        let err = store.resume_acceptance((*progress).clone()).await.unwrap_err();
        let GraphError::PartialAcceptance { progress: again, .. } = err else {
            panic!("expected PartialAcceptance, got: {err}");
        };
        assert_eq!(again.saga_id, progress.saga_id);
        assert_eq!(again.completed, vec![AcceptStep::WriteAccepterFriends]);
    }

    #[tokio::test]
    async fn resuming_a_complete_saga_is_a_no_op() {
        let (backend, store) = setup();
        store.send_request(ALICE, BOB).await.unwrap();
        let receipt = store.accept_request(BOB, ALICE).await.unwrap();
        backend.clear_operations();

        let again = store.resume_acceptance(receipt.progress.clone()).await.unwrap();
        assert_eq!(again.progress, receipt.progress);
        assert!(backend.operations().is_empty());
    }

    #[tokio::test]
    async fn resume_rejects_self_referential_marker() {
        let (_, store) = setup();
        let progress = AcceptProgress::new(did(ALICE), did(ALICE));
        assert!(matches!(
            store.resume_acceptance(progress).await,
            Err(GraphError::InvalidInput(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn relationship_state_follows_the_lifecycle() {
        let (_, store) = setup();
        assert_eq!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::Absent
        );

        store.send_request(ALICE, BOB).await.unwrap();
        let expected = RelationshipState::Pending {
            requester: did(ALICE),
            recipient: did(BOB),
        };
        assert_eq!(store.relationship_state(ALICE, BOB).await.unwrap(), expected);
        assert_eq!(store.relationship_state(BOB, ALICE).await.unwrap(), expected);

        store.send_request(BOB, ALICE).await.unwrap();
        assert_eq!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::MutuallyPending
        );

        store.accept_request(BOB, ALICE).await.unwrap();
        assert_eq!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::Accepted
        );
    }

    #[tokio::test]
    async fn relationship_state_counts_unpublished_records() {
        let (_, store) = setup_with(PropagationLag::Never);
        store.send_request(ALICE, BOB).await.unwrap();
        assert!(matches!(
            store.relationship_state(ALICE, BOB).await.unwrap(),
            RelationshipState::Pending { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Concurrency and wiring
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_to_one_recipient_all_land() {
        let (_, store) = setup();
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.spawn(async move { store.send_request(&format!("did:x:user{i:02}"), BOB).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let pending = store.list_pending(BOB).await.unwrap();
        assert_eq!(pending.len(), 16);
        assert_eq!(pending[0], "did:x:user00");
    }

    #[tokio::test]
    async fn custom_root_namespaces_every_path() {
        let backend = Arc::new(InMemoryObjectStore::new());
        let config = GraphConfig::from_toml_str(r#"root = "tenant-1/friendships""#).unwrap();
        let store = RelationshipStore::new(Arc::clone(&backend), config).unwrap();

        store.send_request(ALICE, BOB).await.unwrap();
        store.accept_request(BOB, ALICE).await.unwrap();
        assert!(backend.paths().iter().all(|p| p.starts_with("tenant-1/friendships/")));
        assert_eq!(store.list_friends(ALICE).await.unwrap(), vec![BOB]);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = GraphConfig {
            root: String::new(),
            ..Default::default()
        };
        let result = RelationshipStore::new(Arc::new(InMemoryObjectStore::new()), config);
        assert!(matches!(result, Err(GraphError::Config(_))));
    }

    #[tokio::test]
    async fn works_behind_a_trait_object() {
        let backend: Arc<dyn ObjectStoreClient> = Arc::new(InMemoryObjectStore::new());
        let store = RelationshipStore::with_defaults(backend);
        store.send_request(ALICE, BOB).await.unwrap();
        store.accept_request(BOB, ALICE).await.unwrap();
        assert_eq!(store.list_friends(BOB).await.unwrap(), vec![ALICE]);
    }
}
