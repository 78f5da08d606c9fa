//! Replication Protocol Engine
//!
//! `Dynamo` is one node of the cluster. Client operations (`put`, `get`,
//! `delete` and their `*` / `@` variants) originate here; inbound peer
//! messages arrive through the `MessageHandler` impl and are routed through
//! the dispatch table in `handlers`.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;

use super::handlers;
use super::protocol::{Message, MessageType, Role, Selector, ALL_KEYS};
use super::recovery::{RecoveryController, RecoveryState};
use crate::config::Timeouts;
use crate::error::Result;
use crate::membership::liveness::LivenessTracker;
use crate::membership::types::NodeId;
use crate::ring::partitioner::Ring;
use crate::session::gate::Completion;
use crate::session::registry::{SessionId, SessionRegistry};
use crate::storage::{LocalStore, Record, Versioned};
use crate::transport::{MessageHandler, Transport};

/// Which path durably accepted a `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// This node coordinates the key and wrote it at `version`.
    Coordinated { version: u64, replica_acked: bool },
    /// The coordinator acknowledged, reporting the version it assigned.
    Forwarded { version: u64 },
    /// The coordinator was silent; at least one replica took the write.
    Replicated,
    /// Nobody acknowledged within the bounds.
    Unacknowledged,
}

pub struct Dynamo {
    pub(super) node: NodeId,
    pub(super) ring: Ring,
    pub(super) store: Arc<dyn LocalStore>,
    transport: Arc<dyn Transport>,
    pub(super) sessions: Arc<SessionRegistry>,
    liveness: Arc<LivenessTracker>,
    pub(super) recovery: RecoveryController,
    timeouts: Timeouts,
}

impl Dynamo {
    pub fn new(
        node: NodeId,
        ring: Ring,
        store: Arc<dyn LocalStore>,
        transport: Arc<dyn Transport>,
        timeouts: Timeouts,
    ) -> Arc<Self> {
        Arc::new(Self {
            node,
            ring,
            store,
            transport,
            sessions: SessionRegistry::new(),
            liveness: LivenessTracker::new(),
            recovery: RecoveryController::new(),
            timeouts,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn liveness(&self) -> &Arc<LivenessTracker> {
        &self.liveness
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery.state()
    }

    pub fn local_row_count(&self) -> Result<usize> {
        Ok(self.store.count_all()?)
    }

    /// Startup recovery: discard rows left from a previous run and pull
    /// current data from every recovery peer. Returns immediately; other
    /// operations block on the recovery gate until it settles, and a
    /// background waiter clears it even if no operation arrives.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let stale = self.store.count_all()?;
        if stale > 0 {
            let dropped = self.store.drop_all()?;
            tracing::warn!("Dropped {} stale rows from a previous run", dropped);
        }

        let peers = self.ring.recovery_peers(self.node);
        if peers.is_empty() {
            tracing::info!("No recovery peers for node {}", self.node);
            return Ok(());
        }

        let session = self.sessions.open(peers.len());
        let request = Message::recovery_request(self.node).in_session(session.id());
        let id = self
            .recovery
            .begin(session, self.timeouts.recovery_timeout())
            .await;

        tracing::info!("Requesting recovery from {:?}", peers);
        for peer in peers {
            self.send_tracked(peer, request.clone(), id);
        }

        let node = self.clone();
        tokio::spawn(async move {
            node.recovery.wait().await;
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // WRITE
    // -----------------------------------------------------------------------

    pub async fn put(&self, key: &str, value: &str) -> Result<WriteOutcome> {
        self.recovery.wait().await;

        let coordinator = self.ring.coordinator_for_key(key);
        let replicas = self.ring.replicas_for_coordinator(coordinator);

        if coordinator == self.node {
            let version = self.store.put_next_version(key, value)?;
            tracing::info!("Coordinator inserted {} at version {}", key, version);
            let replica_acked = self.replicate(key, value, version, &replicas).await;
            return Ok(WriteOutcome::Coordinated {
                version,
                replica_acked,
            });
        }

        let session = self.sessions.open(1);
        let insert = Message::insert(self.node, key, value, Role::Coordinator, 0)
            .in_session(session.id())
            .with_ack(true);
        tracing::debug!("Forwarding INSERT of {} to coordinator {}", key, coordinator);
        self.send_tracked(coordinator, insert, session.id());

        if session
            .gate
            .wait_for(self.timeouts.write_timeout())
            .await
            .is_satisfied()
        {
            let version = session.reply_for(key).map(|v| v.version).unwrap_or_default();
            tracing::debug!("Coordinator {} acknowledged {} at version {}", coordinator, key, version);
            return Ok(WriteOutcome::Forwarded { version });
        }

        tracing::warn!(
            "Coordinator {} did not acknowledge INSERT of {}; writing to replicas {:?}",
            coordinator,
            key,
            replicas
        );
        self.liveness.mark_offline(coordinator);

        // No authoritative version is available from the coordinator
        let version = self.store.version(key)?.unwrap_or(0) + 1;
        let fallback = self.sessions.open_with_responders(1, replicas.len());
        let insert = Message::insert(self.node, key, value, Role::Replica, version)
            .in_session(fallback.id())
            .with_ack(true);
        for replica in &replicas {
            self.send_tracked(*replica, insert.clone(), fallback.id());
        }

        if fallback
            .gate
            .wait_for(self.timeouts.write_timeout())
            .await
            .is_satisfied()
        {
            tracing::info!("Replica acknowledged fallback INSERT of {}", key);
            Ok(WriteOutcome::Replicated)
        } else {
            tracing::error!("Replica INSERT of {} timed out; write unacknowledged", key);
            Ok(WriteOutcome::Unacknowledged)
        }
    }

    /// Sends the coordinator's write to every replica; only the first is asked
    /// to acknowledge. Returns whether that acknowledgement arrived in time.
    async fn replicate(&self, key: &str, value: &str, version: u64, replicas: &[NodeId]) -> bool {
        let Some((first, rest)) = replicas.split_first() else {
            return true;
        };

        let session = self.sessions.open(1);
        let insert = Message::insert(self.node, key, value, Role::Replica, version);
        self.send_tracked(
            *first,
            insert.clone().in_session(session.id()).with_ack(true),
            session.id(),
        );
        for replica in rest {
            self.send(*replica, insert.clone());
        }

        let outcome = session.gate.wait_for(self.timeouts.write_timeout()).await;
        if outcome.is_satisfied() {
            tracing::debug!("Received INSERT ACK from replica {}", first);
            true
        } else {
            tracing::warn!("Replica INSERT of {} to {} ended {:?}", key, first, outcome);
            false
        }
    }

    // -----------------------------------------------------------------------
    // READ
    // -----------------------------------------------------------------------

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read(key).await?.map(|latest| latest.value))
    }

    /// Quorum-style read over the whole preference list, resolved by highest
    /// version and followed by read-repair.
    pub async fn read(&self, key: &str) -> Result<Option<Versioned>> {
        self.recovery.wait().await;

        let preference = self.ring.preference_list_for_key(key);
        let coordinator = preference[0];
        let deadline = Instant::now() + self.timeouts.read_timeout();

        let pending: Vec<_> = preference
            .iter()
            .map(|node| {
                let session = self.sessions.open(1);
                let role = if *node == coordinator {
                    Role::Coordinator
                } else {
                    Role::Replica
                };
                let query = Message::query_request(self.node, key, role).in_session(session.id());
                self.send_tracked(*node, query, session.id());
                (*node, session)
            })
            .collect();

        let mut replies = Vec::with_capacity(pending.len());
        for (node, session) in &pending {
            let outcome = session.gate.wait_until(deadline).await;
            match session.reply_for(key) {
                Some(reply) => replies.push(reply),
                None => tracing::debug!("No query reply for {} from {} ({:?})", key, node, outcome),
            }
        }
        drop(pending);

        let Some(latest) = resolve_latest(&replies) else {
            tracing::warn!("No replica answered for {}; answering from local store", key);
            return Ok(self.store.get(key)?.map(|record| record.versioned()));
        };

        let distinct: HashSet<&Versioned> = replies.iter().collect();
        if distinct.len() > 1 {
            tracing::warn!(
                "Inconsistent replicas for {}: latest {:?} from {:?}",
                key,
                latest,
                distinct
            );
        }

        let repair = Message::insert(self.node, key, &latest.value, Role::Update, latest.version);
        for node in &preference {
            self.send(*node, repair.clone());
        }

        Ok(Some(latest))
    }

    /// Every row in the cluster, highest version per key, sorted by key.
    pub async fn get_all(&self) -> Result<Vec<Record>> {
        self.recovery.wait().await;

        let targets = self.ring.all_other_nodes(self.node);
        let (live, offline) = self.liveness.split_live(&targets);

        let session = self.sessions.open(live.len());
        let query = Message::query_request(self.node, ALL_KEYS, Role::All).in_session(session.id());
        for target in &live {
            self.send_tracked(*target, query.clone(), session.id());
        }
        // Query nodes believed dead outside the session: their replies must
        // not count toward the live threshold, only the send outcome matters.
        for target in &offline {
            self.send(*target, Message::query_request(self.node, ALL_KEYS, Role::All));
        }

        let outcome = session.gate.wait_for(self.timeouts.query_all_timeout()).await;
        match outcome {
            Completion::Satisfied => {
                tracing::debug!("Query ALL completed with {} replies", session.gate.replies())
            }
            Completion::Degraded => tracing::info!(
                "Query ALL completed with {} replies; {} peers unreachable",
                session.gate.replies(),
                live.len() - session.gate.target()
            ),
            _ => tracing::warn!(
                "Query ALL ended {:?} with {} of {} replies",
                outcome,
                session.gate.replies(),
                live.len()
            ),
        }

        let mut merged: HashMap<String, Versioned> = session.replies();
        for record in self.store.scan_all()? {
            let local = record.versioned();
            merged
                .entry(record.key)
                .and_modify(|current| {
                    if local.version > current.version {
                        *current = local.clone();
                    }
                })
                .or_insert(local);
        }

        Ok(sorted_records(merged))
    }

    /// This node's rows only; no network traffic.
    pub async fn get_local(&self) -> Result<Vec<Record>> {
        self.recovery.wait().await;
        let mut rows = self.store.scan_all()?;
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    pub async fn query(&self, selector: &Selector) -> Result<Vec<Record>> {
        match selector {
            Selector::All => self.get_all().await,
            Selector::Local => self.get_local().await,
            Selector::Key(key) => Ok(self
                .read(key)
                .await?
                .map(|latest| Record::new(key.as_str(), latest.value, latest.version))
                .into_iter()
                .collect()),
        }
    }

    // -----------------------------------------------------------------------
    // DELETE
    // -----------------------------------------------------------------------

    /// Deletes `key` cluster-wide. Returns the rows removed from this node's
    /// store by the call itself.
    pub async fn delete(&self, key: &str) -> Result<usize> {
        self.recovery.wait().await;

        let coordinator = self.ring.coordinator_for_key(key);
        let replicas = self.ring.replicas_for_coordinator(coordinator);

        if coordinator == self.node {
            let removed = self.store.delete_key(key)?;
            tracing::info!("Coordinator deleted {}", key);
            let delete = Message::delete(self.node, key, Role::Replica);
            for replica in &replicas {
                self.send(*replica, delete.clone());
            }
            return Ok(removed);
        }

        let session = self.sessions.open(1);
        let delete = Message::delete(self.node, key, Role::Coordinator)
            .in_session(session.id())
            .with_ack(true);
        self.send_tracked(coordinator, delete.clone(), session.id());

        if session
            .gate
            .wait_for(self.timeouts.delete_timeout())
            .await
            .is_satisfied()
        {
            tracing::debug!("Received DELETE ACK from coordinator {}", coordinator);
        } else {
            tracing::warn!(
                "Coordinator {} did not acknowledge DELETE of {}; forwarding to replicas",
                coordinator,
                key
            );
            self.liveness.mark_offline(coordinator);
            let fallback = delete.with_role(Role::Replica).with_ack(false);
            for replica in &replicas {
                self.send(*replica, fallback.clone());
            }
        }
        Ok(0)
    }

    /// Drops this node's store and tells every other node to do the same.
    pub async fn delete_all(&self) -> Result<usize> {
        self.recovery.wait().await;

        let dropped = self.store.drop_all()?;
        let delete = Message::delete(self.node, ALL_KEYS, Role::All);
        for node in self.ring.all_other_nodes(self.node) {
            self.send(node, delete.clone());
        }
        tracing::info!("DELETE ALL: dropped {} local rows", dropped);
        Ok(dropped)
    }

    /// Drops this node's store only.
    pub async fn delete_local(&self) -> Result<usize> {
        self.recovery.wait().await;
        let dropped = self.store.drop_all()?;
        tracing::info!("DELETE LOCAL: dropped {} rows", dropped);
        Ok(dropped)
    }

    pub async fn remove(&self, selector: &Selector) -> Result<usize> {
        match selector {
            Selector::All => self.delete_all().await,
            Selector::Local => self.delete_local().await,
            Selector::Key(key) => self.delete(key).await,
        }
    }

    // -----------------------------------------------------------------------
    // SENDING
    // -----------------------------------------------------------------------

    /// Fire-and-forget send on its own task. The outcome feeds the liveness
    /// tracker.
    pub(super) fn send(&self, to: NodeId, message: Message) {
        self.dispatch(to, message, None);
    }

    /// Like `send`, but a failed send forfeits the sender's slot in `session`.
    pub(super) fn send_tracked(&self, to: NodeId, message: Message, session: SessionId) {
        self.dispatch(to, message, Some(session));
    }

    fn dispatch(&self, to: NodeId, message: Message, session: Option<SessionId>) {
        let transport = self.transport.clone();
        let liveness = self.liveness.clone();
        let sessions = self.sessions.clone();

        tokio::spawn(async move {
            tracing::debug!("Sending {:?} {} to {}", message.message_type, message.key, to);
            match transport.send(to, &message).await {
                Ok(()) => liveness.mark_online(to),
                Err(e) => {
                    tracing::debug!("Send to {} failed: {}", to, e);
                    liveness.mark_offline(to);
                    if let Some(id) = session {
                        sessions.forfeit(&id);
                    }
                }
            }
        });
    }
}

#[async_trait]
impl MessageHandler for Dynamo {
    async fn on_message(&self, message: Message) {
        tracing::debug!(
            "Received {:?}/{:?} {} from {}",
            message.message_type,
            message.role,
            message.key,
            message.from_node
        );

        // Never serve reads from a half-recovered store
        if message.message_type == MessageType::QueryRequest {
            self.recovery.wait().await;
        }

        let handler = handlers::handler_for(message.message_type, message.role);
        if let Err(e) = handler(self, message) {
            tracing::error!("Failed to handle message: {}", e);
        }
    }
}

/// The reply with the strictly greatest version; the first seen wins ties.
pub fn resolve_latest(replies: &[Versioned]) -> Option<Versioned> {
    let mut latest: Option<&Versioned> = None;
    for reply in replies {
        if latest.map_or(true, |current| reply.version > current.version) {
            latest = Some(reply);
        }
    }
    latest.cloned()
}

fn sorted_records(rows: HashMap<String, Versioned>) -> Vec<Record> {
    let mut records: Vec<Record> = rows
        .into_iter()
        .map(|(key, row)| Record::new(key, row.value, row.version))
        .collect();
    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
}
