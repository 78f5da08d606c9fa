//! Inbound message dispatch.
//!
//! Each `(MessageType, Role)` combination maps to one plain function. Handlers
//! never wait: local store effects happen inline, and outbound messages are
//! spawned through `Dynamo::send`.

use std::collections::HashMap;

use super::engine::Dynamo;
use super::protocol::{Message, MessageType, Role, Selector};
use crate::error::Result;
use crate::storage::{Record, Versioned};

pub type Handler = fn(&Dynamo, Message) -> Result<()>;

pub fn handler_for(message_type: MessageType, role: Role) -> Handler {
    match (message_type, role) {
        (MessageType::Ack, _) => on_ack,
        (MessageType::Insert, Role::Coordinator) => on_coordinator_insert,
        (MessageType::Insert, Role::Replica) => on_replica_insert,
        (MessageType::Insert, Role::Update) => on_repair_insert,
        (MessageType::Insert, Role::All) => on_unroutable,
        (MessageType::Delete, Role::Coordinator) => on_coordinator_delete,
        (MessageType::Delete, _) => on_delete,
        (MessageType::QueryRequest, _) => on_query_request,
        (MessageType::QueryReply, _) => on_query_reply,
        (MessageType::RecoveryRequest, _) => on_recovery_request,
        (MessageType::RecoveryReply, _) => on_recovery_reply,
    }
}

fn on_ack(dynamo: &Dynamo, message: Message) -> Result<()> {
    tracing::debug!("Received ACK for session {} from {}", message.session_id, message.from_node);
    if message.key.is_empty() || message.version == 0 {
        dynamo.sessions.signal(&message.session_id);
    } else {
        // Forwarded inserts are acknowledged with the version the coordinator assigned
        let mut results = HashMap::with_capacity(1);
        results.insert(
            message.key,
            Versioned {
                value: message.value,
                version: message.version,
            },
        );
        dynamo.sessions.contribute(&message.session_id, results);
    }
    Ok(())
}

fn send_ack(dynamo: &Dynamo, request: &Message, version: u64) {
    let mut ack = request.reply(dynamo.node, MessageType::Ack);
    ack.version = version;
    dynamo.send(request.from_node, ack);
    tracing::debug!("Sent ACK to {} for session {}", request.from_node, request.session_id);
}

fn on_coordinator_insert(dynamo: &Dynamo, message: Message) -> Result<()> {
    let version = dynamo.store.put_next_version(&message.key, &message.value)?;
    tracing::info!("Coordinator inserted {} at version {}", message.key, version);

    let replica_insert = Message::insert(dynamo.node, &message.key, &message.value, Role::Replica, version);
    for replica in dynamo.ring.replicas_for_coordinator(dynamo.node) {
        dynamo.send(replica, replica_insert.clone());
    }

    if message.ack_requested {
        send_ack(dynamo, &message, version);
    }
    Ok(())
}

fn on_replica_insert(dynamo: &Dynamo, message: Message) -> Result<()> {
    let from_coordinator = dynamo.ring.coordinator_for_key(&message.key) == message.from_node;

    let version = if from_coordinator {
        let record = Record::new(message.key.as_str(), message.value.as_str(), message.version);
        if !dynamo.store.merge(record)? {
            tracing::debug!("Ignored stale replica INSERT of {} at version {}", message.key, message.version);
        }
        message.version
    } else {
        // Fallback write from a node that could not reach the coordinator
        dynamo.store.put_next_version(&message.key, &message.value)?
    };
    tracing::debug!("Replica inserted {} at version {}", message.key, version);

    if message.ack_requested {
        send_ack(dynamo, &message, version);
    }
    Ok(())
}

fn on_repair_insert(dynamo: &Dynamo, message: Message) -> Result<()> {
    let record = Record::new(message.key.as_str(), message.value.as_str(), message.version);
    if dynamo.store.merge(record)? {
        tracing::debug!("Read-repair applied {} at version {}", message.key, message.version);
    }
    Ok(())
}

fn on_unroutable(_dynamo: &Dynamo, message: Message) -> Result<()> {
    tracing::warn!(
        "Dropping {:?} with role {:?} from {}",
        message.message_type,
        message.role,
        message.from_node
    );
    Ok(())
}

fn on_coordinator_delete(dynamo: &Dynamo, message: Message) -> Result<()> {
    if message.ack_requested {
        send_ack(dynamo, &message, 0);
    }

    let removed = dynamo.store.delete_key(&message.key)?;
    tracing::info!("Coordinator deleted {} ({} rows)", message.key, removed);

    let replica_delete = Message::delete(dynamo.node, &message.key, Role::Replica);
    for replica in dynamo.ring.replicas_for_coordinator(dynamo.node) {
        dynamo.send(replica, replica_delete.clone());
    }
    Ok(())
}

fn on_delete(dynamo: &Dynamo, message: Message) -> Result<()> {
    match message.selector() {
        Selector::All => {
            let dropped = dynamo.store.drop_all()?;
            tracing::info!("DELETE ALL from {}: dropped {} rows", message.from_node, dropped);
        }
        Selector::Local => on_unroutable(dynamo, message)?,
        Selector::Key(key) => {
            dynamo.store.delete_key(&key)?;
            tracing::debug!("DELETE {} from {}", key, message.from_node);
        }
    }
    Ok(())
}

fn on_query_request(dynamo: &Dynamo, message: Message) -> Result<()> {
    match message.selector() {
        Selector::All => {
            let mut reply = message.reply(dynamo.node, MessageType::QueryReply);
            reply.results = dynamo
                .store
                .scan_all()?
                .into_iter()
                .map(|record| (record.key.clone(), record.versioned()))
                .collect();
            tracing::debug!("QUERY ALL from {}: replying with {} rows", message.from_node, reply.results.len());
            dynamo.send(message.from_node, reply);
        }
        Selector::Local => on_unroutable(dynamo, message)?,
        Selector::Key(key) => match dynamo.store.get(&key)? {
            Some(record) => {
                let mut reply = message.reply(dynamo.node, MessageType::QueryReply);
                reply.results.insert(key, record.versioned());
                dynamo.send(message.from_node, reply);
            }
            // Silence means "not resident here"; an empty reply would falsely
            // complete the requester's gate.
            None => tracing::debug!("{:?} query for {}: not held here", message.role, key),
        },
    }
    Ok(())
}

fn on_query_reply(dynamo: &Dynamo, message: Message) -> Result<()> {
    tracing::debug!("QUERY REPLY from {} with {} rows", message.from_node, message.results.len());
    dynamo.sessions.contribute(&message.session_id, message.results);
    Ok(())
}

fn on_recovery_request(dynamo: &Dynamo, message: Message) -> Result<()> {
    let requester = message.from_node;
    let mut reply = message.reply(dynamo.node, MessageType::RecoveryReply);
    reply.results = dynamo
        .store
        .scan_all()?
        .into_iter()
        .filter(|record| dynamo.ring.preference_list_for_key(&record.key).contains(&requester))
        .map(|record| (record.key.clone(), record.versioned()))
        .collect();

    tracing::info!("RECOVERY REQUEST from {}: replying with {} rows", requester, reply.results.len());
    dynamo.send(requester, reply);
    Ok(())
}

fn on_recovery_reply(dynamo: &Dynamo, message: Message) -> Result<()> {
    let merged = merge_recovered(dynamo, message.results);
    // The peer has answered even if merging failed; do not hold the gate
    dynamo.sessions.signal(&message.session_id);

    let applied = merged?;
    tracing::info!("RECOVERY REPLY from {}: merged {} rows", message.from_node, applied);
    Ok(())
}

fn merge_recovered(dynamo: &Dynamo, rows: HashMap<String, Versioned>) -> Result<usize> {
    let mut applied = 0usize;
    for (key, row) in rows {
        if !dynamo.ring.preference_list_for_key(&key).contains(&dynamo.node) {
            continue;
        }
        if dynamo.store.merge(Record::new(key, row.value, row.version))? {
            applied += 1;
        }
    }
    Ok(applied)
}
