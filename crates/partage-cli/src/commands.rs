//! One function per subcommand. Each opens the group's doc + keyring from
//! local storage, does the work, and persists whatever changed back.

use crate::relay_fs::LocalFsRelay;
use crate::storage_file::FileStorage;
use anyhow::{anyhow, Context, Result as AnyResult};
use partage_core::{EntryId, GroupId, InvitationId, MemberId};
use partage_crdt::CrdtDocument;
use partage_crypto::{identity_from_secrets, Identity};
use partage_entries::{create_entry, delete_entry, get_entry, Entry, EntryKind, EntryStatus, ExpenseFields, KeyRing, Payer, SplitType, TransferFields};
use partage_invitation::{approve_join, build_invite_link, import_group_keys, parse_invite_link, GroupKeysPayload, InviteLinkPayload, JoinRequest, KeyPackageRecipient};
use partage_settlement::generate_settlement_plan;
use partage_storage::{GroupKeyRecord, GroupRecord, GroupSettings, IdentityRecord, SnapshotRecord, Storage};
use partage_sync::relay::{GroupSummary, InvitationRecord, JoinRequestStatus};
use partage_sync::{RelayClient, SyncManager};
use std::collections::BTreeMap;
use std::sync::Arc;

fn now_ms() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

fn hex_decode_32(value: &str) -> AnyResult<[u8; 32]> {
    let bytes = hex::decode(value).context("invalid hex")?;
    bytes.try_into().map_err(|_| anyhow!("expected 32 bytes"))
}

pub async fn load_identity(storage: &Arc<FileStorage>) -> AnyResult<Identity> {
    let record = storage.get_identity().await?.ok_or_else(|| anyhow!("no local identity; run `partage identity init` first"))?;
    let ecdh_secret = hex_decode_32(&record.private_key)?;
    let signing_seed = hex_decode_32(&record.signing_private_key)?;
    Ok(identity_from_secrets(ecdh_secret, signing_seed))
}

pub async fn identity_init(storage: &Arc<FileStorage>) -> AnyResult<()> {
    if storage.get_identity().await?.is_some() {
        return Err(anyhow!("identity already exists"));
    }
    let identity = partage_crypto::generate_identity();
    storage
        .put_identity(IdentityRecord {
            public_key: hex_encode(&identity.ecdh_public.0),
            private_key: hex_encode(&identity.ecdh_secret.to_bytes()),
            public_key_hash: identity.public_key_hash.clone(),
            signing_public_key: hex_encode(&identity.verifying_key.to_bytes()),
            signing_private_key: hex_encode(&identity.signing_key.to_bytes()),
        })
        .await?;
    println!("created identity {}", identity.public_key_hash);
    Ok(())
}

pub async fn identity_show(storage: &Arc<FileStorage>) -> AnyResult<()> {
    let identity = load_identity(storage).await?;
    println!("publicKeyHash: {}", identity.public_key_hash);
    Ok(())
}

pub async fn group_create(storage: &Arc<FileStorage>, relay: &LocalFsRelay, name: String, currency: String) -> AnyResult<()> {
    let identity = load_identity(storage).await?;
    let group_id = GroupId::new();
    let creator = MemberId::from_public_key_hash(&identity.public_key_hash);

    storage
        .put_group(GroupRecord {
            id: group_id.as_str().to_string(),
            default_currency: currency.clone(),
            created_at: now_ms(),
            created_by: creator.as_str().to_string(),
            current_key_version: 1,
            settings: GroupSettings {
                anyone_can_add_entries: true,
                anyone_can_modify_entries: true,
                anyone_can_delete_entries: true,
                anyone_can_invite: true,
                anyone_can_share_keys: true,
            },
        })
        .await?;

    let group_key = partage_crypto::generate_group_key();
    storage.put_group_key(GroupKeyRecord { group_id: group_id.as_str().to_string(), version: 1, key_base64: hex_encode(&group_key.0) }).await?;

    let mut doc = CrdtDocument::new(partage_core::ReplicaId::new());
    doc.apply_local_op(partage_crdt::CrdtPayload::MemberEventAppend(partage_crdt::MemberEventRow {
        id: partage_core::MemberEventId::new(),
        member_id: creator.clone(),
        actor_id: creator.clone(),
        timestamp: now_ms(),
        kind: serde_json::json!({"type": "member_created", "name": name, "public_key": null, "is_virtual": false}),
    }));
    storage.put_snapshot(SnapshotRecord { group_id: group_id.as_str().to_string(), snapshot_bytes: doc.export_snapshot()?, version: Vec::new(), updated_at: now_ms() }).await?;

    relay
        .create_group(GroupSummary { id: group_id.clone(), default_currency: currency, created_at: now_ms(), created_by: creator })
        .await?;

    println!("created group {}", group_id.as_str());
    Ok(())
}

pub async fn group_list(storage: &Arc<FileStorage>) -> AnyResult<()> {
    for group in storage.list_groups().await? {
        println!("{}\t{}\t{}", group.id, group.default_currency, group.current_key_version);
    }
    Ok(())
}

async fn load_keyring(storage: &Arc<FileStorage>, group_id: &str) -> AnyResult<KeyRing> {
    let mut keyring = KeyRing::new();
    for record in storage.get_group_keys(group_id).await? {
        keyring.insert(record.version, partage_crypto::AeadKey::from_bytes(hex_decode_32(&record.key_base64)?));
    }
    Ok(keyring)
}

async fn load_doc(storage: &Arc<FileStorage>, group_id: &str) -> AnyResult<CrdtDocument> {
    let mut doc = CrdtDocument::new(partage_core::ReplicaId::new());
    if let Some(snapshot) = storage.get_snapshot(group_id).await? {
        doc.import(&snapshot.snapshot_bytes)?;
    }
    Ok(doc)
}

async fn persist_doc(storage: &Arc<FileStorage>, manager: &SyncManager<LocalFsRelay>, group_id: &str) -> AnyResult<()> {
    let (snapshot, version) = manager.snapshot_and_version().await?;
    storage.put_snapshot(SnapshotRecord { group_id: group_id.to_string(), snapshot_bytes: snapshot, version, updated_at: now_ms() }).await?;
    for (version, key) in manager.keyring_entries().await {
        storage.put_group_key(GroupKeyRecord { group_id: group_id.to_string(), version, key_base64: hex_encode(&key) }).await?;
    }
    Ok(())
}

async fn open_manager(storage: &Arc<FileStorage>, relay: Arc<LocalFsRelay>, group_id: &GroupId, author: MemberId) -> AnyResult<SyncManager<LocalFsRelay>> {
    let doc = load_doc(storage, group_id.as_str()).await?;
    let keyring = load_keyring(storage, group_id.as_str()).await?;
    Ok(SyncManager::new(relay, storage.clone(), group_id.clone(), author, doc, keyring))
}

pub async fn entry_add_transfer(storage: &Arc<FileStorage>, relay: Arc<LocalFsRelay>, group_id: GroupId, from: String, to: String, amount: f64, currency: String) -> AnyResult<()> {
    let identity = load_identity(storage).await?;
    let author = MemberId::from_public_key_hash(&identity.public_key_hash);
    let manager = open_manager(storage, relay, &group_id, author.clone()).await?;

    let entry_id = EntryId::new();
    let entry_group_id = group_id.as_str().to_string();
    manager
        .apply_and_push(move |doc, keyring| {
            create_entry(
                doc,
                Entry {
                    id: entry_id.clone(),
                    group_id: entry_group_id,
                    kind: EntryKind::Transfer(TransferFields { from: MemberId::from_public_key_hash(&from), to: MemberId::from_public_key_hash(&to) }),
                    version: 1,
                    created_at: now_ms(),
                    created_by: author.clone(),
                    status: EntryStatus::Active,
                    previous_version_id: None,
                    modified_at: None,
                    modified_by: None,
                    deleted_at: None,
                    deleted_by: None,
                    deletion_reason: None,
                    amount,
                    currency,
                    default_currency_amount: None,
                    date: now_ms(),
                    notes: None,
                    key_version: 1,
                },
                keyring,
            )?;
            Ok(())
        })
        .await?;

    persist_doc(storage, &manager, group_id.as_str()).await?;
    println!("added transfer entry");
    Ok(())
}

pub async fn entry_add_expense(
    storage: &Arc<FileStorage>,
    relay: Arc<LocalFsRelay>,
    group_id: GroupId,
    description: String,
    payer: String,
    amount: f64,
    currency: String,
    beneficiaries: Vec<String>,
) -> AnyResult<()> {
    let identity = load_identity(storage).await?;
    let author = MemberId::from_public_key_hash(&identity.public_key_hash);
    let manager = open_manager(storage, relay, &group_id, author.clone()).await?;

    let entry_id = EntryId::new();
    let entry_group_id = group_id.as_str().to_string();
    let beneficiary_members: Vec<_> = beneficiaries
        .into_iter()
        .map(|id| partage_entries::Beneficiary { member_id: MemberId::from_public_key_hash(&id), split_type: SplitType::Shares, shares: Some(1), amount: None })
        .collect();

    manager
        .apply_and_push(move |doc, keyring| {
            create_entry(
                doc,
                Entry {
                    id: entry_id.clone(),
                    group_id: entry_group_id,
                    kind: EntryKind::Expense(ExpenseFields {
                        description,
                        category: "general".into(),
                        payers: vec![Payer { member_id: MemberId::from_public_key_hash(&payer), amount }],
                        beneficiaries: beneficiary_members,
                    }),
                    version: 1,
                    created_at: now_ms(),
                    created_by: author.clone(),
                    status: EntryStatus::Active,
                    previous_version_id: None,
                    modified_at: None,
                    modified_by: None,
                    deleted_at: None,
                    deleted_by: None,
                    deletion_reason: None,
                    amount,
                    currency,
                    default_currency_amount: None,
                    date: now_ms(),
                    notes: None,
                    key_version: 1,
                },
                keyring,
            )?;
            Ok(())
        })
        .await?;

    persist_doc(storage, &manager, group_id.as_str()).await?;
    println!("added expense entry");
    Ok(())
}

pub async fn entry_delete(storage: &Arc<FileStorage>, relay: Arc<LocalFsRelay>, group_id: GroupId, entry_id: String, reason: Option<String>) -> AnyResult<()> {
    let identity = load_identity(storage).await?;
    let author = MemberId::from_public_key_hash(&identity.public_key_hash);
    let manager = open_manager(storage, relay, &group_id, author.clone()).await?;

    manager
        .apply_and_push(move |doc, keyring| {
            delete_entry(doc, &EntryId::from(entry_id.as_str()), author.clone(), reason.clone(), keyring, now_ms())?;
            Ok(())
        })
        .await?;

    persist_doc(storage, &manager, group_id.as_str()).await?;
    println!("deleted entry");
    Ok(())
}

pub async fn entry_list(storage: &Arc<FileStorage>, group_id: GroupId) -> AnyResult<()> {
    let doc = load_doc(storage, group_id.as_str()).await?;
    let keyring = load_keyring(storage, group_id.as_str()).await?;
    for id in doc.entry_ids().map(str::to_string).collect::<Vec<_>>() {
        match get_entry(&doc, &EntryId::from(id.as_str()), &keyring) {
            Ok(entry) => println!("{}\t{:?}\t{}\t{}", entry.id, entry.status, entry.amount, entry.currency),
            Err(err) => eprintln!("{}: undecryptable ({})", id, err),
        }
    }
    Ok(())
}

pub async fn balance_show(storage: &Arc<FileStorage>, group_id: GroupId) -> AnyResult<()> {
    let doc = load_doc(storage, group_id.as_str()).await?;
    let keyring = load_keyring(storage, group_id.as_str()).await?;
    let state = partage_state::initialize(&doc, &keyring);
    for (member, balance) in state.balances() {
        println!("{}\tpaid={:.2}\towed={:.2}\tnet={:.2}", member, balance.total_paid, balance.total_owed, balance.net_balance);
    }
    Ok(())
}

pub async fn settlement_plan(storage: &Arc<FileStorage>, group_id: GroupId) -> AnyResult<()> {
    let doc = load_doc(storage, group_id.as_str()).await?;
    let keyring = load_keyring(storage, group_id.as_str()).await?;
    let state = partage_state::initialize(&doc, &keyring);
    let balances = state.balances();

    let mut preferences: BTreeMap<MemberId, Vec<MemberId>> = BTreeMap::new();
    for member in balances.keys() {
        if let Some(prefs) = doc.preferred_recipients(member) {
            preferences.insert(member.clone(), prefs.to_vec());
        }
    }

    let plan = generate_settlement_plan(&balances, &preferences);
    for transaction in &plan.transactions {
        println!("{} -> {}: {:.2}", transaction.from, transaction.to, transaction.amount);
    }
    println!("total transactions: {}", plan.total_transactions);
    Ok(())
}

pub async fn activity_list(storage: &Arc<FileStorage>, group_id: GroupId) -> AnyResult<()> {
    let doc = load_doc(storage, group_id.as_str()).await?;
    let keyring = load_keyring(storage, group_id.as_str()).await?;
    let state = partage_state::initialize(&doc, &keyring);
    for activity in state.activities() {
        println!("{}\t{}\t{:?}", activity.timestamp, activity.actor_id, activity.kind);
    }
    Ok(())
}

pub async fn sync_now(storage: &Arc<FileStorage>, relay: Arc<LocalFsRelay>, group_id: GroupId) -> AnyResult<()> {
    let identity = load_identity(storage).await?;
    let author = MemberId::from_public_key_hash(&identity.public_key_hash);
    let manager = open_manager(storage, relay, &group_id, author).await?;

    manager.initial_sync().await?;
    manager.flush_pending().await?;
    persist_doc(storage, &manager, group_id.as_str()).await?;
    println!("sync state: {:?}", manager.state().await);
    Ok(())
}

pub async fn invite_create(relay: &LocalFsRelay, group_id: GroupId, group_name: String, origin: String) -> AnyResult<()> {
    let invitation_id = InvitationId::new();
    relay
        .create_invitation(InvitationRecord { id: invitation_id.clone(), group_id: group_id.clone(), group_name: group_name.clone(), expires_at: None, max_uses: None, used_count: 0 })
        .await?;
    let link = build_invite_link(&origin, &InviteLinkPayload { invitation_id, group_id, group_name })?;
    println!("{}", link);
    Ok(())
}

pub async fn invite_join(storage: &Arc<FileStorage>, relay: &LocalFsRelay, link: String) -> AnyResult<()> {
    if storage.get_identity().await?.is_none() {
        identity_init(storage).await?;
    }
    let identity = load_identity(storage).await?;
    let payload = parse_invite_link(&link)?;

    let request = JoinRequest {
        invitation_id: payload.invitation_id,
        group_id: payload.group_id,
        requester_public_key: identity.ecdh_public,
        requester_public_key_hash: identity.public_key_hash.clone(),
        requester_name: "new member".into(),
    };
    let join_request_id = relay.post_join_request(request).await?;
    println!("posted join request {}; waiting for an existing member to approve", join_request_id);
    Ok(())
}

/// An existing member processes one pending join request: appends the
/// joiner's member event, rotates the group key, and posts a key package to
/// every real member including the joiner (§4.10).
pub async fn invite_approve(storage: &Arc<FileStorage>, relay: Arc<LocalFsRelay>, group_id: GroupId, joiner_name: String, recipients: Vec<(String, String)>) -> AnyResult<()> {
    let approver = load_identity(storage).await?;
    let pending = relay.list_join_requests(&group_id, JoinRequestStatus::Pending).await?;
    let target = pending.into_iter().find(|r| r.request.group_id == group_id).ok_or_else(|| anyhow!("no pending join request for group"))?;

    let mut doc = load_doc(storage, group_id.as_str()).await?;
    let mut keyring = load_keyring(storage, group_id.as_str()).await?;

    let joiner_member_id = MemberId::from_public_key_hash(&target.request.requester_public_key_hash);
    let mut key_recipients: Vec<KeyPackageRecipient> =
        recipients.into_iter().map(|(hash, pub_hex)| Ok(KeyPackageRecipient { member_id: MemberId::from_public_key_hash(&hash), ecdh_public: partage_crypto::EcdhPublicKey(hex_decode_32(&pub_hex)?) })).collect::<AnyResult<Vec<_>>>()?;
    key_recipients.push(KeyPackageRecipient { member_id: joiner_member_id.clone(), ecdh_public: target.request.requester_public_key });

    let packages = approve_join(&mut doc, &mut keyring, &group_id, &approver, joiner_member_id, joiner_name, &key_recipients, now_ms())?;

    for (recipient, package) in key_recipients.iter().zip(packages.into_iter()) {
        relay.create_key_package(recipient.member_id.as_str(), package).await?;
    }

    storage.put_snapshot(SnapshotRecord { group_id: group_id.as_str().to_string(), snapshot_bytes: doc.export_snapshot()?, version: Vec::new(), updated_at: now_ms() }).await?;
    for version in 1..=keyring.current_version() {
        if let Some(key) = keyring.get(version) {
            storage.put_group_key(GroupKeyRecord { group_id: group_id.as_str().to_string(), version, key_base64: hex_encode(&key.0) }).await?;
        }
    }
    relay.approve_join_request(&target.id).await?;
    relay.push_update(&group_id, &MemberId::from_public_key_hash(&approver.public_key_hash), doc.export_snapshot()?, None).await?;

    println!("approved join request {}", target.id);
    Ok(())
}

pub async fn invite_receive_keys(storage: &Arc<FileStorage>, relay: Arc<LocalFsRelay>, group_id: GroupId) -> AnyResult<()> {
    let identity = load_identity(storage).await?;
    let mut rx = relay.subscribe_key_packages(&identity.public_key_hash).await?;
    let package = rx.recv().await.ok_or_else(|| anyhow!("no key package arrived"))?;
    let opened = partage_crypto::open_key_package(&package, &identity.ecdh_secret)?;
    let payload: GroupKeysPayload = serde_json::from_slice(&opened)?;
    let keyring = import_group_keys(&payload);

    for version in 1..=keyring.current_version() {
        if let Some(key) = keyring.get(version) {
            storage.put_group_key(GroupKeyRecord { group_id: group_id.as_str().to_string(), version, key_base64: hex_encode(&key.0) }).await?;
        }
    }

    let manager = SyncManager::new(relay, storage.clone(), group_id.clone(), MemberId::from_public_key_hash(&identity.public_key_hash), CrdtDocument::new(partage_core::ReplicaId::new()), keyring);
    manager.initial_sync().await?;
    persist_doc(storage, &manager, group_id.as_str()).await?;
    println!("imported group keys up to version {}", payload.current_key_version);
    Ok(())
}
