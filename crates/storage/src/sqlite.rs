use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use entmerge_core::{
    hlc::HlcClock,
    principal::verify_signature,
    ActorId, EditFlags, EditSummary, EntityId, EntityRedirect, EntityRevision, EntitySnapshot,
    EntityType, Hlc, Principal, RevisionContent, RevisionId, Signature,
};

use crate::error::StorageError;
use crate::traits::{EntityLookup, EntityReader, EntityWriter, LookupMode, RevisionRecord};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn revision_id_from_row(value: Option<i64>) -> Option<RevisionId> {
    value.map(|v| RevisionId::new(v as u64))
}

struct Inner {
    conn: Connection,
    clock: HlcClock,
}

/// SQLite-backed entity store. Revisions are append-only; `entities` points
/// at each id's latest revision.
pub struct SqliteEntityStore {
    inner: Mutex<Inner>,
    cache: Mutex<HashMap<EntityId, EntityLookup>>,
}

impl SqliteEntityStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        crate::schema::init_schema(&conn)?;
        let last_hlc: Option<Vec<u8>> = conn
            .query_row("SELECT max(hlc) FROM revisions", [], |row| row.get(0))?;
        let clock = match last_hlc {
            Some(bytes) => HlcClock::resume_after(Hlc::from_bytes(&to_array::<12>(bytes, "hlc")?)),
            None => HlcClock::new(),
        };
        Ok(Self {
            inner: Mutex::new(Inner { conn, clock }),
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, HashMap<EntityId, EntityLookup>>, StorageError> {
        self.cache.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Run a closure against the raw connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        let inner = self.lock_inner()?;
        Ok(f(&inner.conn)?)
    }

    /// Allocate the next unused id for an entity type.
    pub fn next_id(&self, entity_type: EntityType) -> Result<EntityId, StorageError> {
        let inner = self.lock_inner()?;
        let number: i64 = inner.conn.query_row(
            "INSERT INTO id_counters (entity_type, last_number) VALUES (?1, 1)
             ON CONFLICT(entity_type) DO UPDATE SET last_number = last_number + 1
             RETURNING last_number",
            rusqlite::params![entity_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(EntityId::new(entity_type, number as u64))
    }

    /// Revision metadata for an entity, newest first.
    pub fn history(&self, entity_id: EntityId) -> Result<Vec<RevisionRecord>, StorageError> {
        let inner = self.lock_inner()?;
        let mut stmt = inner.conn.prepare(
            "SELECT revision_id, parent_revision, kind, hlc, author, flags, summary
             FROM revisions WHERE entity_id = ?1 ORDER BY revision_id DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![entity_id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, Vec<u8>>(4)?,
                row.get::<_, u8>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (revision_id, parent, kind, hlc, author, flags, summary) = row?;
            records.push(RevisionRecord {
                revision_id: RevisionId::new(revision_id as u64),
                parent: revision_id_from_row(parent),
                entity_id,
                kind,
                timestamp: Hlc::from_bytes(&to_array::<12>(hlc, "hlc")?),
                author: ActorId::from_bytes(to_array::<32>(author, "author")?),
                flags: EditFlags::from_bits_truncate(flags),
                summary,
            });
        }
        Ok(records)
    }

    /// Entities whose latest revision links to `page` on `site`.
    pub fn entities_for_sitelink(
        &self,
        site: &str,
        page: &str,
    ) -> Result<Vec<EntityId>, StorageError> {
        let inner = self.lock_inner()?;
        let mut stmt = inner.conn.prepare(
            "SELECT entity_id FROM sitelinks WHERE site = ?1 AND page = ?2 ORDER BY entity_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![site, page], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?.parse()?);
        }
        Ok(ids)
    }

    fn load_latest(&self, id: EntityId) -> Result<EntityLookup, StorageError> {
        let inner = self.lock_inner()?;
        let row = inner
            .conn
            .query_row(
                "SELECT r.revision_id, r.parent_revision, r.content, r.checksum,
                        r.author, r.signature, r.hlc
                 FROM entities e JOIN revisions r ON r.revision_id = e.latest_revision
                 WHERE e.entity_id = ?1",
                rusqlite::params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                        row.get::<_, Vec<u8>>(6)?,
                    ))
                },
            )
            .optional()?;
        drop(inner);

        let Some((revision_id, parent, content, checksum, author, signature, hlc)) = row else {
            return Ok(EntityLookup::Absent);
        };

        let revision_id = RevisionId::new(revision_id as u64);
        let parent = revision_id_from_row(parent);
        let checksum = to_array::<32>(checksum, "checksum")?;
        if *blake3::hash(&content).as_bytes() != checksum {
            return Err(StorageError::Corrupted(format!(
                "{id} at {revision_id}: checksum mismatch"
            )));
        }
        let author = ActorId::from_bytes(to_array::<32>(author, "author")?);
        let signature = Signature::from_bytes(to_array::<64>(signature, "signature")?);
        let timestamp = Hlc::from_bytes(&to_array::<12>(hlc, "hlc")?);
        verify_signature(
            &author,
            &EntityRevision::signing_bytes(&id, parent, &timestamp, &checksum),
            &signature,
        )?;

        let content = RevisionContent::from_msgpack(&content)?;
        if content.entity_id() != id {
            return Err(StorageError::Corrupted(format!(
                "{id} at {revision_id}: content belongs to {}",
                content.entity_id()
            )));
        }

        Ok(match content {
            RevisionContent::Redirect(redirect) => EntityLookup::Redirect { revision_id, redirect },
            content @ RevisionContent::Entity(_) => EntityLookup::Entity(EntityRevision {
                revision_id,
                parent,
                timestamp,
                author,
                content,
            }),
        })
    }

    fn commit(
        &self,
        content: RevisionContent,
        summary: &EditSummary,
        principal: &Principal,
        flags: EditFlags,
        base: Option<RevisionId>,
    ) -> Result<EntityRevision, StorageError> {
        let entity_id = content.entity_id();
        let id_str = entity_id.to_string();

        let mut guard = self.lock_inner()?;
        let Inner { conn, clock } = &mut *guard;
        let tx = conn.transaction()?;

        let current: Option<i64> = tx
            .query_row(
                "SELECT latest_revision FROM entities WHERE entity_id = ?1",
                rusqlite::params![id_str],
                |row| row.get(0),
            )
            .optional()?;
        let current = revision_id_from_row(current);

        if flags.contains(EditFlags::NEW) && current.is_some() {
            return Err(StorageError::EntityExists(id_str));
        }
        if flags.contains(EditFlags::UPDATE) && current.is_none() {
            return Err(StorageError::NotFound(id_str));
        }
        if let Some(expected) = base
            && current != Some(expected)
        {
            debug!(
                entity = %entity_id,
                %expected,
                ?current,
                "rejecting write on stale base revision"
            );
            return Err(StorageError::EditConflict {
                entity_id: id_str,
                expected,
                actual: current,
            });
        }

        if let RevisionContent::Entity(entity) = &content
            && !flags.contains(EditFlags::IGNORE_CONSTRAINTS)
        {
            for (site, link) in entity.sitelinks() {
                let holder: Option<String> = tx
                    .query_row(
                        "SELECT entity_id FROM sitelinks
                         WHERE site = ?1 AND page = ?2 AND entity_id != ?3 LIMIT 1",
                        rusqlite::params![site, link.page, id_str],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(holder) = holder {
                    return Err(StorageError::ConstraintViolation(format!(
                        "{site}:{} is already linked to {holder}",
                        link.page
                    )));
                }
            }
        }

        let timestamp = clock.tick()?;
        let content_bytes = content.to_msgpack()?;
        let checksum = *blake3::hash(&content_bytes).as_bytes();
        let signature = principal.sign(&EntityRevision::signing_bytes(
            &entity_id,
            current,
            &timestamp,
            &checksum,
        ));

        tx.execute(
            "INSERT INTO revisions (entity_id, parent_revision, kind, content, checksum,
                                    author, signature, hlc, flags, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                id_str,
                current.map(|r| r.get() as i64),
                content.kind_name(),
                content_bytes,
                &checksum[..],
                principal.actor_id().as_bytes().as_slice(),
                signature.as_bytes().as_slice(),
                &timestamp.to_bytes()[..],
                flags.bits(),
                summary.format(),
            ],
        )?;
        let revision_id = RevisionId::new(tx.last_insert_rowid() as u64);

        tx.execute(
            "INSERT INTO entities (entity_id, entity_type, latest_revision) VALUES (?1, ?2, ?3)
             ON CONFLICT(entity_id) DO UPDATE SET latest_revision = excluded.latest_revision",
            rusqlite::params![id_str, entity_id.entity_type().as_str(), revision_id.get() as i64],
        )?;

        tx.execute("DELETE FROM sitelinks WHERE entity_id = ?1", rusqlite::params![id_str])?;
        if let RevisionContent::Entity(entity) = &content {
            for (site, link) in entity.sitelinks() {
                tx.execute(
                    "INSERT INTO sitelinks (site, page, entity_id) VALUES (?1, ?2, ?3)",
                    rusqlite::params![site, link.page, id_str],
                )?;
            }
        }

        tx.commit()?;
        drop(guard);

        self.lock_cache()?.remove(&entity_id);
        debug!(
            entity = %entity_id,
            revision = %revision_id,
            kind = content.kind_name(),
            ?flags,
            "saved revision"
        );

        Ok(EntityRevision {
            revision_id,
            parent: current,
            timestamp,
            author: principal.actor_id(),
            content,
        })
    }
}

impl EntityReader for SqliteEntityStore {
    fn get(&self, id: EntityId, mode: LookupMode) -> Result<EntityLookup, StorageError> {
        if mode == LookupMode::Cached
            && let Some(hit) = self.lock_cache()?.get(&id)
        {
            return Ok(hit.clone());
        }
        let lookup = self.load_latest(id)?;
        self.lock_cache()?.insert(id, lookup.clone());
        Ok(lookup)
    }
}

impl EntityWriter for SqliteEntityStore {
    fn save_entity(
        &self,
        entity: &EntitySnapshot,
        summary: &EditSummary,
        principal: &Principal,
        flags: EditFlags,
        base: Option<RevisionId>,
    ) -> Result<EntityRevision, StorageError> {
        self.commit(RevisionContent::Entity(entity.clone()), summary, principal, flags, base)
    }

    /// Only existing ids can become redirects.
    fn save_redirect(
        &self,
        redirect: &EntityRedirect,
        summary: &EditSummary,
        principal: &Principal,
        flags: EditFlags,
        base: Option<RevisionId>,
    ) -> Result<EntityRevision, StorageError> {
        self.commit(
            RevisionContent::Redirect(*redirect),
            summary,
            principal,
            flags | EditFlags::UPDATE,
            base,
        )
    }
}

impl std::fmt::Debug for SqliteEntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEntityStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> EditSummary {
        EditSummary::new("test")
    }

    #[test]
    fn reopen_keeps_revisions_and_clock() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("entities.db");
        let path = path.to_str().ok_or("non-utf8 temp path")?;
        let alice = Principal::new("Alice");
        let id = EntityId::item(1);

        let first = {
            let store = SqliteEntityStore::open(path)?;
            store.save_entity(
                &EntitySnapshot::new(id).with_label("en", "one"),
                &summary(),
                &alice,
                EditFlags::NEW,
                None,
            )?
        };

        let store = SqliteEntityStore::open(path)?;
        let lookup = store.get(id, LookupMode::Authoritative)?;
        assert_eq!(lookup.entity().and_then(|e| e.label("en")), Some("one"));

        let second = store.save_entity(
            &EntitySnapshot::new(id).with_label("en", "uno"),
            &summary(),
            &alice,
            EditFlags::UPDATE,
            Some(first.revision_id),
        )?;
        assert!(second.revision_id > first.revision_id);
        assert!(second.timestamp > first.timestamp);
        assert_eq!(second.parent, Some(first.revision_id));
        Ok(())
    }

    #[test]
    fn tampered_content_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteEntityStore::open_in_memory()?;
        let alice = Principal::new("Alice");
        let id = EntityId::item(7);
        let original = EntitySnapshot::new(id).with_label("en", "x");
        store.save_entity(&original, &summary(), &alice, EditFlags::NEW, None)?;

        let forged = EntitySnapshot::new(id).with_label("en", "forged");
        let forged = RevisionContent::Entity(forged).to_msgpack()?;
        store.with_connection(|conn| {
            conn.execute("UPDATE revisions SET content = ?1", rusqlite::params![forged])
        })?;

        let err = store.get(id, LookupMode::Authoritative).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)), "got {err:?}");
        Ok(())
    }

    #[test]
    fn next_id_counts_per_type() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteEntityStore::open_in_memory()?;
        assert_eq!(store.next_id(EntityType::Item)?, EntityId::item(1));
        assert_eq!(store.next_id(EntityType::Item)?, EntityId::item(2));
        assert_eq!(store.next_id(EntityType::Property)?, EntityId::property(1));
        Ok(())
    }
}
