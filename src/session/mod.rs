//! Sessions - a live database plus where it came from and where it is saved
//!
//! A session exclusively owns its database handle. Loading never panics:
//! every failure becomes [`Error::LoadFailed`] carrying the source label.
//! Saving decides between create, update and skip:
//! - no remote id yet, or saved under another account → create
//! - unchanged fingerprint → skip the network call
//! - otherwise → update

pub mod manager;

pub use manager::{LoadStrategy, SessionManager};

use crate::dump;
use crate::fetch::Fetcher;
use crate::fingerprint;
use crate::provider::{Gist, ProviderRouter};
use crate::source::{SourceDescriptor, SourceKind, SourceValue};
use crate::storage::{Database, ResultSet};
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// Name of a session nobody named yet
pub const DEFAULT_NAME: &str = "new.db";

const NAME_SUFFIX: &str = ".db";
const ID_NAME_LEN: usize = 8;

/// What a save call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No tables and no query, nothing worth saving
    Nothing,
    /// Unchanged since the last save, no network call made
    Skipped,
    /// A new remote copy was created
    Created,
    /// The existing remote copy was updated
    Updated,
}

/// A live database with its source and remote identity
#[derive(Debug)]
pub struct Session {
    id: Option<String>,
    provider: Option<String>,
    owner: Option<String>,
    name: String,
    source: SourceDescriptor,
    query: String,
    fingerprint: i32,
    db: Database,
    tables: Option<Vec<String>>,
}

impl Session {
    fn new(name: &str, source: SourceDescriptor, db: Database) -> Self {
        let name = if name.is_empty() {
            let derived = source.extract_default_name();
            if derived.is_empty() { DEFAULT_NAME.to_string() } else { derived }
        } else {
            name.to_string()
        };

        Self {
            id: None,
            provider: None,
            owner: None,
            name,
            source,
            query: String::new(),
            fingerprint: 0,
            db,
            tables: None,
        }
    }

    /// Load a session from any source.
    ///
    /// `name` may be empty; it then falls back to the source's last path
    /// segment, a saved name, or [`DEFAULT_NAME`].
    pub async fn load(
        name: &str,
        source: SourceDescriptor,
        fetcher: &Fetcher,
        router: &ProviderRouter,
    ) -> Result<Session> {
        let label = source.to_label();
        let strategy = LoadStrategy::for_source(&source);
        debug!(source = %label, strategy = ?strategy, "Loading session");

        let loaded = match strategy {
            LoadStrategy::Create => Self::create(name, source),
            LoadStrategy::Script => Self::load_script(name, source, fetcher).await,
            LoadStrategy::File => Self::load_file(name, source, fetcher).await,
            LoadStrategy::Buffer => Self::load_buffer(name, source),
            LoadStrategy::Stored => Self::load_stored(name, source, router).await,
        };

        loaded.map_err(|e| {
            warn!(source = %label, error = %e, "Load failed");
            match e {
                Error::LoadFailed { .. } => e,
                other => Error::LoadFailed {
                    label,
                    reason: other.to_string(),
                },
            }
        })
    }

    /// Fresh database without schema
    pub fn create(name: &str, source: SourceDescriptor) -> Result<Session> {
        let name = if name.is_empty() { DEFAULT_NAME } else { name };
        Ok(Session::new(name, source, Database::open_empty()?))
    }

    /// Execute a SQL script as the initial state. The script becomes schema,
    /// so the pending query stays empty.
    async fn load_script(name: &str, mut source: SourceDescriptor, fetcher: &Fetcher) -> Result<Session> {
        let script = match source.kind() {
            SourceKind::Local | SourceKind::Remote => fetcher.fetch_text(&source).await?,
            _ => match source.take_value() {
                Some(SourceValue::Text(text)) => text,
                Some(SourceValue::Bytes(bytes)) => String::from_utf8(bytes)
                    .map_err(|e| Error::InvalidSource(format!("sql script is not valid UTF-8: {}", e)))?,
                None => String::new(),
            },
        };

        let db = Database::open_empty()?;
        db.execute(&script)?;
        let db = db.reload()?;
        let mut session = Session::new(name, source, db);
        session.query.clear();
        session.tables()?;
        Ok(session)
    }

    /// Download or read a database image
    async fn load_file(name: &str, source: SourceDescriptor, fetcher: &Fetcher) -> Result<Session> {
        let image = fetcher.fetch_bytes(&source).await?;
        let db = Database::open_from_bytes(&image)?;
        let mut session = Session::new(name, source, db);
        session.tables()?;
        Ok(session)
    }

    /// Open an in-memory image. The payload is released afterwards while the
    /// descriptor keeps its `binary` kind.
    fn load_buffer(name: &str, mut source: SourceDescriptor) -> Result<Session> {
        let image = match source.take_value() {
            Some(SourceValue::Bytes(bytes)) => bytes,
            Some(SourceValue::Text(text)) => text.into_bytes(),
            None => return Err(Error::InvalidSource("binary value is empty".to_string())),
        };
        let db = Database::open_from_bytes(&image)?;
        drop(image);
        let mut session = Session::new(name, source, db);
        session.tables()?;
        Ok(session)
    }

    /// Fetch a saved copy through the provider that issued its id
    async fn load_stored(name: &str, source: SourceDescriptor, router: &ProviderRouter) -> Result<Session> {
        let stored = source.to_shareable_reference();
        if source.split_id().is_none() {
            return Err(Error::InvalidSource(format!("{} is not a stored id", stored)));
        }

        let gist = router.resolve_by_id(&stored).await?.ok_or_else(|| Error::LoadFailed {
            label: source.to_label(),
            reason: "not found".to_string(),
        })?;

        let db = Database::open_empty()?;
        db.execute(&gist.schema)?;
        let db = db.reload()?;

        let name = if name.is_empty() { gist.name.as_str() } else { name };
        let mut session = Session::new(name, source, db);
        session.query = gist.query.clone();
        session.id = Some(gist.id.clone());
        session.provider = Some(gist.id_prefix.clone());
        session.owner = Some(gist.owner.clone());
        session.fingerprint = session.calc_fingerprint()?;
        session.apply_name_fallback()?;
        Ok(session)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Prefix of the provider holding `id`
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fingerprint(&self) -> i32 {
        self.fingerprint
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run SQL against the live database.
    ///
    /// The cached table list is dropped since the statements may have
    /// changed the schema.
    pub fn execute(&mut self, sql: &str) -> Result<Option<ResultSet>> {
        let result = self.db.execute(sql);
        self.tables = None;
        result
    }

    /// User tables, computed on first use after a change
    pub fn tables(&mut self) -> Result<&[String]> {
        if self.tables.is_none() {
            self.tables = Some(self.db.table_names()?);
        }
        Ok(self.tables.as_deref().unwrap_or_default())
    }

    /// Portable SQL script of the current database
    pub fn dump(&self) -> Result<String> {
        dump::to_portable_sql(&self.db)
    }

    /// Fingerprint of (database, query) as it is right now
    pub fn calc_fingerprint(&self) -> Result<i32> {
        let db_hash = fingerprint::of_database(&self.db)?;
        Ok(fingerprint::combine(db_hash, fingerprint::of_str(&self.query)))
    }

    /// Derive a name for sessions still called [`DEFAULT_NAME`]: the first
    /// table, else the start of the remote id.
    pub fn apply_name_fallback(&mut self) -> Result<()> {
        if !self.name.is_empty() && self.name != DEFAULT_NAME {
            return Ok(());
        }

        let first_table = self.tables()?.first().cloned();
        self.name = match (first_table, &self.id) {
            (Some(table), _) => format!("{}{}", table, NAME_SUFFIX),
            (None, Some(id)) => {
                let short: String = id.chars().take(ID_NAME_LEN).collect();
                format!("{}{}", short, NAME_SUFFIX)
            }
            (None, None) => DEFAULT_NAME.to_string(),
        };
        Ok(())
    }

    /// Save to the router's active provider.
    ///
    /// Callers must not run two saves (or a save and a load) on the same
    /// session at once. On error no identity field changes, and the stored
    /// fingerprint stays at its last synced value so a retry is not skipped.
    pub async fn save(&mut self, router: &ProviderRouter, query: &str) -> Result<SaveOutcome> {
        self.query = query.to_string();

        let schema = self.dump()?;
        if schema.is_empty() && query.is_empty() {
            debug!(name = %self.name, "Nothing to save");
            return Ok(SaveOutcome::Nothing);
        }

        let previous = self.fingerprint;
        self.tables = None;
        let current = self.calc_fingerprint()?;
        self.apply_name_fallback()?;

        let provider = router.active_provider()?;
        let user = provider.current_user_id();
        let same_owner = self.owner.is_some() && self.owner == user;
        let same_provider = self.provider.as_deref() == Some(provider.id_prefix());

        let (gist, outcome) = match &self.id {
            Some(id) if same_owner && same_provider => {
                if current != 0 && current == previous {
                    debug!(name = %self.name, fingerprint = current, "Unchanged, skipping save");
                    return Ok(SaveOutcome::Skipped);
                }
                info!(provider = provider.id_prefix(), id = %id, "Updating saved copy");
                let gist = provider.update(id, &self.name, &schema, query).await?;
                (gist, SaveOutcome::Updated)
            }
            _ => {
                info!(provider = provider.id_prefix(), name = %self.name, "Creating saved copy");
                let gist = provider.create(&self.name, &schema, query).await?;
                (gist, SaveOutcome::Created)
            }
        };

        self.fingerprint = current;
        self.apply_saved(gist, user)?;
        Ok(outcome)
    }

    fn apply_saved(&mut self, gist: Gist, user: Option<String>) -> Result<()> {
        self.source = SourceDescriptor::stored(&gist.id_prefix, &gist.id);
        self.owner = if gist.owner.is_empty() { user } else { Some(gist.owner) };
        self.provider = Some(gist.id_prefix);
        self.id = Some(gist.id);
        self.apply_name_fallback()
    }

    /// Public web view of the saved copy, if the provider has one
    pub fn share_url(&self, router: &ProviderRouter) -> Result<Option<String>> {
        let (Some(id), Some(prefix)) = (&self.id, &self.provider) else {
            return Ok(None);
        };
        let Some(provider) = router.provider(prefix) else {
            return Ok(None);
        };
        provider.load_credentials()?;
        let url = provider.public_url_for(id);
        Ok(if url.is_empty() { None } else { Some(url) })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::StorageProvider;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// In-memory provider recording every write
    pub(crate) struct FakeProvider {
        prefix: &'static str,
        user: Mutex<Option<String>>,
        store: Mutex<HashMap<String, Gist>>,
        pub creates: Mutex<usize>,
        pub updates: Mutex<usize>,
        fail_writes: Mutex<bool>,
    }

    impl FakeProvider {
        pub(crate) fn new(prefix: &'static str, user: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                prefix,
                user: Mutex::new(user.map(String::from)),
                store: Mutex::new(HashMap::new()),
                creates: Mutex::new(0),
                updates: Mutex::new(0),
                fail_writes: Mutex::new(false),
            })
        }

        pub(crate) fn set_user(&self, user: Option<&str>) {
            *self.user.lock() = user.map(String::from);
        }

        pub(crate) fn fail_writes(&self, fail: bool) {
            *self.fail_writes.lock() = fail;
        }

        pub(crate) fn insert(&self, gist: Gist) {
            self.store.lock().insert(gist.id.clone(), gist);
        }

        pub(crate) fn writes(&self) -> (usize, usize) {
            (*self.creates.lock(), *self.updates.lock())
        }

        fn check_write(&self) -> Result<()> {
            if *self.fail_writes.lock() {
                return Err(Error::Provider {
                    provider: self.prefix.to_string(),
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StorageProvider for FakeProvider {
        fn id_prefix(&self) -> &str {
            self.prefix
        }

        fn current_user_id(&self) -> Option<String> {
            self.user.lock().clone()
        }

        fn has_credentials(&self) -> bool {
            self.user.lock().is_some()
        }

        fn load_credentials(&self) -> Result<()> {
            Ok(())
        }

        fn public_url_for(&self, id: &str) -> String {
            format!("https://{}.test/{}", self.prefix, id)
        }

        async fn fetch_by_id(&self, id: &str) -> Result<Option<Gist>> {
            Ok(self.store.lock().get(id).cloned())
        }

        async fn create(&self, name: &str, schema: &str, query: &str) -> Result<Gist> {
            self.check_write()?;
            let mut creates = self.creates.lock();
            *creates += 1;
            let gist = Gist {
                id: format!("{}{:04}", self.prefix, *creates),
                id_prefix: self.prefix.to_string(),
                name: name.to_string(),
                owner: self.user.lock().clone().unwrap_or_default(),
                schema: schema.to_string(),
                query: query.to_string(),
            };
            self.store.lock().insert(gist.id.clone(), gist.clone());
            Ok(gist)
        }

        async fn update(&self, id: &str, name: &str, schema: &str, query: &str) -> Result<Gist> {
            self.check_write()?;
            *self.updates.lock() += 1;
            let mut store = self.store.lock();
            let gist = store.get_mut(id).ok_or_else(|| Error::Provider {
                provider: self.prefix.to_string(),
                status: 404,
                message: "missing".to_string(),
            })?;
            gist.name = name.to_string();
            gist.schema = schema.to_string();
            gist.query = query.to_string();
            Ok(gist.clone())
        }
    }

    pub(crate) fn router_with(providers: &[Arc<FakeProvider>]) -> ProviderRouter {
        ProviderRouter::new(
            providers
                .iter()
                .map(|p| p.clone() as Arc<dyn StorageProvider>)
                .collect(),
        )
    }

    fn session_with_rows() -> Session {
        let mut session = Session::create("", SourceDescriptor::empty()).unwrap();
        session
            .execute("create table users(id integer primary key, name text); insert into users(name) values ('ann');")
            .unwrap();
        session
    }

    #[test]
    fn test_create_uses_default_name() {
        let mut session = Session::create("", SourceDescriptor::empty()).unwrap();
        assert_eq!(session.name(), DEFAULT_NAME);
        assert!(session.tables().unwrap().is_empty());
        assert_eq!(session.fingerprint(), 0);
    }

    #[test]
    fn test_execute_invalidates_tables() {
        let mut session = Session::create("scratch.db", SourceDescriptor::empty()).unwrap();
        assert!(session.tables().unwrap().is_empty());
        session.execute("create table b(x); create table a(x);").unwrap();
        assert_eq!(session.tables().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_name_fallback() {
        let mut session = session_with_rows();
        session.apply_name_fallback().unwrap();
        assert_eq!(session.name(), "users.db");

        let mut named = Session::create("mine.db", SourceDescriptor::empty()).unwrap();
        named.execute("create table t(x)").unwrap();
        named.apply_name_fallback().unwrap();
        assert_eq!(named.name(), "mine.db");

        let mut by_id = Session::create("", SourceDescriptor::empty()).unwrap();
        by_id.id = Some("0123456789abcdef".to_string());
        by_id.apply_name_fallback().unwrap();
        assert_eq!(by_id.name(), "01234567.db");
    }

    #[tokio::test]
    async fn test_save_nothing() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let router = router_with(&[gist.clone()]);
        let mut session = Session::create("", SourceDescriptor::empty()).unwrap();

        assert_eq!(session.save(&router, "").await.unwrap(), SaveOutcome::Nothing);
        assert_eq!(gist.writes(), (0, 0));
        assert!(session.id().is_none());
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let router = router_with(&[gist.clone()]);
        let mut session = session_with_rows();

        assert_eq!(session.save(&router, "select * from users").await.unwrap(), SaveOutcome::Created);
        assert_eq!(session.save(&router, "select * from users").await.unwrap(), SaveOutcome::Skipped);
        assert_eq!(gist.writes(), (1, 0));

        assert_eq!(session.id(), Some("gist0001"));
        assert_eq!(session.owner(), Some("alice"));
        assert_eq!(session.name(), "users.db");
        assert_eq!(session.source().kind(), SourceKind::Id);
        assert_eq!(session.source().to_shareable_reference(), "gist:gist0001");
    }

    #[tokio::test]
    async fn test_changes_update() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let router = router_with(&[gist.clone()]);
        let mut session = session_with_rows();

        session.save(&router, "").await.unwrap();
        session.execute("insert into users(name) values ('bob')").unwrap();
        assert_eq!(session.save(&router, "").await.unwrap(), SaveOutcome::Updated);
        assert_eq!(session.save(&router, "select 2").await.unwrap(), SaveOutcome::Updated);
        assert_eq!(gist.writes(), (1, 2));
        assert_eq!(session.id(), Some("gist0001"));
    }

    #[tokio::test]
    async fn test_ownership_switch_forces_create() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let router = router_with(&[gist.clone()]);
        let mut session = session_with_rows();

        session.save(&router, "select 1").await.unwrap();
        gist.set_user(Some("bob"));
        assert_eq!(session.save(&router, "select 1").await.unwrap(), SaveOutcome::Created);
        assert_eq!(gist.writes(), (2, 0));
        assert_eq!(session.id(), Some("gist0002"));
        assert_eq!(session.owner(), Some("bob"));
    }

    #[tokio::test]
    async fn test_provider_switch_forces_create() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let kv = FakeProvider::new("kv", Some("alice"));
        let router = router_with(&[gist.clone(), kv.clone()]);
        let mut session = session_with_rows();

        session.save(&router, "").await.unwrap();
        gist.set_user(None);
        assert_eq!(session.save(&router, "").await.unwrap(), SaveOutcome::Created);
        assert_eq!(kv.writes(), (1, 0));
        assert_eq!(session.provider(), Some("kv"));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_identity() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let router = router_with(&[gist.clone()]);
        let mut session = session_with_rows();
        session.save(&router, "").await.unwrap();
        let synced = session.fingerprint();

        session.execute("insert into users(name) values ('bob')").unwrap();
        gist.fail_writes(true);
        assert!(session.save(&router, "").await.is_err());
        assert_eq!(session.id(), Some("gist0001"));
        assert_eq!(session.owner(), Some("alice"));
        assert_eq!(session.fingerprint(), synced);

        gist.fail_writes(false);
        assert_eq!(session.save(&router, "").await.unwrap(), SaveOutcome::Updated);
    }

    #[tokio::test]
    async fn test_failed_first_save_stays_unsaved() {
        let gist = FakeProvider::new("gist", Some("alice"));
        gist.fail_writes(true);
        let router = router_with(&[gist.clone()]);
        let mut session = session_with_rows();

        assert!(session.save(&router, "").await.is_err());
        assert!(session.id().is_none());
        assert!(session.owner().is_none());
        assert_eq!(session.source().kind(), SourceKind::Empty);
    }

    #[test]
    fn test_share_url() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let router = router_with(&[gist.clone()]);
        let mut session = session_with_rows();
        assert_eq!(session.share_url(&router).unwrap(), None);

        session.id = Some("abc".to_string());
        session.provider = Some("gist".to_string());
        assert_eq!(session.share_url(&router).unwrap().as_deref(), Some("https://gist.test/abc"));
    }
}
