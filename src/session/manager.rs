//! Session factory
//!
//! Given a name and a source, picks the loading strategy and returns a
//! constructed session.

use super::{SaveOutcome, Session};
use crate::Result;
use crate::fetch::Fetcher;
use crate::provider::ProviderRouter;
use crate::source::{SourceDescriptor, SourceKind, SourceValue};
use tracing::info;

/// How a source turns into a live database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// New database without schema
    Create,
    /// Local or remote database image
    File,
    /// SQL script executed into an empty database
    Script,
    /// In-memory database image
    Buffer,
    /// Saved copy fetched from a provider
    Stored,
}

impl LoadStrategy {
    pub fn for_source(source: &SourceDescriptor) -> Self {
        match source.kind() {
            SourceKind::Empty => LoadStrategy::Create,
            SourceKind::Local | SourceKind::Remote if source.is_sql_script() => LoadStrategy::Script,
            SourceKind::Local | SourceKind::Remote => LoadStrategy::File,
            SourceKind::Sql => LoadStrategy::Script,
            SourceKind::Binary => LoadStrategy::Buffer,
            SourceKind::Id => LoadStrategy::Stored,
        }
    }
}

/// Builds sessions and saves them through one provider router
#[derive(Debug, Clone)]
pub struct SessionManager {
    fetcher: Fetcher,
    router: ProviderRouter,
}

impl SessionManager {
    pub fn new(fetcher: Fetcher, router: ProviderRouter) -> Self {
        Self { fetcher, router }
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Classify a raw value and load it
    pub async fn open(&self, name: &str, value: Option<SourceValue>) -> Result<Session> {
        self.open_source(name, SourceDescriptor::new(value)).await
    }

    /// Load an already classified source
    pub async fn open_source(&self, name: &str, source: SourceDescriptor) -> Result<Session> {
        info!(source = %source, "Opening");
        Session::load(name, source, &self.fetcher, &self.router).await
    }

    pub async fn save(&self, session: &mut Session, query: &str) -> Result<SaveOutcome> {
        session.save(&self.router, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::fingerprint;
    use crate::provider::Gist;
    use crate::session::DEFAULT_NAME;
    use crate::session::tests::{FakeProvider, router_with};
    use crate::storage::Database;

    fn manager_with(providers: &[std::sync::Arc<FakeProvider>]) -> SessionManager {
        SessionManager::new(Fetcher::new(), router_with(providers))
    }

    fn stored(id: &str, schema: &str, query: &str) -> Gist {
        Gist {
            id: id.to_string(),
            id_prefix: "gist".to_string(),
            name: String::new(),
            owner: "alice".to_string(),
            schema: schema.to_string(),
            query: query.to_string(),
        }
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(LoadStrategy::for_source(&SourceDescriptor::empty()), LoadStrategy::Create);
        assert_eq!(LoadStrategy::for_source(&SourceDescriptor::text("a/b.db")), LoadStrategy::File);
        assert_eq!(LoadStrategy::for_source(&SourceDescriptor::text("https://x/b.sql")), LoadStrategy::Script);
        assert_eq!(LoadStrategy::for_source(&SourceDescriptor::bytes(vec![1])), LoadStrategy::Buffer);
        assert_eq!(
            LoadStrategy::for_source(&SourceDescriptor::bytes(vec![1]).with_kind(SourceKind::Sql)),
            LoadStrategy::Script
        );
        assert_eq!(LoadStrategy::for_source(&SourceDescriptor::text("gist:abc")), LoadStrategy::Stored);
    }

    #[tokio::test]
    async fn test_open_empty() {
        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);
        let mut session = manager.open("", None).await.unwrap();
        assert_eq!(session.name(), DEFAULT_NAME);
        assert_eq!(session.source().kind(), SourceKind::Empty);
        assert!(session.tables().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_stored_query_only() {
        let gist = FakeProvider::new("gist", Some("alice"));
        gist.insert(stored("abc123", "", "select 1"));
        let manager = manager_with(&[gist]);

        let mut session = manager.open("", Some("gist:abc123".into())).await.unwrap();
        assert!(session.tables().unwrap().is_empty());
        assert_eq!(session.query(), "select 1");
        assert_eq!(session.fingerprint(), fingerprint::of_str("select 1"));
        assert_eq!(session.id(), Some("abc123"));
        assert_eq!(session.owner(), Some("alice"));
        assert_eq!(session.name(), "abc123.db");
    }

    #[tokio::test]
    async fn test_open_stored_with_schema_then_save_skips() {
        let gist = FakeProvider::new("gist", Some("alice"));
        gist.insert(stored(
            "abc123",
            "create table users(name text); insert into users values ('ann');",
            "select * from users",
        ));
        let manager = manager_with(&[gist.clone()]);

        let mut session = manager.open("", Some("gist:abc123".into())).await.unwrap();
        assert_eq!(session.tables().unwrap(), ["users"]);
        assert_eq!(session.name(), "users.db");

        let outcome = manager.save(&mut session, "select * from users").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Skipped);
        assert_eq!(gist.writes(), (0, 0));
    }

    #[tokio::test]
    async fn test_open_stored_virtual_table_is_queryable() {
        let original = Database::open_empty().unwrap();
        original
            .execute("create virtual table r using rtree(id, x0, x1); insert into r values (1, 0, 5), (2, 3, 9);")
            .unwrap();
        let schema = crate::dump::to_portable_sql(&original).unwrap();

        let gist = FakeProvider::new("gist", Some("alice"));
        gist.insert(stored("spatial", &schema, "select count(*) from r"));
        let manager = manager_with(&[gist]);

        let mut session = manager.open("", Some("gist:spatial".into())).await.unwrap();
        assert!(session.tables().unwrap().iter().any(|t| t == "r"));
        assert_eq!(session.database().count_rows("r").unwrap(), 2);
        let hits = session.execute("select id from r where x1 > 6").unwrap().unwrap();
        assert_eq!(hits.to_strings(), vec![vec!["2"]]);
    }

    #[tokio::test]
    async fn test_open_script_with_virtual_table() {
        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);
        let script = "create virtual table docs using fts5(body); insert into docs values ('hello world');";
        let source = SourceDescriptor::text(script).with_kind(SourceKind::Sql);
        let mut session = manager.open_source("", source).await.unwrap();
        let hits = session.execute("select body from docs where docs match 'hello'").unwrap().unwrap();
        assert_eq!(hits.to_strings(), vec![vec!["hello world"]]);
    }

    #[tokio::test]
    async fn test_stored_id_routes_past_active_provider() {
        let gist = FakeProvider::new("gist", None);
        let kv = FakeProvider::new("kv", Some("anonymous"));
        gist.insert(stored("abc123", "", "select 1"));
        let manager = manager_with(&[gist, kv]);

        assert_eq!(manager.router().active_provider().unwrap().id_prefix(), "kv");
        let session = manager.open("", Some("gist:abc123".into())).await.unwrap();
        assert_eq!(session.provider(), Some("gist"));
    }

    #[tokio::test]
    async fn test_open_missing_id_fails() {
        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);
        let err = manager.open("", Some("gist:missing".into())).await.unwrap_err();
        match err {
            Error::LoadFailed { label, reason } => {
                assert_eq!(label, "ID gist:missing");
                assert_eq!(reason, "not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_open_binary_releases_payload() {
        let source_db = Database::open_empty().unwrap();
        source_db.execute("create table t(x); insert into t values (1), (2);").unwrap();
        let image = source_db.export_bytes().unwrap();

        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);
        let mut session = manager.open("upload.db", Some(image.into())).await.unwrap();
        assert_eq!(session.name(), "upload.db");
        assert_eq!(session.source().kind(), SourceKind::Binary);
        assert!(session.source().value().is_none());
        assert_eq!(session.tables().unwrap(), ["t"]);
        assert_eq!(session.database().count_rows("t").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_open_garbage_binary_fails() {
        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);
        let err = manager
            .open("", Some(b"this is not a sqlite database at all, sorry".to_vec().into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoadFailed { ref label, .. } if label == "binary value"));
    }

    #[tokio::test]
    async fn test_open_local_file_and_script() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("people.db");
        let script_path = dir.path().join("seed.sql");

        let file_db = Database::open_empty().unwrap();
        file_db.execute("create table people(name); insert into people values ('ann');").unwrap();
        std::fs::write(&db_path, file_db.export_bytes().unwrap()).unwrap();
        std::fs::write(&script_path, "create table seeded(x); insert into seeded values (1);").unwrap();

        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);

        let mut from_file = manager.open("", Some(db_path.to_string_lossy().into_owned().into())).await.unwrap();
        assert_eq!(from_file.name(), "people.db");
        assert_eq!(from_file.tables().unwrap(), ["people"]);

        let mut from_script = manager.open("", Some(script_path.to_string_lossy().into_owned().into())).await.unwrap();
        assert_eq!(from_script.name(), "seed.sql");
        assert_eq!(from_script.query(), "");
        assert_eq!(from_script.tables().unwrap(), ["seeded"]);
    }

    #[tokio::test]
    async fn test_open_inline_sql() {
        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);
        let source = SourceDescriptor::bytes(b"create table t(x);".to_vec()).with_kind(SourceKind::Sql);
        let mut session = manager.open_source("", source).await.unwrap();
        assert_eq!(session.tables().unwrap(), ["t"]);
        assert_eq!(session.source().kind(), SourceKind::Sql);
    }

    #[tokio::test]
    async fn test_missing_local_file_fails() {
        let manager = manager_with(&[FakeProvider::new("gist", Some("alice"))]);
        let err = manager.open("", Some("/no/such/file.db".into())).await.unwrap_err();
        assert!(matches!(err, Error::LoadFailed { .. }));
    }

    #[tokio::test]
    async fn test_saved_session_reloads() {
        let gist = FakeProvider::new("gist", Some("alice"));
        let manager = manager_with(&[gist.clone()]);

        let mut session = manager.open("", None).await.unwrap();
        session.execute("create table t(x); insert into t values (1), (2), (3);").unwrap();
        assert_eq!(manager.save(&mut session, "select count(*) from t").await.unwrap(), SaveOutcome::Created);

        let reference = session.source().to_shareable_reference();
        let mut reloaded = manager.open("", Some(reference.into())).await.unwrap();
        assert_eq!(reloaded.tables().unwrap(), ["t"]);
        assert_eq!(reloaded.database().count_rows("t").unwrap(), 3);
        assert_eq!(reloaded.query(), "select count(*) from t");
        assert_eq!(reloaded.name(), "t.db");
    }
}
