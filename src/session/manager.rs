use crate::db::store::{SessionStore, SESSION_KEY};
use crate::error::DeskResult;
use crate::models::Session;
use crate::remote::RemoteClient;

/// Owns the signed-in session for this client and keeps the persisted copy in sync.
///
/// Lifecycle: [`init`](Self::init) hydrates once, sign-in/up replace the
/// session, [`sign_out`](Self::sign_out) clears it.
pub struct SessionManager<C, S> {
    client: C,
    store: S,
    session: Option<Session>,
    loading: bool,
    error: Option<String>,
}

impl<C: RemoteClient, S: SessionStore> SessionManager<C, S> {
    pub fn new(client: C, store: S) -> Self {
        Self {
            client,
            store,
            session: None,
            loading: true,
            error: None,
        }
    }

    /// Loads the persisted session, if any. Unreadable entries and entries
    /// without an access token are dropped.
    pub fn init(&mut self) -> DeskResult<()> {
        let result = self.hydrate();
        self.loading = false;
        result
    }

    fn hydrate(&mut self) -> DeskResult<()> {
        let Some(raw) = self.store.load(SESSION_KEY)? else {
            return Ok(());
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if session.is_valid() => {
                tracing::debug!(user = %session.user.id, "session restored");
                self.session = Some(session);
            }
            Ok(_) => {
                tracing::warn!("discarding persisted session without access token");
                self.store.remove(SESSION_KEY)?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted session");
                self.store.remove(SESSION_KEY)?;
            }
        }
        Ok(())
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> DeskResult<Session> {
        self.loading = true;
        self.error = None;
        let result = self.client.sign_in(email, password).await;
        let result = self.settle(result, "Unable to sign in");
        self.loading = false;
        result
    }

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        tenant_name: &str,
    ) -> DeskResult<Session> {
        self.loading = true;
        self.error = None;
        let result = self.client.sign_up(email, password, tenant_name).await;
        let result = self.settle(result, "Unable to sign up");
        self.loading = false;
        result
    }

    /// Local only; the backend is not told.
    pub fn sign_out(&mut self) -> DeskResult<()> {
        self.session = None;
        self.store.remove(SESSION_KEY)?;
        tracing::info!("signed out");
        Ok(())
    }

    fn settle(&mut self, result: DeskResult<Session>, fallback: &str) -> DeskResult<Session> {
        match result.and_then(|session| self.persist(session)) {
            Ok(session) => {
                tracing::info!(user = %session.user.id, "signed in");
                Ok(session)
            }
            Err(e) => {
                let message = e.to_string();
                self.error = Some(if message.is_empty() {
                    fallback.to_string()
                } else {
                    message
                });
                Err(e)
            }
        }
    }

    fn persist(&mut self, session: Session) -> DeskResult<Session> {
        let raw = serde_json::to_string(&session)?;
        self.store.save(SESSION_KEY, &raw)?;
        self.session = Some(session.clone());
        Ok(session)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.tenant_id())
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MemoryStore;
    use crate::error::DeskError;
    use crate::models::User;
    use crate::upload::SelectedFile;
    use async_trait::async_trait;

    struct FakeAuth {
        session: Option<Session>,
    }

    #[async_trait]
    impl RemoteClient for FakeAuth {
        async fn sign_in(&self, _: &str, password: &str) -> DeskResult<Session> {
            match (&self.session, password) {
                (Some(s), "secret") => Ok(s.clone()),
                _ => Err(DeskError::Http {
                    status: 400,
                    body: "Invalid login credentials".to_string(),
                }),
            }
        }

        async fn sign_up(&self, _: &str, _: &str, tenant: &str) -> DeskResult<Session> {
            let mut s = self
                .session
                .clone()
                .ok_or_else(|| DeskError::config("Supabase environment variables are missing"))?;
            s.user.tenant_id = Some(tenant.to_lowercase());
            Ok(s)
        }

        async fn upload_document(
            &self,
            _: &str,
            _: &str,
            _: &SelectedFile,
            _: &str,
        ) -> DeskResult<String> {
            unimplemented!()
        }

        async fn call_function(
            &self,
            _: &str,
            _: serde_json::Value,
            _: &str,
        ) -> DeskResult<serde_json::Value> {
            unimplemented!()
        }

        async fn fetch_from_function(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
        ) -> DeskResult<serde_json::Value> {
            unimplemented!()
        }
    }

    fn session() -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_in: Some(3600),
            user: User {
                id: "user-1".to_string(),
                email: Some("ada@example.com".to_string()),
                tenant_id: Some("tenant-1".to_string()),
                user_metadata: None,
            },
        }
    }

    fn manager(store: &MemoryStore) -> SessionManager<FakeAuth, &MemoryStore> {
        let mut m = SessionManager::new(
            FakeAuth {
                session: Some(session()),
            },
            store,
        );
        m.init().unwrap();
        m
    }

    fn persisted(store: &MemoryStore) -> Option<Session> {
        store
            .load(SESSION_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn test_loading_until_init() {
        let store = MemoryStore::new();
        let mut m = SessionManager::new(FakeAuth { session: None }, &store);
        assert!(m.is_loading());
        m.init().unwrap();
        assert!(!m.is_loading());
        assert!(m.session().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_persists_session() {
        let store = MemoryStore::new();
        let mut m = manager(&store);

        let returned = m.sign_in("ada@example.com", "secret").await.unwrap();
        assert_eq!(returned, session());
        assert_eq!(persisted(&store), Some(returned.clone()));
        assert_eq!(m.session(), Some(&returned));
        assert_eq!(m.access_token(), Some("token"));
        assert_eq!(m.tenant_id(), Some("tenant-1"));
        assert!(m.error().is_none());
        assert!(!m.is_loading());
    }

    #[tokio::test]
    async fn test_sign_in_failure_sets_error_and_rethrows() {
        let store = MemoryStore::new();
        let mut m = manager(&store);

        let err = m.sign_in("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, DeskError::Http { status: 400, .. }));
        assert_eq!(m.error(), Some("Invalid login credentials"));
        assert!(!m.is_loading());
        assert!(m.session().is_none());
        assert!(persisted(&store).is_none());

        // next attempt clears the error
        m.sign_in("ada@example.com", "secret").await.unwrap();
        assert!(m.error().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_attaches_tenant() {
        let store = MemoryStore::new();
        let mut m = manager(&store);

        let s = m.sign_up("ada@example.com", "secret", "ACME").await.unwrap();
        assert_eq!(s.tenant_id(), Some("acme"));
        assert_eq!(persisted(&store).unwrap().tenant_id(), Some("acme"));
    }

    #[tokio::test]
    async fn test_sign_up_config_error_is_surfaced() {
        let store = MemoryStore::new();
        let mut m = SessionManager::new(FakeAuth { session: None }, &store);
        m.init().unwrap();

        let err = m.sign_up("a@b.co", "pw", "t").await.unwrap_err();
        assert!(matches!(err, DeskError::Config(_)));
        assert_eq!(m.error(), Some("Supabase environment variables are missing"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_memory_and_store() {
        let store = MemoryStore::new();
        let mut m = manager(&store);
        m.sign_in("ada@example.com", "secret").await.unwrap();

        m.sign_out().unwrap();
        assert!(m.session().is_none());
        assert_eq!(store.load(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_init_hydrates_previous_sign_in() {
        let store = MemoryStore::new();
        manager(&store)
            .sign_in("ada@example.com", "secret")
            .await
            .unwrap();

        let restored = manager(&store);
        assert_eq!(restored.session(), Some(&session()));
    }

    #[test]
    fn test_init_discards_tokenless_or_garbage_entries() {
        let store = MemoryStore::new();
        let mut stale = session();
        stale.access_token = String::new();
        store
            .save(SESSION_KEY, &serde_json::to_string(&stale).unwrap())
            .unwrap();
        assert!(manager(&store).session().is_none());
        assert_eq!(store.load(SESSION_KEY).unwrap(), None);

        store.save(SESSION_KEY, "{not json").unwrap();
        assert!(manager(&store).session().is_none());
        assert_eq!(store.load(SESSION_KEY).unwrap(), None);
    }
}
