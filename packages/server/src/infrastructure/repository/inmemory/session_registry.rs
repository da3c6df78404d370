//! InMemory Session Registry 実装
//!
//! ドメイン層が定義する SessionRegistry trait の具体的な実装。
//! `HashMap` 全体を 1 つの `Mutex` で保護します。チャット規模の件数であれば
//! これで十分であり、登録の「存在確認 → 挿入」が必ず 1 つのクリティカルセクションに収まります。

use std::collections::{HashMap, hash_map::Entry};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use crate::domain::{Identity, RegistryError, SessionHandle, SessionRegistry};

/// インメモリ Session Registry 実装
pub struct InMemorySessionRegistry {
    /// Identity → Session
    sessions: Mutex<HashMap<Identity, SessionHandle>>,
    /// 登録数（ロック内で更新）
    count: watch::Sender<usize>,
}

impl InMemorySessionRegistry {
    /// 新しい InMemorySessionRegistry を作成
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            count: watch::Sender::new(0),
        }
    }
}

impl Default for InMemorySessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRegistry for InMemorySessionRegistry {
    async fn register(&self, session: SessionHandle) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.entry(session.identity().clone()) {
            Entry::Occupied(entry) => Err(RegistryError::NameTaken(entry.key().clone())),
            Entry::Vacant(entry) => {
                session.activate();
                tracing::debug!("Session '{}' registered", session.identity());
                entry.insert(session);
                self.count.send_replace(sessions.len());
                Ok(())
            }
        }
    }

    async fn unregister(&self, session: &SessionHandle) -> bool {
        let mut sessions = self.sessions.lock().await;
        let is_current = sessions
            .get(session.identity())
            .is_some_and(|current| current.same_session(session));
        if is_current {
            sessions.remove(session.identity());
            self.count.send_replace(sessions.len());
            tracing::debug!("Session '{}' unregistered", session.identity());
        }
        is_current
    }

    async fn lookup(&self, identity: &Identity) -> Option<SessionHandle> {
        let sessions = self.sessions.lock().await;
        sessions.get(identity).cloned()
    }

    async fn list_active(&self) -> Vec<Identity> {
        let sessions = self.sessions.lock().await;
        let mut identities: Vec<Identity> = sessions
            .values()
            .filter(|session| session.is_active())
            .map(|session| session.identity().clone())
            .collect();
        identities.sort();
        identities
    }

    async fn active_sessions(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .filter(|session| session.is_active())
            .cloned()
            .collect()
    }

    async fn count(&self) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.len()
    }

    fn watch_count(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{SessionState, Timestamp};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - register / unregister / lookup / list_active の基本動作
    // - 同名の並行登録で成功するのが 1 つだけであること
    // - 古いセッションの unregister が新しい同名セッションを消さないこと
    //
    // 【なぜこのテストが必要か】
    // - Registry は「誰がオンラインか」の唯一の情報源
    // - 登録の競合があると 2 つの接続が 1 つの Identity を共有してしまう
    // ========================================

    fn create_test_session(name: &str) -> SessionHandle {
        let (session, _rx) =
            SessionHandle::new(Identity::try_from(name).unwrap(), 8, Timestamp::new(0));
        session
    }

    #[tokio::test]
    async fn test_register_activates_session() {
        // テスト項目: 登録に成功するとセッションは Active になる
        // given (前提条件):
        let registry = InMemorySessionRegistry::new();
        let alice = create_test_session("alice");

        // when (操作):
        let result = registry.register(alice.clone()).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(alice.state(), SessionState::Active);
        assert_eq!(registry.count().await, 1);
        assert_eq!(*registry.watch_count().borrow(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_name_is_rejected() {
        // テスト項目: 同名の登録は NameTaken になり、後発のセッションは Active にならない
        // given (前提条件):
        let registry = InMemorySessionRegistry::new();
        registry.register(create_test_session("alice")).await.unwrap();
        let duplicate = create_test_session("alice");

        // when (操作):
        let result = registry.register(duplicate.clone()).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RegistryError::NameTaken(Identity::try_from("alice").unwrap()))
        );
        assert_eq!(duplicate.state(), SessionState::Connecting);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_same_name_exactly_one_wins() {
        // テスト項目: 同名の並行登録で成功するのは必ず 1 つだけ
        // given (前提条件):
        let registry = Arc::new(InMemorySessionRegistry::new());

        // when (操作): 64 タスクから同時に "alice" を登録
        let mut handles = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.register(create_test_session("alice")).await
            }));
        }
        let mut successes = 0;
        let mut name_taken = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(RegistryError::NameTaken(_)) => name_taken += 1,
            }
        }

        // then (期待する結果):
        assert_eq!(successes, 1);
        assert_eq!(name_taken, 63);
        assert_eq!(registry.list_active().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_ignores_stale_session() {
        // テスト項目: 別接続（同名）のハンドルで unregister しても現在のセッションは残る
        // given (前提条件):
        let registry = InMemorySessionRegistry::new();
        let current = create_test_session("alice");
        let stale = create_test_session("alice");
        registry.register(current.clone()).await.unwrap();

        // when (操作):
        let removed = registry.unregister(&stale).await;

        // then (期待する結果):
        assert!(!removed);
        assert!(registry.lookup(current.identity()).await.is_some());
    }

    #[tokio::test]
    async fn test_unregister_removes_current_session() {
        // テスト項目: unregister すると list_active / lookup から消える
        // given (前提条件):
        let registry = InMemorySessionRegistry::new();
        let alice = create_test_session("alice");
        registry.register(alice.clone()).await.unwrap();

        // when (操作):
        let removed = registry.unregister(&alice).await;

        // then (期待する結果):
        assert!(removed);
        assert!(registry.lookup(alice.identity()).await.is_none());
        assert!(registry.list_active().await.is_empty());
        assert_eq!(*registry.watch_count().borrow(), 0);
    }

    #[tokio::test]
    async fn test_list_active_is_sorted_and_skips_closing() {
        // テスト項目: list_active はソート済みで、Closing のセッションを含まない
        // given (前提条件):
        let registry = InMemorySessionRegistry::new();
        let charlie = create_test_session("charlie");
        registry.register(charlie.clone()).await.unwrap();
        registry.register(create_test_session("bob")).await.unwrap();
        registry.register(create_test_session("alice")).await.unwrap();
        charlie.begin_close();

        // when (操作):
        let active = registry.list_active().await;

        // then (期待する結果):
        let names: Vec<&str> = active.iter().map(Identity::as_str).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(registry.active_sessions().await.len(), 2);
        assert_eq!(registry.count().await, 3);
    }
}
