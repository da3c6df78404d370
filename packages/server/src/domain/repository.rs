//! Repository trait 定義
//!
//! ドメイン層が必要とする共有状態（オンライン中のセッション・ルーム）への
//! インターフェースを定義します。具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{
    entity::Room,
    error::RegistryError,
    session::SessionHandle,
    value_object::{Identity, RoomName},
};

/// Session Registry trait
///
/// 「誰がオンラインか」の唯一の情報源。Identity → Session の対応を保持する。
///
/// ## 不変条件
///
/// - 同一 Identity に対するアクティブなセッションは常に高々 1 つ
/// - 変更（登録・解除）は並行する読み手から見てアトミック
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// セッションを登録し Active に遷移させる
    ///
    /// 同名の並行登録のうち成功するのは必ず 1 つで、残りは `NameTaken` を受け取る。
    async fn register(&self, session: SessionHandle) -> Result<(), RegistryError>;

    /// セッションの登録を解除
    ///
    /// 登録されているのが同じ接続である場合のみ削除し、`true` を返す。
    async fn unregister(&self, session: &SessionHandle) -> bool;

    /// Identity からセッションを取得
    async fn lookup(&self, identity: &Identity) -> Option<SessionHandle>;

    /// アクティブな Identity の一覧（ソート済みスナップショット）
    async fn list_active(&self) -> Vec<Identity>;

    /// アクティブなセッションのスナップショット
    async fn active_sessions(&self) -> Vec<SessionHandle>;

    /// 登録中のセッション数
    async fn count(&self) -> usize;

    /// 登録数の変化を監視する receiver を取得
    fn watch_count(&self) -> watch::Receiver<usize>;
}

/// Room Directory trait
///
/// ルーム名 → メンバー集合の対応を保持する。存在しないルームへの join はルームを作成する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// ルームに参加（既にメンバーなら `false`）
    async fn join(&self, room: &RoomName, identity: &Identity) -> bool;

    /// ルームから退出（メンバーでなければ `false`）
    async fn leave(&self, room: &RoomName, identity: &Identity) -> bool;

    /// ルームのメンバー集合（存在しないルームは空集合）
    async fn members_of(&self, room: &RoomName) -> BTreeSet<Identity>;

    /// メンバーかどうか
    async fn is_member(&self, room: &RoomName, identity: &Identity) -> bool;

    /// Identity が参加している全ルーム
    async fn rooms_of(&self, identity: &Identity) -> Vec<RoomName>;

    /// Identity を全ルームから退出させ、退出したルームを返す
    async fn leave_all(&self, identity: &Identity) -> Vec<RoomName>;

    /// ルームを取得
    async fn get_room(&self, room: &RoomName) -> Option<Room>;

    /// 全ルームを取得（名前順）
    async fn rooms(&self) -> Vec<Room>;
}
