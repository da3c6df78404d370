//! UseCase: ルーム一覧・詳細の取得

use std::{collections::BTreeSet, sync::Arc};

use crate::domain::{Identity, Room, RoomDirectory, RoomName};

use super::error::GetRoomError;

/// ルーム情報取得のユースケース
pub struct GetRoomsUseCase {
    rooms: Arc<dyn RoomDirectory>,
}

impl GetRoomsUseCase {
    /// 新しい GetRoomsUseCase を作成
    pub fn new(rooms: Arc<dyn RoomDirectory>) -> Self {
        Self { rooms }
    }

    /// 存在するルームを名前順で返す
    pub async fn list(&self) -> Vec<Room> {
        self.rooms.rooms().await
    }

    /// ルーム名（未検証の文字列）からルームを取得
    pub async fn detail(&self, name: String) -> Result<Room, GetRoomError> {
        let room = RoomName::new(name.clone()).map_err(GetRoomError::InvalidName)?;
        self.rooms
            .get_room(&room)
            .await
            .ok_or(GetRoomError::NotFound(name))
    }

    /// ルームのメンバー（ルームが無ければ空）
    pub async fn members_of(&self, room: &RoomName) -> BTreeSet<Identity> {
        self.rooms.members_of(room).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{NameError, RoomRetention},
        infrastructure::repository::InMemoryRoomDirectory,
    };

    fn identity(name: &str) -> Identity {
        Identity::try_from(name).unwrap()
    }

    async fn seeded() -> GetRoomsUseCase {
        let rooms = Arc::new(InMemoryRoomDirectory::new(RoomRetention::DestroyEmpty));
        let r1 = RoomName::try_from("R1").unwrap();
        let lobby = RoomName::try_from("lobby").unwrap();
        rooms.join(&r1, &identity("bob")).await;
        rooms.join(&r1, &identity("alice")).await;
        rooms.join(&lobby, &identity("carol")).await;
        GetRoomsUseCase::new(rooms)
    }

    #[tokio::test]
    async fn test_list_rooms_sorted() {
        // テスト項目: ルーム一覧は名前順
        let usecase = seeded().await;

        let names: Vec<String> = usecase
            .list()
            .await
            .into_iter()
            .map(|room| room.name.to_string())
            .collect();

        assert_eq!(names, vec!["R1", "lobby"]);
    }

    #[tokio::test]
    async fn test_detail_returns_members() {
        // テスト項目: 詳細はメンバーを名前順で返す
        let usecase = seeded().await;

        let room = usecase.detail("R1".to_string()).await.unwrap();

        let members: Vec<&str> = room.members.iter().map(Identity::as_str).collect();
        assert_eq!(members, vec!["alice", "bob"]);
        assert_eq!(usecase.members_of(&room.name).await.len(), 2);
    }

    #[tokio::test]
    async fn test_detail_errors() {
        // テスト項目: 存在しないルームは NotFound、不正な名前は InvalidName
        let usecase = seeded().await;

        assert_eq!(
            usecase.detail("nowhere".to_string()).await.unwrap_err(),
            GetRoomError::NotFound("nowhere".to_string())
        );
        assert_eq!(
            usecase.detail("   ".to_string()).await.unwrap_err(),
            GetRoomError::InvalidName(NameError::Empty)
        );
    }
}
