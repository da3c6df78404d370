//! InMemory Room Directory 実装
//!
//! ルーム名 → Room のマップを 1 つの `Mutex` で保護します。
//! 空になったルームの扱いは [`RoomRetention`] で切り替えます。

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Identity, Room, RoomDirectory, RoomName, RoomRetention};

/// インメモリ Room Directory 実装
pub struct InMemoryRoomDirectory {
    rooms: Mutex<HashMap<RoomName, Room>>,
    retention: RoomRetention,
}

impl InMemoryRoomDirectory {
    /// 新しい InMemoryRoomDirectory を作成
    pub fn new(retention: RoomRetention) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            retention,
        }
    }

    pub fn retention(&self) -> RoomRetention {
        self.retention
    }

    /// 空になったルームを保持ポリシーに従って片付ける
    fn retire_if_empty(&self, rooms: &mut HashMap<RoomName, Room>, name: &RoomName) {
        if self.retention == RoomRetention::DestroyEmpty
            && rooms.get(name).is_some_and(Room::is_empty)
        {
            rooms.remove(name);
            tracing::debug!("Room '{}' retired", name);
        }
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn join(&self, room: &RoomName, identity: &Identity) -> bool {
        let mut rooms = self.rooms.lock().await;
        let entry = rooms.entry(room.clone()).or_insert_with(|| {
            tracing::debug!("Room '{}' created", room);
            Room::new(room.clone())
        });
        entry.add_member(identity.clone())
    }

    async fn leave(&self, room: &RoomName, identity: &Identity) -> bool {
        let mut rooms = self.rooms.lock().await;
        let removed = rooms
            .get_mut(room)
            .is_some_and(|entry| entry.remove_member(identity));
        if removed {
            self.retire_if_empty(&mut rooms, room);
        }
        removed
    }

    async fn members_of(&self, room: &RoomName) -> BTreeSet<Identity> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room)
            .map(|entry| entry.members.clone())
            .unwrap_or_default()
    }

    async fn is_member(&self, room: &RoomName, identity: &Identity) -> bool {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room)
            .is_some_and(|entry| entry.is_member(identity))
    }

    async fn rooms_of(&self, identity: &Identity) -> Vec<RoomName> {
        let rooms = self.rooms.lock().await;
        let mut names: Vec<RoomName> = rooms
            .values()
            .filter(|entry| entry.is_member(identity))
            .map(|entry| entry.name.clone())
            .collect();
        names.sort();
        names
    }

    async fn leave_all(&self, identity: &Identity) -> Vec<RoomName> {
        let mut rooms = self.rooms.lock().await;
        let mut left: Vec<RoomName> = rooms
            .values_mut()
            .filter_map(|entry| entry.remove_member(identity).then(|| entry.name.clone()))
            .collect();
        left.sort();
        for name in &left {
            self.retire_if_empty(&mut rooms, name);
        }
        left
    }

    async fn get_room(&self, room: &RoomName) -> Option<Room> {
        let rooms = self.rooms.lock().await;
        rooms.get(room).cloned()
    }

    async fn rooms(&self) -> Vec<Room> {
        let rooms = self.rooms.lock().await;
        let mut all: Vec<Room> = rooms.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
