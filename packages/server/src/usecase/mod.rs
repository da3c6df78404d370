//! UseCase 層
//!
//! セッションの接続・フレーム受信・切断・シャットダウン時のドレイン、
//! および在室状況の問い合わせを提供します。

pub mod connect_session;
pub mod disconnect_session;
pub mod drain_sessions;
pub mod error;
pub mod get_presence;
pub mod get_rooms;
pub mod receive_frame;
pub mod router;

pub use connect_session::ConnectSessionUseCase;
pub use disconnect_session::DisconnectSessionUseCase;
pub use drain_sessions::{DrainReport, DrainSessionsUseCase};
pub use error::{ConnectError, GetRoomError, RouteError};
pub use get_presence::GetPresenceUseCase;
pub use get_rooms::GetRoomsUseCase;
pub use receive_frame::{FrameOutcome, ReceiveFrameUseCase};
pub use router::{Delivery, DispatchReport, MessageRouter, RouteOutcome, dispatch};
