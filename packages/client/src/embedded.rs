//! In-process server for the combined run mode (`--embedded-server`).

use kchat_server::{
    Server, ServerConfig, ServerError, ServerHandle, ui::shutdown_signal, usecase::DrainReport,
};
use tokio::task::JoinHandle;

/// A server running on the client's runtime
pub struct EmbeddedServer {
    url: String,
    handle: ServerHandle,
    task: JoinHandle<Result<DrainReport, ServerError>>,
}

impl EmbeddedServer {
    /// Bind and start serving in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the bind fails.
    pub async fn start(config: ServerConfig) -> Result<Self, ServerError> {
        let bound = Server::new(config)?.bind().await?;
        let url = format!("ws://{}/ws", bound.local_addr());
        let handle = bound.handle();
        let task = tokio::spawn(bound.run_until(shutdown_signal()));
        tracing::info!("Embedded server started at {}", url);
        Ok(Self { url, handle, task })
    }

    /// WebSocket URL clients should connect to
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    /// Drain the sessions and wait for the server to stop.
    pub async fn stop(self) -> Result<DrainReport, ServerError> {
        self.handle.shutdown();
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
        }
    }
}
