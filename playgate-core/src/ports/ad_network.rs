use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Events fired by a showing ad instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdEvent {
    /// The viewer watched far enough to earn the reward
    Reward,
    /// The ad was dismissed
    Closed,
    /// Display failed inside the ad SDK
    Error(String),
}

/// One ad instance obtained from the network.
///
/// Instances are single-use: `show` consumes the loaded payload and a
/// replacement must be created and loaded before anything can be shown
/// again.
#[async_trait]
pub trait AdHandle: Send + Sync {
    /// Load the ad payload. Resolves once the instance is displayable.
    async fn load(&mut self) -> Result<()>;

    /// Whether the instance reports itself loaded and displayable.
    fn is_loaded(&self) -> bool;

    /// Begin display and return the event stream for this showing.
    ///
    /// Dropping the receiver is the only listener cleanup required; events
    /// fired after the drop go nowhere.
    fn show(&mut self) -> Result<mpsc::Receiver<AdEvent>>;
}

/// Capability to mint fresh ad instances.
#[async_trait]
pub trait AdNetwork: Send + Sync {
    async fn create(&self) -> Result<Box<dyn AdHandle>>;
}
