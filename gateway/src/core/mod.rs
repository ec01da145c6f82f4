pub mod assembler;
pub mod interact;
pub mod notifier;
pub mod protocol;
pub mod transcript;
pub mod translator;
pub mod upstream;

// Re-export commonly used types for convenience
pub use assembler::{ResponseAssembler, ResponseId};
pub use notifier::{CallNotifier, NotifierError, WebhookNotifier};
pub use transcript::{Transcript, Turn, TurnRole};
pub use translator::{
    ConversationState, Outbound, ProtocolMode, ResponseIdStrategy, TranscriptField, Translator,
    TurnDriver,
};
pub use upstream::{
    CloseReason, LinkState, UpstreamConnector, UpstreamError, UpstreamEvents, UpstreamId,
    UpstreamLink, UpstreamResult, UpstreamSettings,
};
