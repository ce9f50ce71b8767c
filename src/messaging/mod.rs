/// Messaging module for the engine's outer surface
///
/// - **Events**: notifications of things that happened (past tense, broadcast)
/// - **Commands**: requests to perform actions (imperative, funneled to the
///   engine thread)
///
/// ## Architecture
///
/// ```text
/// ┌──────────────┐  EngineCommand  ┌─────────────┐  AudioEvent  ┌─────────────┐
/// │ AudioHandle  │ ──────────────> │ AudioEngine │ ───────────> │  Event Bus  │
/// │ (any thread) │                 │   (tick)    │              │             │
/// └──────────────┘                 └─────────────┘              └─────────────┘
///                                                                      │
///                                                                      ▼
///                                                                ┌──────────┐
///                                                                │ Observers│
///                                                                └──────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let handle = engine.handle();
/// let rx = handle.subscribe_to(&[EventKind::Music]);
///
/// handle.play_music("title");
/// engine.update(frame_time);
///
/// while let Ok(event) = rx.try_recv() {
///     if let AudioEvent::MusicInvoked { key } = event { /* ... */ }
/// }
/// ```

pub mod events;
pub mod commands;
pub mod bus;
pub mod handle;

// Re-export commonly used types
pub use events::{AudioEvent, EventKind};
pub use commands::EngineCommand;
pub use bus::EventBus;
pub use handle::AudioHandle;
