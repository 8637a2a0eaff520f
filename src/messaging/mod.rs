/// Messaging module for the Event/Command architecture
///
/// - **Commands**: requests sent to the runtime thread (imperative)
/// - **Events**: things the session did (past tense, broadcast)
///
/// ## Architecture
///
/// ```text
/// ┌───────────────┐   Command    ┌──────────────┐    Event     ┌───────────┐
/// │ SessionHandle │ ───────────> │ AudioRuntime │ ───────────> │ Event Bus │
/// │ (any widget)  │              │ (owns the    │              │           │
/// └───────────────┘              │  session)    │              └───────────┘
///         ▲                      └──────────────┘                    │
///         │          snapshot            │                           ▼
///         └──────────────────────────────┘                     Subscribers
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let runtime = AudioRuntime::spawn(config, |config| {
///     Box::new(MemoryBackend::new(Arc::new(FileAssetSource::new(&config.asset_root))))
/// })?;
///
/// let handle = runtime.handle();
/// let (events, _id) = handle.subscribe();
///
/// handle.enter();
/// handle.set_volume(0.5);
///
/// while let Ok(event) = events.recv() {
///     println!("{}", event.description());
/// }
/// ```

pub mod bus;
pub mod commands;
pub mod events;
pub mod runtime;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use commands::Command;
pub use events::Event;
pub use runtime::{AudioRuntime, SessionHandle, SessionSnapshot};
