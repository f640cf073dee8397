//! # webuild-core
//!
//! Sandbox lifecycle orchestration for live previews of model-generated
//! web projects.
//!
//! A conversation produces raw block output (parsed by `webuild-blocks`);
//! this crate owns the single sandbox instance that renders it, driving
//! boot, file synchronization, dependency install, dev-server start, and
//! readiness detection, while coalescing bursty updates into serialized
//! apply cycles.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       webuild-core                         │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  raw model text                                            │
//! │        │                                                   │
//! │        ▼                                                   │
//! │  ┌───────────────────┐   debounce / single-flight          │
//! │  │ UpdateCoordinator │──────────────┐                      │
//! │  │  - submit()       │              │                      │
//! │  │  - RetryContext   │              ▼                      │
//! │  └───────────────────┘   ┌──────────────────────┐          │
//! │                          │ PreviewOrchestrator  │          │
//! │  ┌───────────────────┐   │  - apply()           │          │
//! │  │ webuild-blocks    │──▶│  - on_ready()        │          │
//! │  │  Parser           │   │  - teardown()        │          │
//! │  └───────────────────┘   │  - hard_reset()      │          │
//! │                          └──────────────────────┘          │
//! │                                     │                      │
//! │                                     ▼                      │
//! │                          ┌──────────────────────┐          │
//! │                          │ SandboxRuntime       │          │
//! │                          │ SandboxInstance      │  (trait  │
//! │                          │ SandboxProcess       │  contract)│
//! │                          └──────────────────────┘          │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use webuild_blocks::Parser;
//! use webuild_core::{PreviewConfig, PreviewOrchestrator, PreviewSink, SandboxRuntime, UpdateCoordinator};
//!
//! # async fn example(runtime: Box<dyn SandboxRuntime>,
//! #                  sink: Arc<dyn PreviewSink>,
//! #                  model_output: String) -> webuild_core::Result<()> {
//! let orchestrator = PreviewOrchestrator::new(runtime, PreviewConfig::default())?;
//! let coordinator = UpdateCoordinator::new(orchestrator, Parser::new(), sink);
//!
//! let _subscription = coordinator
//!     .on_ready(|url| println!("preview live at {url}"))
//!     .await;
//!
//! coordinator.submit(model_output);
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod model;
mod orchestrator;
mod runtime;
mod scaffold;

pub use config::{CommandSpec, PreviewConfig, PreviewConfigBuilder};
pub use coordinator::{PreviewSink, RetryContext, UpdateCoordinator};
pub use error::{Result, SandboxError};
pub use model::{Message, ModelClient, Role};
pub use orchestrator::{PreviewOrchestrator, ReadySubscription, SandboxId, SandboxState};
pub use runtime::{ReadySignal, SandboxInstance, SandboxProcess, SandboxRuntime};
