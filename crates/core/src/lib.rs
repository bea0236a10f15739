//! Live face-mesh inference loop.
//!
//! Frames flow `capture → detection → rendering/history`, driven by the
//! [`pipeline::frame_scheduler::FrameScheduler`]. Each bounded context keeps its
//! types and traits under `domain/` and concrete adapters under `infrastructure/`.

pub mod capture;
pub mod detection;
pub mod history;
pub mod pipeline;
pub mod rendering;
pub mod shared;
