//! # runway-core
//!
//! Structured lifecycle for async work on tokio.
//!
//! A [`Runnable`] is a unit of work with `initialize`, `main` and `cleanup`
//! hooks. A [`Runner`] spawns it and tracks its [`Phase`]. An [`App`] is the
//! root runnable: it owns config and service factories, stops itself on
//! SIGINT/SIGTERM, and is visible as the current app to every [`Service`],
//! [`TaskGroup`] task or [`Context::spawn`] started beneath it.
//!
//! Helpers: [`TaskGroup`] for cancel-and-await groups of tasks, [`wait_one`]
//! for the first of several futures and [`AsyncExitStack`] for LIFO async
//! cleanup.

pub mod app;
pub mod context;
pub mod error;
pub mod exit_stack;
pub mod factory;
pub mod group;
pub mod phase;
pub mod runner;
pub mod service;
pub mod wait;

pub use app::{App, AppRef};
pub use context::Context;
pub use error::RunError;
pub use exit_stack::{AsyncContext, AsyncExit, AsyncExitStack};
pub use factory::Factories;
pub use group::{GroupTask, TaskGroup, TaskId};
pub use phase::Phase;
pub use runner::{Exit, Runnable, Runner};
pub use service::Service;
pub use wait::wait_one;

pub use async_trait::async_trait;
