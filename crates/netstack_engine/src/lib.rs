//! # netstack_engine
//!
//! Boundary between a synthesized stack and whatever creates it.
//!
//! A [`ProvisioningEngine`] receives a [`netstack_core::ResolvedPlan`] and
//! creates its resources in plan order. [`hand_off`] only accepts a finished
//! [`netstack_core::Synthesis`], so nothing unvalidated reaches an engine.
//!
//! - [`MockEngine`]: captures plans for tests
//! - [`PlanFileEngine`]: writes the plan as JSON or YAML
//!
//! ```rust,no_run
//! use netstack_core::{StackConfig, Synthesizer};
//! use netstack_engine::{hand_off, PlanFileEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let synthesis = Synthesizer::new(StackConfig::default()).synthesize()?;
//!     let engine = PlanFileEngine::for_path("plan.json")?;
//!     let report = hand_off(&engine, &synthesis).await?;
//!     println!("{} step(s) written", report.applied.len());
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod file;
pub mod mock;

pub use engine::{hand_off, ApplyReport, ProvisioningEngine};
pub use error::{EngineError, EngineResult};
pub use file::{PlanFileEngine, PlanFormat};
pub use mock::MockEngine;
