//! Driver layer for browser automation.
//!
//! This crate owns everything that talks to a real browser. The rest of the
//! workspace only sees the [`browser::session::BrowserSession`] and
//! [`browser::session::PageElement`] traits, so detection logic can be driven
//! by an in-memory fake in tests.
//!
//! - [`browser::driver::ApplyDriver`]: WebDriver client wrapper and launch flags
//! - [`browser::page::ApplyPage`]: fantoccini-backed `BrowserSession`
//! - [`browser::behavioral::BehavioralEngine`]: human‑like pauses
//! - [`browser::stealth`]: Chrome arguments and JS evasions
pub mod browser;
