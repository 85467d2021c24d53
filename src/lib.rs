//! Ghost trader
//!
//! Turns an amount typed anywhere on the site into money added to a
//! "ghost" trade with a fixed counterpart. The request survives full page
//! navigations through session storage; every page load resumes it by
//! probing the page.

pub mod config;
pub mod errors;
pub mod input;
pub mod session;

pub use config::Config;
pub use errors::{GhostTraderError, ValidationError, INVALID_AMOUNT_MESSAGE};
pub use input::{should_offer_input, AmountInput, InputController};
pub use session::{GhostSession, SessionCommand, SessionEvent, SessionHandle};
