//! Cancellation and change notification.
//!
//! [`CancelSignal`] stops every watch loop and start-up wait; [`UpdateNotifier`]
//! tells interested code that a writable change was applied.

pub mod cancel;
pub mod subscriber;

pub use cancel::CancelSignal;
pub use subscriber::{SubscriptionHandle, UpdateNotifier};
