//! Core module: in-process event distribution
//!
//! Prinsip desain:
//! - Synchronous fan-out di thread pemanggil, urutan subscribe dijaga
//! - Kegagalan satu subscriber tidak pernah bocor ke transport

mod dispatcher;

pub use dispatcher::{Dispatcher, Handler, PublishReport, SubscriptionId, Topic};
