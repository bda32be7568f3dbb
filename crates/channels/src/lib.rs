//! Session orchestration for the managed chat bots.
//!
//! A [`SessionRegistry`] owns one long-polling session per configured
//! [`SessionHandle`]. Every inbound event passes through a [`Pipeline`] of
//! interceptors (audit logging, failure escalation) before reaching the bot's
//! [`Handler`]. Platform specifics live behind [`PollingSubstrate`] and
//! [`Outbound`].

pub mod error;
pub mod event;
pub mod handle;
pub mod interceptor;
pub mod plugin;
pub mod registry;

pub use {
    error::{Error, Result},
    event::InboundEvent,
    handle::{SessionHandle, SessionState},
    interceptor::{
        AlertTarget, AuditInterceptor, EscalationInterceptor, Handler, Interceptor, Next, Pipeline,
    },
    plugin::{Outbound, PollingSubstrate, TextFormat, UpdateStream},
    registry::{SessionRegistry, SessionSpec},
};
