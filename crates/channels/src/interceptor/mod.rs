//! Dispatch pipeline wrapped around every bot handler.
//!
//! Interceptors run in registration order; each one receives a [`Next`] and
//! decides whether and when to continue. The last stage is the bot's
//! [`Handler`].

mod audit;
mod escalation;

use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait};

use crate::{event::InboundEvent, handle::SessionHandle};

pub use {
    audit::AuditInterceptor,
    escalation::{AlertTarget, EscalationInterceptor},
};

/// A bot's business logic for one inbound event.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, handle: &SessionHandle, event: &InboundEvent) -> Result<()>;
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        handle: &SessionHandle,
        event: &InboundEvent,
        next: Next<'_>,
    ) -> Result<()>;
}

/// The remainder of the pipeline after the current interceptor.
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    handler: &'a dyn Handler,
}

impl Next<'_> {
    pub async fn run(self, handle: &SessionHandle, event: &InboundEvent) -> Result<()> {
        match self.interceptors.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    interceptors: rest,
                    handler: self.handler,
                };
                first.intercept(handle, event, next).await
            },
            None => self.handler.handle(handle, event).await,
        }
    }
}

/// Ordered interceptors shared by every session.
#[derive(Clone, Default)]
pub struct Pipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub async fn dispatch(
        &self,
        handle: &SessionHandle,
        event: &InboundEvent,
        handler: &dyn Handler,
    ) -> Result<()> {
        Next {
            interceptors: &self.interceptors,
            handler,
        }
        .run(handle, event)
        .await
    }
}
