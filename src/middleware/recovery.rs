//! Panic containment.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use tracing::error;

use super::Middleware;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

/// Turns a panic anywhere further down the chain into `500 Internal Server
/// Error`.
///
/// The panic message and a backtrace are logged at `error` level as
/// `PANIC: <message>` followed by the trace. With
/// [`print_stack`](Recovery::print_stack) on (the default) the same text is
/// sent as the response body.
///
/// Install it first so it also covers the other middlewares.
#[derive(Clone, Copy, Debug)]
pub struct Recovery {
    print_stack: bool,
    stack_size: usize,
}

impl Recovery {
    pub fn new() -> Self {
        Self { print_stack: true, stack_size: 8 * 1024 }
    }

    /// Whether the panic report goes into the response body. Default `true`.
    pub fn print_stack(mut self, value: bool) -> Self {
        self.print_stack = value;
        self
    }

    /// Maximum number of backtrace bytes kept in the report. Default 8 KiB.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    fn report(&self, payload: &(dyn Any + Send)) -> String {
        let message = panic_message(payload);
        let backtrace = Backtrace::force_capture().to_string();
        format!("PANIC: {message}\n{}", truncate(&backtrace, self.stack_size))
    }

    fn recover(&self, payload: Box<dyn Any + Send>) -> Response {
        let report = self.report(&*payload);
        error!("{report}");
        if self.print_stack {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(report)
        } else {
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Recovery {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(RecoveryHandler { recovery: *self, next })
    }
}

struct RecoveryHandler {
    recovery: Recovery,
    next: BoxedHandler,
}

impl ErasedHandler for RecoveryHandler {
    fn call(&self, req: Request) -> BoxFuture {
        let recovery = self.recovery;
        // A handler may panic while building its future, before any poll.
        let fut = match panic::catch_unwind(AssertUnwindSafe(|| self.next.call(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                let res = recovery.recover(payload);
                return Box::pin(std::future::ready(res));
            }
        };
        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => recovery.recover(payload),
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "Box<dyn Any>"
    }
}

/// Cuts `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Chain, Next, from_fn};
    use crate::testing::{self, Captured};

    fn get() -> Request {
        testing::request("GET", "/")
    }

    async fn panicking(_req: Request) -> Response {
        panic!("here is a panic!")
    }

    fn body(res: &Response) -> String {
        String::from_utf8(res.body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn without_recovery_the_panic_propagates() {
        let handler = Chain::empty().then(panicking);
        let outcome = AssertUnwindSafe(handler.call(get())).catch_unwind().await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn recovery_answers_500_with_the_report() {
        let handler = Chain::empty().with(Recovery::new()).then(panicking);
        let res = handler.call(get()).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(&res).starts_with("PANIC: here is a panic!\n"));
    }

    #[tokio::test]
    async fn body_stays_empty_without_print_stack() {
        let handler = Chain::empty().with(Recovery::new().print_stack(false)).then(panicking);
        let res = handler.call(get()).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
    }

    #[tokio::test]
    async fn stack_size_bounds_the_backtrace() {
        let handler = Chain::empty().with(Recovery::new().stack_size(0)).then(panicking);
        let res = handler.call(get()).await;
        assert_eq!(body(&res), "PANIC: here is a panic!\n");
    }

    #[tokio::test]
    async fn panics_in_inner_middlewares_are_caught() {
        let exploding = from_fn(|_req: Request, _next: Next| async {
            if true {
                panic!("middleware failed: {}", 42);
            }
            Response::new()
        });
        let handler = Chain::empty().with(Recovery::new()).with(exploding).then_noop();
        let res = handler.call(get()).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(&res).starts_with("PANIC: middleware failed: 42\n"));
    }

    #[tokio::test]
    async fn panics_while_building_the_future_are_caught() {
        let eager = |_next: BoxedHandler| -> BoxedHandler {
            struct Eager;
            impl ErasedHandler for Eager {
                fn call(&self, _req: Request) -> BoxFuture {
                    panic!("before the future")
                }
            }
            Arc::new(Eager)
        };
        let handler = Chain::empty().with(Recovery::new()).with(eager).then_noop();
        let res = handler.call(get()).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(&res).starts_with("PANIC: before the future\n"));
    }

    #[tokio::test]
    async fn the_panic_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let handler = Chain::empty().with(Recovery::new().print_stack(false)).then(panicking);
        handler.call(get()).await;

        let logged = captured.contents();
        assert!(logged.contains("ERROR"));
        assert!(logged.contains("PANIC: here is a panic!"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("abc", 8), "abc");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("héllo", 2), "h");
    }
}
