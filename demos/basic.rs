//! Minimal plumb example: a middleware chain sharing request context with
//! its handler, and a few renderers.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -H 'x-user: alice' http://localhost:3000/
//!   curl -H 'accept-encoding: gzip' http://localhost:3000/hello --output -
//!   curl 'http://localhost:3000/users?callback=show'
//!   curl -X POST -d '_method=DELETE' http://localhost:3000/users
//!   curl http://localhost:3000/panic

use std::sync::Arc;

use http::{Method, StatusCode};
use plumb::context::{ContextStore, MapStore, Value};
use plumb::middleware::{
    Compress, ContentTypeChecker, LogFormat, Logger, MethodOverride, Next, PoweredBy, Recovery,
    from_fn,
};
use plumb::render::{JsonRender, JsonpRender, StaticTemplateFactory, TemplateRender};
use plumb::{IntoResponse, Request, Response, Server, chain};
use serde::Serialize;

#[derive(Serialize)]
struct User {
    id: u32,
    name: &'static str,
}

const USERS: [User; 2] = [User { id: 1, name: "alice" }, User { id: 2, name: "bob" }];

struct App {
    store: Arc<MapStore>,
    json: JsonRender,
    jsonp: JsonpRender,
    pages: TemplateRender,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let store = Arc::new(MapStore::new());
    let pages = TemplateRender::new(
        StaticTemplateFactory::new().template("hello", "<h1>Hello, {{ user }}!</h1>"),
    );
    if let Err(e) = pages.compile_templates() {
        eprintln!("bad templates: {e}");
        return;
    }
    let app = Arc::new(App {
        store: Arc::clone(&store),
        json: JsonRender::new().indent(true),
        jsonp: JsonpRender::new(),
        pages,
    });

    let user_store = Arc::clone(&store);
    let identify = from_fn(move |mut req: Request, next: Next| {
        let store = Arc::clone(&user_store);
        async move {
            let user = req.header("x-user").unwrap_or("guest").to_owned();
            store.set(&mut req, "user".into(), Value::new(user));
            next.run(req).await
        }
    });

    let handler = chain![
        store.clear_on_exit(),
        Recovery::new(),
        Logger::new(LogFormat::apache_combined()),
        Compress::new(),
        PoweredBy::new("plumb"),
        MethodOverride::new(),
        ContentTypeChecker::new(),
        identify,
    ]
    .then(move |req: Request| {
        let app = Arc::clone(&app);
        async move { app.route(req) }
    });

    if let Err(e) = Server::bind("0.0.0.0:3000").serve(handler).await {
        eprintln!("server error: {e}");
    }
}

impl App {
    fn user(&self, req: &Request) -> String {
        self.store
            .get(req, "user")
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default()
    }

    fn route(&self, req: Request) -> Response {
        match (req.method().clone(), req.path()) {
            (Method::GET, "/") => {
                let body = serde_json::json!({ "request": req.id().as_u64(), "user": self.user(&req) });
                self.json.render(StatusCode::OK, &body).into_response()
            }
            (Method::GET, "/hello") => {
                let context = serde_json::json!({ "user": self.user(&req) });
                self.pages.render(StatusCode::OK, "hello", &context).into_response()
            }
            (Method::GET, "/users") => match req.form_value("callback") {
                Some(callback) => self.jsonp.render(StatusCode::OK, &callback, &USERS).into_response(),
                None => self.json.render(StatusCode::OK, &USERS).into_response(),
            },
            (Method::DELETE, "/users") => Response::status(StatusCode::NO_CONTENT),
            (Method::GET, "/panic") => panic!("demo panic"),
            _ => Response::status(StatusCode::NOT_FOUND),
        }
    }
}
