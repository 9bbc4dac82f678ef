//! Fixtures shared by the unit tests: sample manifests and a throwaway HTTP
//! host that serves them on a loopback port.

use crate::access::AdminToken;
use crate::config::{FetchLimits, PortalConfig};
use crate::pipeline::Pipeline;
use crate::queue::ModerationQueue;
use crate::store::ManifestStore;
use actix_web::{web, App, HttpResponse, HttpServer};
use std::sync::RwLock;
use std::time::Duration;

pub const ADMIN_TOKEN: &str = "s3cret";

pub const VALID_MANIFEST: &str = r#"{
  "version": "v1.0.0",
  "entity": {
    "type": "organisation",
    "role": "owner",
    "name": "Example Foundation",
    "email": "funding@example.org",
    "description": "Stewards of the example toolkit.",
    "webpageUrl": { "url": "https://example.org" }
  },
  "projects": [
    {
      "guid": "example-toolkit",
      "name": "Example Toolkit",
      "description": "A toolkit used in the examples.",
      "webpageUrl": { "url": "https://example.org/toolkit" },
      "repositoryUrl": {
        "url": "https://git.example.net/example/toolkit",
        "wellKnown": "https://git.example.net/example/toolkit/.well-known/funding-manifest-urls"
      },
      "licenses": ["spdx:MIT"],
      "tags": ["toolkit", "developer-tools"]
    }
  ],
  "funding": {
    "channels": [
      { "guid": "bank-main", "type": "bank", "address": "IBAN NL00 0000 0000 00" },
      { "guid": "card", "type": "payment-provider", "address": "https://pay.example.org" }
    ],
    "plans": [
      {
        "guid": "maintainer",
        "status": "active",
        "name": "Maintainer salary",
        "amount": 5000,
        "currency": "EUR",
        "frequency": "monthly",
        "channels": ["bank-main", "card"]
      }
    ],
    "history": [
      { "year": 2024, "income": 12000, "expenses": 9000, "taxes": 1000, "currency": "EUR" }
    ]
  }
}"#;

/// Parses but breaks several rules at once.
pub const INVALID_MANIFEST: &str = r#"{
  "version": "v1.0.0",
  "entity": {
    "type": "robot",
    "role": "owner",
    "name": "Example Foundation",
    "email": "not-an-email",
    "webpageUrl": { "url": "https://example.org" }
  },
  "projects": [],
  "funding": {
    "channels": [{ "guid": "bank-main", "type": "bank", "address": "IBAN" }],
    "plans": [
      {
        "guid": "maintainer",
        "status": "active",
        "name": "Maintainer salary",
        "amount": -1,
        "currency": "EUR",
        "frequency": "monthly",
        "channels": ["paypal"]
      }
    ]
  }
}"#;

struct HostedBody(RwLock<String>);

/// A running loopback server. `/funding.json` serves the current body; the
/// other routes simulate misbehaving hosts.
pub struct ManifestHost {
    base: String,
    body: web::Data<HostedBody>,
}

impl ManifestHost {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Replaces what `/funding.json` serves from now on.
    pub fn set_body(&self, body: &str) {
        *self.body.0.write().unwrap() = body.to_string();
    }
}

async fn current(body: web::Data<HostedBody>) -> HttpResponse {
    let text = body.0.read().unwrap().clone();
    HttpResponse::Ok().content_type("application/json").body(text)
}

async fn hop(path: web::Path<u32>, body: web::Data<HostedBody>) -> HttpResponse {
    match path.into_inner() {
        0 => current(body).await,
        n => HttpResponse::Found()
            .insert_header(("Location", format!("/hop/{}/funding.json", n - 1)))
            .finish(),
    }
}

async fn slow() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_secs(3)).await;
    HttpResponse::Ok().body("{}")
}

async fn big() -> HttpResponse {
    HttpResponse::Ok().body("x".repeat(4096))
}

async fn stream() -> HttpResponse {
    let chunks = (0..8).map(|_| Ok::<_, actix_web::Error>(web::Bytes::from(vec![b' '; 512])));
    HttpResponse::Ok().streaming(futures_util::stream::iter(chunks))
}

pub async fn spawn_manifest_host(initial: &str) -> ManifestHost {
    let body = web::Data::new(HostedBody(RwLock::new(initial.to_string())));
    let data = body.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/funding.json", web::get().to(current))
            .route("/hop/{n}/funding.json", web::get().to(hop))
            .route("/slow/funding.json", web::get().to(slow))
            .route("/big/funding.json", web::get().to(big))
            .route("/stream/funding.json", web::get().to(stream))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind manifest host");

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());

    ManifestHost {
        base: format!("http://{}", addr),
        body,
    }
}

/// App data for handler tests, wired the way `main` wires it, on an in-memory store.
pub struct Portal {
    pub store: ManifestStore,
    pub pipeline: web::Data<Pipeline>,
    pub queue: web::Data<ModerationQueue>,
    pub token: web::Data<AdminToken>,
}

pub fn portal() -> Portal {
    let config = PortalConfig {
        fetch: FetchLimits {
            timeout: Duration::from_secs(2),
            ..FetchLimits::default()
        },
        admin_token: Some(ADMIN_TOKEN.to_string()),
        ..PortalConfig::default()
    };
    let store = ManifestStore::open_in_memory(config.store_options()).unwrap();
    Portal {
        pipeline: web::Data::new(Pipeline::new(&config, store.clone()).unwrap()),
        queue: web::Data::new(ModerationQueue::new(store.clone(), config.page_size)),
        token: web::Data::new(AdminToken::new(config.admin_token.clone())),
        store,
    }
}
