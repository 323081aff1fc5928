// toonsync-api: Async client for the webtoon tracker REST API
//
// The `ApiClient` is the single request gateway: it attaches the bearer
// token from the shared `SessionStore`, renews it on a 401 and replays the
// request once. Endpoint groups live in `auth` and `webtoons` as inherent
// `impl ApiClient` blocks.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod session;
pub mod storage;
pub mod transport;
mod webtoons;

pub use auth::{Credentials, Registration};
pub use client::{ApiClient, ApiRequest, ClientConfig, DEFAULT_BASE_URL};
pub use error::{Error, SESSION_EXPIRED_MESSAGE, UNREACHABLE_MESSAGE};
pub use models::{ListQuery, Page, Profile, Webtoon, WebtoonPatch, WebtoonPayload};
pub use session::{AuthState, Session, SessionStore, TokenPair};
pub use storage::{ACCESS_TOKEN_KEY, MemoryStorage, REFRESH_TOKEN_KEY, TokenStorage};
pub use transport::{TlsMode, TransportConfig};
