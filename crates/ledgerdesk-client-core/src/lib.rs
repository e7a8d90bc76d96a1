//! Client core for the Ledgerdesk admin console.
//!
//! Everything here is transport-agnostic: the HTTP boundary lives in
//! `ledgerdesk-api-client` and feeds this crate completed exchanges,
//! failures, and decoded list results. The pieces are wired together by
//! the console shell: the [`SessionStore`](session::SessionStore) persists
//! through the [`CookieJar`](cookies::CookieJar) and
//! [`Cipher`](cipher::Cipher), the
//! [`ResponseHandler`](response::ResponseHandler) turns exchanges into
//! error-bag updates and toasts, and each list view owns a
//! [`Paginator`](pagination::Paginator).

pub mod busy;
pub mod cipher;
pub mod cookies;
pub mod debounce;
pub mod envelope;
pub mod error_bag;
pub mod pagination;
pub mod response;
pub mod session;
pub mod toast;

pub use busy::{BusyCounter, BusyGuard};
pub use cipher::{Cipher, CipherError, CipherKey};
pub use cookies::{CookieJar, CookieOptions, SameSite};
pub use debounce::{DebounceOutcome, Debounced};
pub use envelope::{ApiEnvelope, ApiError, Exchange, ListResult, PageEnvelope};
pub use error_bag::{ErrorBag, ErrorBagError, FieldErrors};
pub use pagination::{
    ListQuery, PageState, Paginator, PaginatorConfig, QueryOverrides, SortOrder,
};
pub use response::{NETWORK_ERROR_MESSAGE, NETWORK_FIELD, ResponseHandler};
pub use session::{
    AuthTransport, Identity, NavDecision, RouteRule, SESSION_COOKIE, SessionSnapshot,
    SessionStore, User,
};
pub use toast::{
    DEFAULT_TOAST_DURATION_MS, MemorySink, Severity, Toast, ToastSink, Toaster,
    format_field_errors,
};
