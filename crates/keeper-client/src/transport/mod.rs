pub mod http;
pub mod ws;

pub use http::{HttpTransport, LogResp, PgpResp, PullResp, SigninOutcome, VersionResp};
pub use ws::{Notification, NotificationClient};
