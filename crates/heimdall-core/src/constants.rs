//! Wire-level names shared by the server and its clients.

/// Default mount point for every Heimdall route.
pub const DEFAULT_BASE_PATH: &str = "/__heimdall";

/// Route (relative to the base path) for action invocation.
pub const ACTIONS_PATH: &str = "/v1/content/actions";
/// Route for issuing an anti-forgery request token.
pub const CSRF_PATH: &str = "/v1/csrf";
/// Route for minting a subscribe token.
pub const BIFROST_TOKEN_PATH: &str = "/v1/bifrost/token";
/// Route for the event stream.
pub const BIFROST_STREAM_PATH: &str = "/v1/bifrost";

/// Header carrying the action identifier.
pub const ACTION_HEADER: &str = "x-heimdall-content-action";
/// Query-string fallback for the action identifier.
pub const ACTION_QUERY: &str = "action";
/// Default header carrying the anti-forgery request token.
pub const DEFAULT_CSRF_HEADER: &str = "RequestVerificationToken";
/// Default cookie carrying the anti-forgery cookie token.
pub const DEFAULT_CSRF_COOKIE: &str = "heimdall.af";

/// SSE event emitted once a stream is subscribed.
pub const CONNECTED_EVENT: &str = "heimdall:connected";
/// SSE event name for published messages.
pub const MESSAGE_EVENT: &str = "heimdall";
/// SSE comment text for heartbeats.
pub const HEARTBEAT_COMMENT: &str = "ping";
