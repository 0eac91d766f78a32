//! Protocol extension client
//!
//! The bridge talks to one backend process over JSON-RPC on stdin/stdout,
//! using a handful of custom `m/` methods on top of an ordinary language
//! server connection.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Bridge (app)                          │
//! │   commands ──► ExtensionClient ◄── process_incoming(host)    │
//! └──────────────────────┬───────────────────────▲───────────────┘
//!                        │ Transport trait       │ IncomingMessage
//!                        ▼                       │
//! ┌──────────────────────────────────────────────┴───────────────┐
//! │  StdioTransport                                              │
//! │   writer task ──► stdin      stdout ──► reader task          │
//! │   pending: id ──► oneshot    (responses resolve pending,     │
//! │                               everything else is forwarded)  │
//! └──────────────────────┬───────────────────────▲───────────────┘
//!                        ▼                       │
//!                   ┌────────────────────────────┴──┐
//!                   │ backend (subprocess)          │
//!                   └───────────────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! - **`ext`**: request/notification type definitions for the `m/` methods.
//! - **`codec`**: `Content-Length` framing and message classification.
//! - **`transport`**: the [`Transport`](transport::Transport) seam and the
//!   incoming message type.
//! - **`stdio`**: the subprocess transport.
//! - **`client`**: [`ExtensionClient`](client::ExtensionClient), typed
//!   requests plus the dispatch table for server-initiated messages.
//! - **`handlers`**: `m/publishDecorations` and `m/moveCursor`.
//! - **`convert`**: host/protocol coordinate translation.
//! - **`testing`**: an in-process scripted transport (unit tests, or the
//!   `testing` feature).
//!
//! # Error Handling
//!
//! - **Server exits**: pending requests fail with `NotRunning`; nothing is
//!   restarted.
//! - **Request timeout**: only when configured; the command is abandoned.
//! - **Malformed pushes**: logged and dropped. Malformed server requests are
//!   answered with `InvalidParams`.

pub mod client;
pub mod codec;
pub mod convert;
pub mod error;
pub mod ext;
pub mod handlers;
pub mod stdio;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use client::ExtensionClient;
pub use error::ClientError;
