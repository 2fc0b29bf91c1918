//! JSON-RPC transport for the build server.
//!
//! Messages travel as `Content-Length: N\r\n\r\n{json}` over stdin/stdout. The
//! [`codec`] module frames raw bytes, [`protocol`] classifies and encodes envelopes,
//! and [`transport`] drives both over async streams.

pub mod codec;
pub mod protocol;
pub mod transport;

pub use codec::{FrameDecoder, InvalidMessageError, InvalidMessageReason, MAX_FRAME_BYTES, encode_frame};
pub use protocol::{
    ErrorResponse, IncomingMessage, Notification, PathToUriError, Response, ResponseError,
    directory_uri, error_codes, file_uri_to_path, path_to_file_uri,
};
pub use transport::{MessageWriter, read_messages};
