use thiserror::Error;

/// Window-server failures raised while talking to the input-shape backend.
///
/// These never leave the platform layer: drivers log them and report a
/// [`crate::platform::ShapeOutcome`] instead.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The window has no native handle yet, or it is not an X11 window.
    #[error("no native window handle available")]
    NoWindow,

    /// The server does not advertise the SHAPE extension.
    #[error("window server lacks the SHAPE extension")]
    MissingExtension,

    /// Opening the display connection failed.
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    #[error(transparent)]
    Connect(#[from] x11rb::errors::ConnectError),

    /// The connection broke while sending a request.
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    #[error(transparent)]
    Connection(#[from] x11rb::errors::ConnectionError),

    /// The server answered a request with an error.
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    #[error(transparent)]
    Reply(#[from] x11rb::errors::ReplyError),

    /// Interning an atom or similar lookup returned nothing usable.
    #[error("window server lookup failed: {0}")]
    Lookup(String),
}
