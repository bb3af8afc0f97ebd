/// Middleware modules for the API server
///
/// Bearer authentication lives next to the router in `app`, since it needs
/// the application state; this module holds state-free tower layers.

pub mod security;
