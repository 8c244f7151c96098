//! Authentication module.
//!
//! Handles peer credential verification and resolution of the token secret.

mod peer_creds;
mod secret;

pub use peer_creds::{authorize_peer, verify_peer, PeerInfo};
pub use secret::{
    load_secret_file, resolve_token_secret, resolve_token_secret_with, SecretSource, TokenSecret,
    MIN_SECRET_LEN,
};
