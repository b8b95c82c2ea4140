//! Dropbox Sign API client.
//!
//! Creates signature requests (emailed or embedded) and fetches embedded
//! signing URLs. Credentials come from the same sealed store the callback
//! verifier uses, so the API key is never held in plain configuration.
//!
//! # Example
//!
//! ```no_run
//! use signhook_client::{ClientConfig, DropboxSignClient, SignatureRequest};
//! use zeroize::Zeroizing;
//!
//! # async fn example() -> signhook_client::Result<()> {
//! let client = DropboxSignClient::new(
//!     ClientConfig::default(),
//!     Some(Zeroizing::new(b"api-key".to_vec())),
//!     None,
//! )?;
//!
//! let created = client
//!     .create_signature_request(
//!         SignatureRequest::new("/srv/contracts/nda.pdf").with_signer("jo@example.com", "Jo"),
//!     )
//!     .await?;
//! println!("created {}", created.signature_request_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::{
    ClientConfig, DropboxSignClient, EmbeddedSignUrl, Signature, SignatureMode, SignatureRequest,
    SignatureRequestCreated, Signer, DEFAULT_API_BASE_URL,
};
pub use error::{ClientError, Result};
