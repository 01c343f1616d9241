//! # Call Test Utilities
//!
//! Mock collaborators and fixtures for testing the call client without a
//! camera or a signaling service.
//!
//! ## Modules
//!
//! - `mock_capture` - capture device with scripted grants, denials and a
//!   permission prompt that tests answer explicitly
//! - `mock_signaling` - signaling service whose remote side is driven by the
//!   test: inject offers, answer dials, hang up
//! - `fixtures` - streams, identifiers and snapshot waiting helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use call_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let capture = MockCapture::builder().with_permission_prompt().build();
//!     let signaling = MockSignaling::builder().with_local_id("host-1").build();
//!
//!     let (handle, _task) = CallSession::spawn(
//!         None,
//!         Arc::new(capture.clone()),
//!         Arc::new(signaling.clone()),
//!         HD,
//!         CancellationToken::new(),
//!     );
//!
//!     capture.grant_permission();
//!     let remote = signaling.offer("guest-1");
//!     // ...
//! }
//! ```

pub mod fixtures;
pub mod mock_capture;
pub mod mock_signaling;

pub use fixtures::*;
pub use mock_capture::*;
pub use mock_signaling::*;
