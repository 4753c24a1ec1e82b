//! End-to-end tests over the public chunking API.
