//! UniFFI bindings crate for the conversation library
//!
//! Wraps the conversation crate for UniFFI library mode binding generation.
//! It re-exports the FFI module and UniFFI scaffolding from the conversation
//! crate.
//!
//! ## Building for Swift
//!
//! 1. Build the library for Apple platforms:
//!    ```bash
//!    cargo build --release -p conversation-ffi --target aarch64-apple-darwin
//!    cargo build --release -p conversation-ffi --target aarch64-apple-ios
//!    ```
//!
//! 2. Generate Swift bindings:
//!    ```bash
//!    cargo run -p conversation-ffi --features bindgen --bin uniffi-bindgen generate \
//!        --library target/aarch64-apple-darwin/release/libconversation_ffi.dylib \
//!        --language swift \
//!        --out-dir generated/swift
//!    ```

pub use conversation::ffi::*;

// Library mode needs the scaffolding symbols in this cdylib
conversation::uniffi_reexport_scaffolding!();
