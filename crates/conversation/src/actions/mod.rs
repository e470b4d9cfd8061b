//! Thread mutations
//!
//! Every operation here takes a `&mut dyn WriteTransaction`, so it can only run
//! inside a read-write transaction scope. Friend request transitions live in
//! [`crate::friend_request`].

mod thread;
