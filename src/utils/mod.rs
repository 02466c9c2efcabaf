//! Small shared helpers.

pub mod slug;
