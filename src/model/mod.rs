//! Core data model types: the MIME part tree, the message, and the transient
//! records produced while converting it.

pub mod attachment;
pub mod calendar;
pub mod mail;
pub mod part;
