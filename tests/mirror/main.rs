//! End-to-end tests of the mirror router against a local origin server

mod downloads;
mod index;
mod storage;
mod support;
