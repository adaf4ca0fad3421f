//! Generated from `proto/dnstap.proto` by `build.rs` via `prost-build`.

include!(concat!(env!("OUT_DIR"), "/dnstap.rs"));
