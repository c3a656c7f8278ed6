//! Test support: scriptable stand-ins for every capability port.

pub mod stubs;
