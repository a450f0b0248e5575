//! Serialization of compiled suites and validation reports.
//!
//! - **Suite XML**: the suite file consumed by the mobile client
//! - **Diagnostics JSON**: the advisory findings of a validation run

mod common;
mod diagnostics;
mod suite_xml;

pub use diagnostics::{diagnostics_json, write_diagnostics_json};
pub use suite_xml::{suite_xml_string, write_suite_xml, write_suite_xml_file};
