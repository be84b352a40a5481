// SPDX-License-Identifier: PMPL-1.0-or-later

//! Terminal and machine-readable output for templates and QR results

pub mod formatter;
pub mod output;

pub use formatter::ReportFormatter;
pub use output::OutputFormat;
