// SPDX-License-Identifier: PMPL-1.0-or-later

//! Localized terminal rendering

use crate::api::{GenerateResponse, ValidationResponse};
use crate::i18n::{t, Lang};
use crate::types::{ImportSummary, PaymentFields, Template, TemplateStats};
use chrono::{DateTime, Utc};
use colored::*;
use std::fmt::Write;

pub struct ReportFormatter {
    lang: Lang,
}

impl ReportFormatter {
    pub fn new(lang: Lang) -> Self {
        Self { lang }
    }

    fn label(&self, key: &str) -> &'static str {
        t(self.lang, key)
    }

    pub fn template_list(&self, templates: &[Template]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.label("template.title").bold().cyan());
        if templates.is_empty() {
            let _ = writeln!(out, "  {}", self.label("template.empty").dimmed());
            return out;
        }
        for template in templates {
            let _ = writeln!(
                out,
                "  {}  {} {}  {}: {}",
                template.id.dimmed(),
                template.name.bold(),
                format!("[{}]", template.endpoint).yellow(),
                self.label("field.usage"),
                template.usage_count
            );
            if !template.description.is_empty() {
                let _ = writeln!(out, "      {}", template.description);
            }
        }
        out
    }

    pub fn template_detail(&self, template: &Template) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} {}", template.name.bold().cyan(), template.id.dimmed());
        if !template.description.is_empty() {
            let _ = writeln!(out, "  {}: {}", self.label("field.description"), template.description);
        }
        let _ = writeln!(out, "  {}: {}", self.label("field.endpoint"), template.endpoint);
        let _ = writeln!(out, "  {}: {}", self.label("field.method"), template.method);
        let _ = writeln!(out, "  {}: {}", self.label("field.usage"), template.usage_count);
        let _ = writeln!(
            out,
            "  {}: {}",
            self.label("field.last_used"),
            self.timestamp(template.last_used)
        );
        let _ = writeln!(
            out,
            "  {}: {}",
            self.label("field.created"),
            self.timestamp(Some(template.created_at))
        );
        out.push_str(&self.fields(&template.data));
        out
    }

    pub fn fields(&self, fields: &PaymentFields) -> String {
        let mut out = String::new();
        for (code, value) in fields {
            let _ = writeln!(out, "    {:>3} {}", code.bold(), value.replace("\r\n", " / "));
        }
        out
    }

    pub fn statistics(
        &self,
        stats: &TemplateStats,
        most_used: &[Template],
        recently_used: &[Template],
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.label("stats.title").bold().yellow());
        let _ = writeln!(out, "  {}: {}", self.label("stats.total"), stats.total);
        for (endpoint, count) in &stats.per_endpoint {
            let _ = writeln!(out, "    {:<10} {}", endpoint.path(), count);
        }
        let _ = writeln!(out, "  {}: {}", self.label("stats.total_usage"), stats.total_usage);
        let _ = writeln!(
            out,
            "  {}: {:.2}",
            self.label("stats.average_usage"),
            stats.average_usage
        );
        if !most_used.is_empty() {
            let _ = writeln!(out, "  {}:", self.label("stats.most_used"));
            for template in most_used {
                let _ = writeln!(out, "    - {} ({})", template.name, template.usage_count);
            }
        }
        if !recently_used.is_empty() {
            let _ = writeln!(out, "  {}:", self.label("stats.recently_used"));
            for template in recently_used {
                let _ = writeln!(
                    out,
                    "    - {} ({})",
                    template.name,
                    self.timestamp(template.last_used)
                );
            }
        }
        out
    }

    pub fn import_summary(&self, summary: &ImportSummary) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}: {}  {}: {}",
            self.label("template.imported"),
            summary.imported.to_string().green().bold(),
            self.label("template.skipped"),
            summary.skipped
        );
        if !summary.errors.is_empty() {
            let _ = writeln!(out, "{}:", self.label("template.errors").red());
            for error in &summary.errors {
                let _ = writeln!(out, "  - {}", error);
            }
        }
        out
    }

    pub fn generated(&self, response: &GenerateResponse) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.label("qr.generated").green().bold());
        if let Some(text) = &response.t {
            let _ = writeln!(out, "  {}: {}", self.label("qr.payload"), text);
        }
        out
    }

    pub fn validation(&self, response: &ValidationResponse) -> String {
        let mut out = String::new();
        let verdict = if response.is_valid() {
            self.label("qr.valid").green().bold()
        } else {
            self.label("qr.invalid").red().bold()
        };
        let _ = writeln!(out, "{}", verdict);
        let _ = writeln!(
            out,
            "  {}: {} {}",
            self.label("qr.status"),
            response.s.code,
            response.s.desc
        );
        if let Some(text) = &response.t {
            let _ = writeln!(out, "  {}: {}", self.label("qr.payload"), text);
        }
        for problem in response.problems() {
            let _ = writeln!(out, "  - {}", problem.red());
        }
        out
    }

    fn timestamp(&self, value: Option<DateTime<Utc>>) -> String {
        match value {
            Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
            None => self.label("common.never").to_string(),
        }
    }
}
