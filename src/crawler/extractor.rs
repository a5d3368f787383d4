//! Seller information extraction
//!
//! This module turns a market info page into [`SellerFields`]:
//! - Locate the "seller info" block by its heading and read its text
//! - Match each field's label pattern against that text
//! - Fall back to the whole document when the block is missing or empty

use crate::storage::{SellerField, SellerFields};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Heading that introduces the seller-registration block
pub const SELLER_INFO_HEADING: &str = "판매자 정보";

/// Capability to pull the seller fields out of page markup
///
/// Extraction is total: unrecognised markup yields absent fields, never an
/// error.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, markup: &str) -> SellerFields;
}

/// Label-pattern extractor for the storefront's seller-info block
pub struct SellerInfoExtractor {
    patterns: Vec<(SellerField, Regex)>,
    next_label: Regex,
    bare_email: Regex,
    bare_phone: Regex,
}

impl SellerInfoExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = SellerField::ALL
            .iter()
            .map(|field| {
                let pattern = format!(r"(?i){}\s*[:：]\s*({})", field.label(), value_pattern(*field));
                Regex::new(&pattern).map(|re| (*field, re))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let labels = SellerField::ALL
            .iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join("|");
        let next_label = Regex::new(&format!(r"(?i)\s*[/|,·]?\s*(?:{})\s*[:：]", labels))?;

        Ok(Self {
            patterns,
            next_label,
            bare_email: Regex::new(r"([a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+)")?,
            bare_phone: Regex::new(r"((?:0\d{1,2}-)?\d{3,4}-\d{4})")?,
        })
    }

    /// Applies every label pattern to `text`, filling only fields still absent
    fn match_labels(&self, text: &str, fields: &mut SellerFields) {
        for (field, pattern) in &self.patterns {
            if fields.get(*field).is_some() {
                continue;
            }
            let value = pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| self.clean_value(m.as_str()));
            if let Some(value) = value {
                fields.set(*field, value);
            }
        }
    }

    /// Cuts a captured value at the next label and trims separators
    fn clean_value(&self, raw: &str) -> Option<String> {
        let value = match self.next_label.find(raw) {
            Some(m) => &raw[..m.start()],
            None => raw,
        };
        let value = value
            .trim()
            .trim_end_matches(['/', '|', ','])
            .trim();

        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Unlabelled e-mail and phone patterns, used only inside the seller block
    fn match_bare_contacts(&self, text: &str, fields: &mut SellerFields) {
        if fields.email.is_none() {
            if let Some(m) = self.bare_email.find(text) {
                fields.set(SellerField::Email, m.as_str().to_string());
            }
        }
        if fields.phone.is_none() {
            if let Some(m) = self.bare_phone.find(text) {
                fields.set(SellerField::Phone, m.as_str().to_string());
            }
        }
    }
}

impl FieldExtractor for SellerInfoExtractor {
    fn extract(&self, markup: &str) -> SellerFields {
        let document = Html::parse_document(markup);
        let mut fields = SellerFields::default();

        if let Some(section) = find_seller_section(&document) {
            let text = element_text(section);
            self.match_labels(&text, &mut fields);
            self.match_bare_contacts(&text, &mut fields);
        }

        if fields.is_empty() {
            let text = element_text(document.root_element());
            self.match_labels(&text, &mut fields);
        }

        fields
    }
}

/// What a field's value may consist of
fn value_pattern(field: SellerField) -> &'static str {
    match field {
        SellerField::BusinessRegistrationNumber => r"[0-9\-]+",
        SellerField::MailOrderLicenseNumber => r"[0-9A-Za-z\-\p{Hangul}]+",
        SellerField::Phone => r"[0-9\-\(\) ]+",
        _ => r"[^\n]+",
    }
}

/// Finds the nearest `div`/`section` enclosing the seller-info heading
fn find_seller_section(document: &Html) -> Option<ElementRef<'_>> {
    let any = Selector::parse("*").ok()?;

    let heading = document.select(&any).find(|element| {
        element
            .children()
            .filter_map(|child| child.value().as_text())
            .any(|text| text.contains(SELLER_INFO_HEADING))
    })?;

    std::iter::once(heading)
        .chain(heading.ancestors().filter_map(ElementRef::wrap))
        .find(|element| matches!(element.value().name(), "div" | "section"))
}

/// Visible text of an element, one trimmed line per text node
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
