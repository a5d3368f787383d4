//! Storage module for persisting crawl data
//!
//! This module owns every durable artifact of a run:
//! - The progress ledger (`{"last_id": n}`), replaced atomically per identifier
//! - The anti-bot session state, replaced atomically on refresh
//! - The append-only CSV result file

mod atomic;
mod csv_sink;
mod progress;
mod session;
mod traits;

pub use atomic::write_atomic;
pub use csv_sink::CsvResultSink;
pub use progress::JsonProgressLedger;
pub use session::{SessionCookie, SessionState, SessionStore};
pub use traits::{ProgressLedger, ResultSink, StorageError, StorageResult};

use crate::MarketId;
use serde::{Deserialize, Serialize};

/// Header row of the result file, in column order
pub const CSV_HEADER: [&str; 10] = [
    "market_id",
    "business_name",
    "representative",
    "business_registration_number",
    "mail_order_license_number",
    "email",
    "phone",
    "address",
    "source_url",
    "scraped_at",
];

/// The durable checkpoint: highest identifier fully handled so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub last_id: MarketId,
}

/// One of the seven seller-registration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SellerField {
    BusinessName,
    Representative,
    BusinessRegistrationNumber,
    MailOrderLicenseNumber,
    Email,
    Phone,
    Address,
}

impl SellerField {
    /// All fields in output column order
    pub const ALL: [SellerField; 7] = [
        Self::BusinessName,
        Self::Representative,
        Self::BusinessRegistrationNumber,
        Self::MailOrderLicenseNumber,
        Self::Email,
        Self::Phone,
        Self::Address,
    ];

    /// Column name in the result file
    pub fn column(&self) -> &'static str {
        match self {
            Self::BusinessName => "business_name",
            Self::Representative => "representative",
            Self::BusinessRegistrationNumber => "business_registration_number",
            Self::MailOrderLicenseNumber => "mail_order_license_number",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
        }
    }

    /// Label printed next to the value on the storefront page
    pub fn label(&self) -> &'static str {
        match self {
            Self::BusinessName => "상호",
            Self::Representative => "대표자",
            Self::BusinessRegistrationNumber => "사업자등록번호",
            Self::MailOrderLicenseNumber => "통신판매업신고번호",
            Self::Email => "이메일",
            Self::Phone => "전화번호",
            Self::Address => "주소",
        }
    }
}

/// Extracted seller-registration values; absent fields are `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellerFields {
    pub business_name: Option<String>,
    pub representative: Option<String>,
    pub business_registration_number: Option<String>,
    pub mail_order_license_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl SellerFields {
    pub fn get(&self, field: SellerField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: SellerField, value: String) {
        *self.slot_mut(field) = Some(value);
    }

    /// Returns true when no field was found
    pub fn is_empty(&self) -> bool {
        SellerField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    fn slot(&self, field: SellerField) -> &Option<String> {
        match field {
            SellerField::BusinessName => &self.business_name,
            SellerField::Representative => &self.representative,
            SellerField::BusinessRegistrationNumber => &self.business_registration_number,
            SellerField::MailOrderLicenseNumber => &self.mail_order_license_number,
            SellerField::Email => &self.email,
            SellerField::Phone => &self.phone,
            SellerField::Address => &self.address,
        }
    }

    fn slot_mut(&mut self, field: SellerField) -> &mut Option<String> {
        match field {
            SellerField::BusinessName => &mut self.business_name,
            SellerField::Representative => &mut self.representative,
            SellerField::BusinessRegistrationNumber => &mut self.business_registration_number,
            SellerField::MailOrderLicenseNumber => &mut self.mail_order_license_number,
            SellerField::Email => &mut self.email,
            SellerField::Phone => &mut self.phone,
            SellerField::Address => &mut self.address,
        }
    }
}

/// One row of the result file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub market_id: MarketId,
    pub fields: SellerFields,
    pub source_url: String,
    /// Unix epoch seconds
    pub scraped_at: i64,
}

impl ResultRecord {
    /// Cells in [`CSV_HEADER`] order; absent fields become empty cells
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(CSV_HEADER.len());
        row.push(self.market_id.to_string());
        for field in SellerField::ALL {
            row.push(self.fields.get(field).unwrap_or_default().to_string());
        }
        row.push(self.source_url.clone());
        row.push(self.scraped_at.to_string());
        row
    }
}
