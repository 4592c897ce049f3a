//! Synchronous legal tools: plain-language explanation, chat, clause review
//! and drafting, key-date extraction, e-stamp lookup and agreement PDFs.

mod agreement;
mod assistant;
mod estamp;

pub use agreement::RentalAgreement;
pub use assistant::{ClauseComparison, Demystification, KeyDate, LegalAssistant};
pub use estamp::{ESTAMP_VERIFICATION_URL, EstampCheck, check_estamp, find_uin};
