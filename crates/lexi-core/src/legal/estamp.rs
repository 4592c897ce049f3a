use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Public page where a UIN can be checked by hand.
pub const ESTAMP_VERIFICATION_URL: &str = "https://www.shcilestamp.com/eStamp_en/verifyestamp.jsp";

const NOT_FOUND_REASON: &str = "Could not find a valid E-Stamp Number (UIN) in the document.";

// e.g. IN-DL123456789012A
static UIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"IN-[A-Z]{2}\d{12}[A-Z]").unwrap());

/// First e-stamp certificate number in `text`.
pub fn find_uin(text: &str) -> Option<&str> {
    UIN.find(text).map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EstampCheck {
    Found { uin: String, verification_url: String },
    NotFound { reason: String },
}

pub fn check_estamp(text: &str) -> EstampCheck {
    match find_uin(text) {
        Some(uin) => EstampCheck::Found {
            uin: uin.to_owned(),
            verification_url: ESTAMP_VERIFICATION_URL.to_owned(),
        },
        None => EstampCheck::NotFound { reason: NOT_FOUND_REASON.to_owned() },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finds_first_uin() {
        let text = "Certificate No. IN-KA839201746501X dated 01-02-2024, ref IN-DL000000000000A";
        assert_eq!(find_uin(text), Some("IN-KA839201746501X"));
    }

    #[test]
    fn rejects_near_misses() {
        assert_eq!(find_uin("IN-ka839201746501X"), None);
        assert_eq!(find_uin("IN-KA8392017465X"), None);
        assert_eq!(find_uin("no stamp here"), None);
    }

    #[test]
    fn check_serialises_with_status_tag() {
        let found = serde_json::to_value(check_estamp("IN-MH123456789012B")).unwrap();
        assert_eq!(found["status"], "found");
        assert_eq!(found["uin"], "IN-MH123456789012B");
        assert_eq!(found["verification_url"], ESTAMP_VERIFICATION_URL);

        let missing = serde_json::to_value(check_estamp("nothing")).unwrap();
        assert_eq!(missing["status"], "not_found");
        assert_eq!(missing["reason"], NOT_FOUND_REASON);
    }
}
